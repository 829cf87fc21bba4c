use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use shelf_client_sdk::{Column, ControllerError, Notification, TableError, TableViewState};
use shelf_protocol::{NewProduct, Product, ProductId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{DashboardResponse, ProductEdit, ReorderRequest, SelectionRequest, TableQuery};
use crate::session::SessionContext;
use crate::tables::SharedTable;
use crate::AppState;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
// Category used when the form does not send one.
const DEFAULT_CATEGORY_ID: i64 = 1;

fn error_json(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn csrf_rejection() -> Response {
    error_json(StatusCode::FORBIDDEN, "CSRF token missing or invalid")
}

fn controller_error(e: ControllerError) -> Response {
    let status = match e {
        ControllerError::UnknownProduct(_) => StatusCode::NOT_FOUND,
        ControllerError::InvalidPrice(_) | ControllerError::EmptyTitle => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    error_json(status, e.to_string())
}

async fn snapshot(ctx: &SessionContext, table: &SharedTable, status: StatusCode) -> Response {
    let mut controller = table.lock().await;
    let body = DashboardResponse::snapshot(&ctx.session.subject_id, &mut controller);
    (status, Json(body)).into_response()
}

/// Loads the session's table, refetching when it is new or invalidated.
async fn fresh_table(state: &AppState, ctx: &SessionContext) -> SharedTable {
    let table = state.tables.table_for(&ctx.session.session_id).await;
    state.tables.ensure_fresh(state.api.as_ref(), &ctx.session, &table).await;
    table
}

/// Like [`fresh_table`], but a collection that never loaded answers 502 with
/// the load failure toast; mutations need the rows to exist.
async fn loaded_table(state: &AppState, ctx: &SessionContext) -> Result<SharedTable, Response> {
    let table = fresh_table(state, ctx).await;
    let loaded = table.lock().await.is_loaded();
    if !loaded {
        return Err(snapshot(ctx, &table, StatusCode::BAD_GATEWAY).await);
    }
    Ok(table)
}

fn apply_query(
    view: &mut TableViewState,
    query: &TableQuery,
    products: &[Product],
) -> Result<(), TableError> {
    if let Some(hide) = &query.hide {
        let hidden = hide
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::parse::<Column>)
            .collect::<Result<BTreeSet<_>, _>>()?;
        view.hidden_columns = hidden;
    }

    if query.clear_filters {
        view.clear_filters();
    }
    if let Some(column) = &query.filter_column {
        let column: Column = column.parse()?;
        view.set_filter(column, query.filter_value.clone().unwrap_or_default());
    }

    match query.sort.as_deref() {
        Some("none") | Some("") => view.clear_sorting(),
        Some(column) => view.sort_by(column.parse()?, query.desc.unwrap_or(false)),
        None => {}
    }

    if let Some(size) = query.page_size {
        view.set_page_size(size)?;
    }
    if let Some(index) = query.page_index {
        view.set_page_index(index, products);
    }
    match query.step.as_deref() {
        Some("first") => view.set_page_index(0, products),
        Some("previous") => view.previous_page(),
        Some("next") => view.next_page(products),
        Some("last") => view.set_page_index(usize::MAX, products),
        _ => {}
    }
    Ok(())
}

// ── VIEW ────────────────────────────────────────────────────────

pub async fn show(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    Query(query): Query<TableQuery>,
) -> Response {
    let table = fresh_table(&state, &ctx).await;
    {
        let mut controller = table.lock().await;
        let products = controller.products().to_vec();
        if let Err(e) = apply_query(controller.view_state_mut(), &query, &products) {
            return error_json(StatusCode::BAD_REQUEST, e.to_string());
        }
    }
    snapshot(&ctx, &table, StatusCode::OK).await
}

pub async fn profile(State(state): State<Arc<AppState>>, ctx: SessionContext) -> Response {
    match state.api.profile(ctx.session.access_token()).await {
        Ok(profile) => (StatusCode::OK, Json(profile)).into_response(),
        Err(e) => {
            warn!("Profile fetch for {} failed: {}", ctx.session.subject_id, e);
            let toast = Notification::error("Failed to load profile");
            let body = Json(serde_json::json!({ "toasts": [toast] }));
            (StatusCode::BAD_GATEWAY, body).into_response()
        }
    }
}

// ── MUTATIONS ───────────────────────────────────────────────────

pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    Path(id): Path<String>,
) -> Response {
    if !ctx.csrf_ok() {
        return csrf_rejection();
    }
    let id = ProductId::from(id.as_str());
    let table = match loaded_table(&state, &ctx).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let ticket = match table.lock().await.begin_delete(&id) {
        Ok(ticket) => ticket,
        Err(e) => return controller_error(e),
    };
    let outcome = state.api.delete_product(ctx.session.access_token(), &id).await;
    let ok = outcome.is_ok();
    table.lock().await.finish_delete(&ticket, outcome);

    state.tables.ensure_fresh(state.api.as_ref(), &ctx.session, &table).await;
    snapshot(&ctx, &table, if ok { StatusCode::OK } else { StatusCode::BAD_GATEWAY }).await
}

pub async fn update_product(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    Path(id): Path<String>,
    Json(edit): Json<ProductEdit>,
) -> Response {
    if !ctx.csrf_ok() {
        return csrf_rejection();
    }
    let id = ProductId::from(id.as_str());
    let table = match loaded_table(&state, &ctx).await {
        Ok(table) => table,
        Err(response) => return response,
    };

    let begun = {
        let mut controller = table.lock().await;
        let existing = controller.products().iter().find(|p| p.id == id).cloned();
        match existing {
            Some(existing) => controller.begin_update(&Product {
                title: edit.title,
                price: edit.price,
                description: edit.description,
                ..existing
            }),
            None => Err(ControllerError::UnknownProduct(id.clone())),
        }
    };
    let (ticket, body) = match begun {
        Ok(begun) => begun,
        Err(e) => return controller_error(e),
    };

    let outcome = state.api.update_product(ctx.session.access_token(), &id, &body).await;
    let ok = outcome.is_ok();
    table.lock().await.finish_update(&ticket, outcome);

    state.tables.ensure_fresh(state.api.as_ref(), &ctx.session, &table).await;
    snapshot(&ctx, &table, if ok { StatusCode::OK } else { StatusCode::BAD_GATEWAY }).await
}

/// Reads the add-product form. The single image is re-encoded as a
/// `data:<mime>;base64,...` string.
async fn read_new_product(
    mut multipart: Multipart,
) -> Result<NewProduct, BTreeMap<&'static str, String>> {
    let mut errors = BTreeMap::new();
    let mut title = String::new();
    let mut description = String::new();
    let mut price = None;
    let mut category_id = None;
    let mut image = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                errors.insert("form", format!("Malformed form: {e}"));
                return Err(errors);
            }
        };
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let mime = field.content_type().unwrap_or("application/octet-stream").to_string();
                match field.bytes().await {
                    Ok(bytes) => image = Some((mime, bytes)),
                    Err(e) => {
                        errors.insert("image", format!("Could not read image: {e}"));
                    }
                }
            }
            other => {
                let value = field.text().await.unwrap_or_default();
                match other {
                    "title" => title = value.trim().to_string(),
                    "description" => description = value.trim().to_string(),
                    "price" => price = Some(value.trim().parse::<f64>()),
                    "category_id" => category_id = Some(value.trim().parse::<i64>()),
                    _ => {}
                }
            }
        }
    }

    if title.is_empty() {
        errors.insert("title", "Title is required".to_string());
    }
    let price = match price {
        Some(Ok(p)) if shelf_protocol::is_valid_price(p) => p,
        Some(Ok(_)) => {
            errors.insert("price", "Price must be 0 or more".to_string());
            0.0
        }
        Some(Err(_)) => {
            errors.insert("price", "Price must be a number".to_string());
            0.0
        }
        None => {
            errors.insert("price", "Price is required".to_string());
            0.0
        }
    };
    let category_id = match category_id {
        Some(Ok(id)) => id,
        Some(Err(_)) => {
            errors.insert("category_id", "Category must be a number".to_string());
            0
        }
        None => DEFAULT_CATEGORY_ID,
    };
    let image = match image {
        Some((mime, _)) if !mime.starts_with("image/") => {
            errors.insert("image", format!("Unsupported image type {mime}"));
            None
        }
        Some((_, bytes)) if bytes.is_empty() || bytes.len() > MAX_IMAGE_BYTES => {
            errors.insert("image", "Image must be between 1 byte and 5 MB".to_string());
            None
        }
        Some((mime, bytes)) => {
            let encoded = general_purpose::STANDARD.encode(&bytes);
            Some(format!("data:{mime};base64,{encoded}"))
        }
        None => {
            errors.entry("image").or_insert_with(|| "Please upload an image".to_string());
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewProduct {
        title,
        price,
        description,
        category_id,
        images: image.into_iter().collect(),
    })
}

/// Posts a new product. On success the form is asked to reset, but the
/// table is not refetched; the product appears on the next load.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    multipart: Multipart,
) -> Response {
    if !ctx.csrf_ok() {
        return csrf_rejection();
    }
    let draft = match read_new_product(multipart).await {
        Ok(draft) => draft,
        Err(errors) => {
            let body = Json(serde_json::json!({ "errors": errors }));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }
    };

    let table = state.tables.table_for(&ctx.session.session_id).await;
    let ticket = match table.lock().await.begin_create(&draft) {
        Ok(ticket) => ticket,
        Err(e) => return controller_error(e),
    };

    let outcome = state.api.create_product(ctx.session.access_token(), &draft).await;
    let ok = outcome.is_ok();
    table.lock().await.finish_create(&ticket, outcome);

    snapshot(&ctx, &table, if ok { StatusCode::CREATED } else { StatusCode::BAD_GATEWAY }).await
}

// ── LOCAL VIEW CHANGES ──────────────────────────────────────────

pub async fn reorder(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    Json(request): Json<ReorderRequest>,
) -> Response {
    let table = fresh_table(&state, &ctx).await;
    let from = request.from_id.canonical();
    let to = request.to_id.canonical();
    if let Err(e) = table.lock().await.reorder(&from, &to) {
        return controller_error(e);
    }
    info!("Reordered {} -> {} for {}", from, to, ctx.session.subject_id);
    snapshot(&ctx, &table, StatusCode::OK).await
}

pub async fn selection(
    State(state): State<Arc<AppState>>,
    ctx: SessionContext,
    Json(request): Json<SelectionRequest>,
) -> Response {
    let table = fresh_table(&state, &ctx).await;
    {
        let mut controller = table.lock().await;
        let products = controller.products().to_vec();
        let view = controller.view_state_mut();
        if request.clear {
            view.clear_selection();
        }
        if request.page {
            view.toggle_page_selection(&products);
        }
        if let Some(id) = request.toggle {
            let id = id.canonical();
            if !products.iter().any(|p| p.id == id) {
                return controller_error(ControllerError::UnknownProduct(id));
            }
            view.toggle_row(&id);
        }
    }
    snapshot(&ctx, &table, StatusCode::OK).await
}
