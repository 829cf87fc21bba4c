use serde::{Deserialize, Serialize};
use shelf_client_sdk::{
    MutationKind, MutationState, Notification, ProductTableController, TableView,
};
use shelf_protocol::ProductId;

use crate::form::FieldErrors;

// ── LOGIN PAYLOADS ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormPhase {
    Idle,
    Failed,
    Succeeded,
}

#[derive(Debug, Serialize)]
pub struct LoginPage {
    pub phase: FormPhase,
    pub action: String,
    pub fields: [&'static str; 2],
    pub min_password_len: usize,
    pub max_password_len: usize,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub phase: FormPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl LoginResponse {
    pub fn failed(notification: Notification) -> Self {
        Self {
            phase: FormPhase::Failed,
            redirect: None,
            user: None,
            csrf_token: None,
            errors: None,
            notification: Some(notification),
        }
    }

    pub fn invalid(errors: FieldErrors) -> Self {
        Self {
            phase: FormPhase::Failed,
            redirect: None,
            user: None,
            csrf_token: None,
            errors: Some(errors),
            notification: None,
        }
    }

    pub fn succeeded(user: String, redirect: String, csrf_token: String) -> Self {
        Self {
            phase: FormPhase::Succeeded,
            redirect: Some(redirect),
            user: Some(user),
            csrf_token: Some(csrf_token),
            errors: None,
            notification: None,
        }
    }
}

// ── DASHBOARD PAYLOADS ──────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MutationSummary {
    pub create: MutationState,
    pub update: MutationState,
    pub delete: MutationState,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user: String,
    pub table: TableView,
    pub mutations: MutationSummary,
    pub toasts: Vec<Notification>,
    pub form_reset: bool,
}

impl DashboardResponse {
    /// Snapshot of the table; drains pending notifications and the form reset flag.
    pub fn snapshot(user: &str, controller: &mut ProductTableController) -> Self {
        Self {
            user: user.to_string(),
            table: controller.view(),
            mutations: MutationSummary {
                create: controller.mutation_state(MutationKind::Create),
                update: controller.mutation_state(MutationKind::Update),
                delete: controller.mutation_state(MutationKind::Delete),
            },
            toasts: controller.take_notifications(),
            form_reset: controller.take_form_reset(),
        }
    }
}

/// Query string of `GET /dashboard`. Every parameter is optional and only
/// the ones present change the stored view state.
#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    pub page_index: Option<usize>,
    pub page_size: Option<usize>,
    /// Column to sort by, or `none` to clear sorting.
    pub sort: Option<String>,
    pub desc: Option<bool>,
    pub filter_column: Option<String>,
    pub filter_value: Option<String>,
    /// Comma separated columns to hide; an empty value shows all.
    pub hide: Option<String>,
    #[serde(default)]
    pub clear_filters: bool,
    /// `first`, `previous`, `next` or `last`, applied after `page_index`.
    pub step: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEdit {
    pub title: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub from_id: ProductId,
    pub to_id: ProductId,
}

#[derive(Debug, Default, Deserialize)]
pub struct SelectionRequest {
    pub toggle: Option<ProductId>,
    #[serde(default)]
    pub page: bool,
    #[serde(default)]
    pub clear: bool,
}
