//! Product Table Controller: owns the product collection and its view state,
//! and runs create/update/delete against the external API without ever
//! touching local data before the API confirms.
//!
//! Each mutation is two-phase. `begin_*` validates the intent and marks it
//! pending; the caller performs the request; `finish_*` applies the outcome.
//! Hosts that share a controller between requests can release it while the
//! request is in flight. The `delete`/`update`/`create` helpers run all
//! phases for a single owner.

use serde::Serialize;
use shelf_protocol::{is_valid_price, NewProduct, Product, ProductId, ProductUpdate};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, ProductApi};
use crate::table::{TableView, TableViewState};

pub const MSG_DELETED: &str = "Product deleted successfully";
pub const MSG_DELETE_FAILED: &str = "Failed to delete product";
pub const MSG_UPDATED: &str = "Product updated successfully";
pub const MSG_UPDATE_FAILED: &str = "Failed to update product";
pub const MSG_CREATED: &str = "Product added successfully";
pub const MSG_CREATE_FAILED: &str = "Failed to add product";
pub const MSG_LOAD_FAILED: &str = "Failed to load products";

#[derive(Debug, Error, PartialEq)]
pub enum ControllerError {
    #[error("product {0} is not in the table")]
    UnknownProduct(ProductId),
    #[error("price must be a number greater than or equal to 0, got {0}")]
    InvalidPrice(f64),
    #[error("title must not be empty")]
    EmptyTitle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// One-line user-facing message produced by an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Handle for an in-flight mutation, returned by the `begin_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationTicket {
    pub kind: MutationKind,
    pub target: Option<ProductId>,
}

#[derive(Debug, Default)]
pub struct ProductTableController {
    products: Vec<Product>,
    view: TableViewState,
    loaded: bool,
    stale: bool,
    form_reset: bool,
    mutations: HashMap<MutationKind, MutationState>,
    notifications: Vec<Notification>,
}

impl ProductTableController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn view_state_mut(&mut self) -> &mut TableViewState {
        &mut self.view
    }

    pub fn view(&self) -> TableView {
        self.view.view(&self.products)
    }

    pub fn page_count(&self) -> usize {
        self.view.page_count(&self.products)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// True once a confirmed mutation has invalidated the collection, or
    /// before the first load.
    pub fn needs_refetch(&self) -> bool {
        self.stale || !self.loaded
    }

    pub fn mutation_state(&self, kind: MutationKind) -> MutationState {
        self.mutations.get(&kind).copied().unwrap_or_default()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Returns whether a successful create asked the input form to reset,
    /// clearing the flag.
    pub fn take_form_reset(&mut self) -> bool {
        std::mem::take(&mut self.form_reset)
    }

    fn contains(&self, id: &ProductId) -> bool {
        self.products.iter().any(|p| &p.id == id)
    }

    fn begin(&mut self, kind: MutationKind, target: Option<ProductId>) -> MutationTicket {
        self.mutations.insert(kind, MutationState::Pending);
        MutationTicket { kind, target }
    }

    fn settle(&mut self, ticket: &MutationTicket, ok: bool) -> MutationState {
        let state = if ok {
            MutationState::Success
        } else {
            MutationState::Failure
        };
        self.mutations.insert(ticket.kind, state);
        state
    }

    // ── COLLECTION ──────────────────────────────────────────────

    /// Replaces the collection with a freshly fetched one. Any local reorder
    /// is lost; selections of vanished rows are dropped.
    pub fn apply_products(&mut self, products: Vec<Product>) {
        self.products = products;
        self.loaded = true;
        self.stale = false;
        self.view.retain_existing(&self.products);
        let page = self.view.pagination.page_index;
        self.view.set_page_index(page, &self.products);
    }

    pub fn apply_load_failure(&mut self, error: &ApiError) {
        warn!("Product list fetch failed: {}", error);
        self.notifications.push(Notification::error(MSG_LOAD_FAILED));
    }

    pub async fn load(&mut self, api: &dyn ProductApi, access_token: &str) -> Result<(), ApiError> {
        match api.list_products(access_token).await {
            Ok(products) => {
                info!("Loaded {} products", products.len());
                self.apply_products(products);
                Ok(())
            }
            Err(e) => {
                self.apply_load_failure(&e);
                Err(e)
            }
        }
    }

    async fn refetch_if_stale(&mut self, api: &dyn ProductApi, access_token: &str) {
        if self.stale {
            // Failure is already surfaced as a notification.
            let _ = self.load(api, access_token).await;
        }
    }

    /// Moves the row `from_id` to the position currently held by `to_id`.
    /// Purely local: never sent to the API and lost on the next refetch.
    pub fn reorder(
        &mut self,
        from_id: &ProductId,
        to_id: &ProductId,
    ) -> Result<(), ControllerError> {
        let from = self
            .products
            .iter()
            .position(|p| &p.id == from_id)
            .ok_or_else(|| ControllerError::UnknownProduct(from_id.clone()))?;
        let to = self
            .products
            .iter()
            .position(|p| &p.id == to_id)
            .ok_or_else(|| ControllerError::UnknownProduct(to_id.clone()))?;
        if from != to {
            let row = self.products.remove(from);
            self.products.insert(to, row);
        }
        Ok(())
    }

    // ── DELETE ──────────────────────────────────────────────────

    pub fn begin_delete(&mut self, id: &ProductId) -> Result<MutationTicket, ControllerError> {
        if !self.contains(id) {
            return Err(ControllerError::UnknownProduct(id.clone()));
        }
        Ok(self.begin(MutationKind::Delete, Some(id.clone())))
    }

    pub fn finish_delete(
        &mut self,
        ticket: &MutationTicket,
        outcome: Result<(), ApiError>,
    ) -> MutationState {
        match outcome {
            Ok(()) => {
                info!("Deleted product {:?}", ticket.target);
                self.stale = true;
                self.notifications.push(Notification::success(MSG_DELETED));
                self.settle(ticket, true)
            }
            Err(e) => {
                warn!("Delete of product {:?} failed: {}", ticket.target, e);
                self.notifications.push(Notification::error(MSG_DELETE_FAILED));
                self.settle(ticket, false)
            }
        }
    }

    pub async fn delete(
        &mut self,
        api: &dyn ProductApi,
        access_token: &str,
        id: &ProductId,
    ) -> Result<MutationState, ControllerError> {
        let ticket = self.begin_delete(id)?;
        let outcome = api.delete_product(access_token, id).await;
        let state = self.finish_delete(&ticket, outcome);
        self.refetch_if_stale(api, access_token).await;
        Ok(state)
    }

    // ── UPDATE ──────────────────────────────────────────────────

    pub fn begin_update(
        &mut self,
        product: &Product,
    ) -> Result<(MutationTicket, ProductUpdate), ControllerError> {
        if !self.contains(&product.id) {
            return Err(ControllerError::UnknownProduct(product.id.clone()));
        }
        if !is_valid_price(product.price) {
            return Err(ControllerError::InvalidPrice(product.price));
        }
        let ticket = self.begin(MutationKind::Update, Some(product.id.clone()));
        Ok((ticket, ProductUpdate::from(product)))
    }

    pub fn finish_update(
        &mut self,
        ticket: &MutationTicket,
        outcome: Result<Option<Product>, ApiError>,
    ) -> MutationState {
        match outcome {
            Ok(_) => {
                info!("Updated product {:?}", ticket.target);
                self.stale = true;
                self.notifications.push(Notification::success(MSG_UPDATED));
                self.settle(ticket, true)
            }
            Err(e) => {
                warn!("Update of product {:?} failed: {}", ticket.target, e);
                self.notifications.push(Notification::error(MSG_UPDATE_FAILED));
                self.settle(ticket, false)
            }
        }
    }

    pub async fn update(
        &mut self,
        api: &dyn ProductApi,
        access_token: &str,
        product: &Product,
    ) -> Result<MutationState, ControllerError> {
        let (ticket, body) = self.begin_update(product)?;
        let outcome = api.update_product(access_token, &product.id, &body).await;
        let state = self.finish_update(&ticket, outcome);
        self.refetch_if_stale(api, access_token).await;
        Ok(state)
    }

    // ── CREATE ──────────────────────────────────────────────────

    pub fn begin_create(&mut self, draft: &NewProduct) -> Result<MutationTicket, ControllerError> {
        if draft.title.trim().is_empty() {
            return Err(ControllerError::EmptyTitle);
        }
        if !is_valid_price(draft.price) {
            return Err(ControllerError::InvalidPrice(draft.price));
        }
        Ok(self.begin(MutationKind::Create, None))
    }

    /// A created product is not merged into the table and no refetch is
    /// scheduled; it shows up on the next load.
    pub fn finish_create(
        &mut self,
        ticket: &MutationTicket,
        outcome: Result<Option<Product>, ApiError>,
    ) -> MutationState {
        match outcome {
            Ok(echo) => {
                match echo {
                    Some(product) => info!("Created product {}", product.id),
                    None => info!("Created product (no body echoed)"),
                }
                self.form_reset = true;
                self.notifications.push(Notification::success(MSG_CREATED));
                self.settle(ticket, true)
            }
            Err(e) => {
                warn!("Create product failed: {}", e);
                self.notifications.push(Notification::error(MSG_CREATE_FAILED));
                self.settle(ticket, false)
            }
        }
    }

    pub async fn create(
        &mut self,
        api: &dyn ProductApi,
        access_token: &str,
        draft: &NewProduct,
    ) -> Result<MutationState, ControllerError> {
        let ticket = self.begin_create(draft)?;
        let outcome = api.create_product(access_token, draft).await;
        Ok(self.finish_create(&ticket, outcome))
    }
}
