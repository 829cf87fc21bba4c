pub mod api;
pub mod controller;
pub mod table;

pub use api::{ApiClient, ApiError, ProductApi, DEFAULT_API_BASE_URL};
pub use controller::{
    ControllerError, MutationKind, MutationState, MutationTicket, Notification,
    NotificationLevel, ProductTableController,
};
pub use table::{Column, TableError, TableView, TableViewState, PAGE_SIZES};
