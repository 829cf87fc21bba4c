use moka::future::Cache;
use shelf_client_sdk::{ProductApi, ProductTableController};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::session::Session;

pub type SharedTable = Arc<Mutex<ProductTableController>>;

/// One table controller per session id, dropped after the session has been
/// idle for the configured time or on logout.
pub struct TableRegistry {
    tables: Cache<String, SharedTable>,
}

impl TableRegistry {
    pub fn new(idle_secs: u64) -> Self {
        let tables = Cache::builder()
            .max_capacity(10_000)
            .time_to_idle(Duration::from_secs(idle_secs))
            .build();
        Self { tables }
    }

    pub async fn table_for(&self, session_id: &str) -> SharedTable {
        self.tables
            .get_with(session_id.to_string(), async {
                Arc::new(Mutex::new(ProductTableController::new()))
            })
            .await
    }

    pub async fn discard(&self, session_id: &str) {
        self.tables.invalidate(session_id).await;
    }

    /// Refetches the collection when the controller has never loaded or a
    /// confirmed mutation invalidated it. The lock is not held across the
    /// request, so concurrent mutations are not serialized.
    pub async fn ensure_fresh(&self, api: &dyn ProductApi, session: &Session, table: &SharedTable) {
        if !table.lock().await.needs_refetch() {
            return;
        }
        let outcome = api.list_products(session.access_token()).await;
        let mut controller = table.lock().await;
        match outcome {
            Ok(products) => controller.apply_products(products),
            Err(e) => controller.apply_load_failure(&e),
        }
    }
}
