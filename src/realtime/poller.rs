//! Fixed-interval polling driver around the reconciler.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::catalog::{Agency, Catalog};

use super::{Reconciler, Vehicle};

/// Shared vehicle snapshot, replaced wholesale by the last completed cycle.
pub type VehicleStore = Arc<RwLock<Vec<Vehicle>>>;

pub struct Poller {
    reconciler: Reconciler,
    catalog: Arc<Catalog>,
    agency: Option<Agency>,
    interval_secs: u64,
    store: VehicleStore,
}

impl Poller {
    pub fn new(
        reconciler: Reconciler,
        catalog: Arc<Catalog>,
        agency: Option<Agency>,
        interval_secs: u64,
    ) -> Self {
        Self {
            reconciler,
            catalog,
            agency,
            interval_secs,
            store: VehicleStore::default(),
        }
    }

    /// Shared handle for readers.
    pub fn store(&self) -> VehicleStore {
        self.store.clone()
    }

    /// Poll forever. A cycle that fails yields an empty list and the next
    /// tick retries; each completed cycle replaces the store contents in a
    /// single write, so a slow older cycle can never leave partial state.
    pub async fn run(&self) {
        info!(interval_secs = self.interval_secs, "Starting vehicle poll loop");
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            let vehicles = self.reconciler.poll(&self.catalog, self.agency).await;
            info!(vehicles = vehicles.len(), "Completed vehicle poll cycle");
            *self.store.write().await = vehicles;
        }
    }
}
