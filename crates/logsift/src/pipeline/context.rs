use std::sync::Arc;

use crate::broadcast::Notifier;
use crate::db::Database;
use crate::queue::Inspector;
use crate::storage::ObjectStore;

use super::config::PipelineConfig;

/// Everything a job needs from the outside world.
///
/// Built once at startup and shared by every worker; cloning only bumps
/// reference counts.
#[derive(Clone)]
pub struct ServiceContext {
    pub db: Database,
    pub store: Arc<dyn ObjectStore>,
    pub inspector: Arc<dyn Inspector>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Arc<PipelineConfig>,
}

impl ServiceContext {
    pub fn new(
        db: Database,
        store: Arc<dyn ObjectStore>,
        inspector: Arc<dyn Inspector>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            db,
            store,
            inspector,
            notifier,
            config: Arc::new(config),
        }
    }
}
