use std::sync::Arc;

use caravan_collector::CollectorEngine;
use caravan_storage::Store;
use chrono::{DateTime, Utc};

use crate::mode::ModeController;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub collector: Arc<CollectorEngine>,
    pub mode: Arc<ModeController>,
    pub start_time: DateTime<Utc>,
}
