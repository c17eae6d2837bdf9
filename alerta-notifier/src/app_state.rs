use std::sync::Arc;

use crate::intake::NotificationIntake;
use crate::registry::SubscriberRegistry;

// Application state shared across all routes
#[derive(Clone)]
pub struct AppState {
    pub(crate) pool: Option<sqlx::PgPool>,
    pub(crate) registry: Arc<SubscriberRegistry>,
    pub(crate) intake: Arc<NotificationIntake>,
}
