use std::sync::Arc;

use crate::config::Config;
use crate::domain::ports::{EmailJobRepository, EmailSender};
use crate::domain::services::delivery::DeliveryService;
use crate::domain::services::recovery::RecoveryService;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub job_repo: Arc<dyn EmailJobRepository>,
    pub email_sender: Arc<dyn EmailSender>,
    pub delivery_service: Arc<DeliveryService>,
    pub recovery_service: Arc<RecoveryService>,
}
