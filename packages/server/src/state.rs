use std::sync::Arc;

use common::storage::UploadStore;
use sea_orm::DatabaseConnection;

use crate::config::AppConfig;
use crate::services::mail::Mailer;
use crate::services::vision::VisionClient;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: AppConfig,
    pub uploads: Arc<dyn UploadStore>,
    pub mailer: Arc<dyn Mailer>,
    pub vision: Arc<dyn VisionClient>,
}
