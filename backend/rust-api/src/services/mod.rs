use std::sync::Arc;

use crate::config::{Config, StoreDriver};
use backend_api::BackendApiClient;
use store::{InMemoryStore, PostgrestStore, RelationalStore};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn RelationalStore>,
    pub backend: BackendApiClient,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn RelationalStore> = match config.store_driver {
            StoreDriver::Postgrest => {
                tracing::info!(url = %config.supabase.url, "Using Supabase REST store");
                Arc::new(PostgrestStore::new(&config.supabase)?)
            }
            StoreDriver::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                Arc::new(InMemoryStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: Arc<dyn RelationalStore>) -> Self {
        let backend = BackendApiClient::new(config.backend_api_url.clone());
        Self {
            config,
            store,
            backend,
        }
    }

    pub fn module_statuses(&self) -> module_status_service::ModuleStatusService {
        module_status_service::ModuleStatusService::new(
            self.store.clone(),
            self.config.learning_path.clone(),
        )
    }

    pub fn section_statuses(&self) -> section_status_service::SectionStatusService {
        section_status_service::SectionStatusService::new(
            self.store.clone(),
            self.config.learning_path.clone(),
        )
    }

    pub fn lecture_progress(&self) -> lecture_progress_service::LectureProgressService {
        lecture_progress_service::LectureProgressService::new(self.store.clone())
    }

    pub fn learning_paths(&self) -> learning_path_service::LearningPathService {
        learning_path_service::LearningPathService::new(
            self.store.clone(),
            self.config.learning_path.clone(),
        )
    }
}

pub mod activation;
pub mod backend_api;
pub mod chunked_fetch;
pub mod hierarchy_fetcher;
pub mod identifier_resolver;
pub mod learning_path_service;
pub mod lecture_progress_service;
pub mod module_aggregator;
pub mod module_status_service;
pub mod section_requirements;
pub mod section_status_service;
pub mod store;
