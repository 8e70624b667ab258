//! Factory for creating persistence backends from configuration.

use revisit_core::config::{BackendProvider, ReviewerConfig};
#[cfg(not(feature = "sqlite"))]
use revisit_core::error::ReviewError;
use revisit_core::error::ReviewResult;
use revisit_core::memory_store::MemoryBackend;
use revisit_core::traits::PersistenceBackend;

use crate::JsonFileBackend;
#[cfg(feature = "sqlite")]
use crate::SqliteBackend;

/// Create the backend selected by `config.backend.provider`.
pub fn create_backend(config: &ReviewerConfig) -> ReviewResult<Box<dyn PersistenceBackend>> {
    let backend: Box<dyn PersistenceBackend> = match config.backend.provider {
        BackendProvider::Json => {
            let dir = config.backend.path.clone().unwrap_or_else(|| config.data_dir.clone());
            Box::new(JsonFileBackend::new(dir))
        }
        #[cfg(feature = "sqlite")]
        BackendProvider::Sqlite => Box::new(SqliteBackend::new(config.sqlite_path())?),
        #[cfg(not(feature = "sqlite"))]
        BackendProvider::Sqlite => {
            return Err(ReviewError::Configuration(
                "SQLite backend requires the 'sqlite' feature".to_string(),
            ))
        }
        BackendProvider::Memory => Box::new(MemoryBackend::new()),
    };

    tracing::info!(backend = backend.name(), "Created persistence backend");
    Ok(backend)
}
