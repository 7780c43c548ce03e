use super::postgres::PostgresStorage;
use super::sqlite::SqliteStorage;
use super::traits::Storage;
use crate::config::Config;
use crate::error::StorageError;
use std::sync::Arc;
use tracing::info;

/// Select and initialize the persistence backend.
///
/// A configured `DATABASE_URL` means hosted Postgres; otherwise the
/// embedded SQLite file under the data directory. The choice holds for the
/// lifetime of the process.
pub async fn create_storage(config: &Config) -> Result<Arc<dyn Storage>, StorageError> {
    let storage: Arc<dyn Storage> = match &config.database_url {
        Some(url) => Arc::new(PostgresStorage::connect(url).await?),
        None => Arc::new(SqliteStorage::open(&config.data_dir)?),
    };
    storage.init().await?;
    info!(backend = %storage.backend_name(), "storage backend selected");
    Ok(storage)
}
