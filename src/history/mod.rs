mod file;
mod memory;
mod redis;
use async_trait::async_trait;
use log::info;
use std::error::Error;
use std::sync::Arc;

pub use self::file::FileHistoryStore;
pub use self::memory::MemoryHistoryStore;
pub use self::redis::RedisHistoryStore;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("history io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("history redis error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("invalid history key: {0}")]
    InvalidKey(String),
}

/// Asynchronous key-value store holding serialized conversation logs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, HistoryError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), HistoryError>;

    async fn delete(&self, key: &str) -> Result<(), HistoryError>;
}

pub fn create_history_store(
    history_type: &str,
    history_host: &str,
    redis_prefix: &str
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    match history_type.to_lowercase().as_str() {
        "file" => {
            let store = FileHistoryStore::new(history_host)?;
            Ok(Arc::new(store))
        }
        "redis" => {
            let store = RedisHistoryStore::new(history_host, redis_prefix)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryHistoryStore::new())),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(
    history_type: &str,
    history_host: &str,
    redis_prefix: &str
) -> Result<Arc<dyn HistoryStore>, Box<dyn Error + Send + Sync>> {
    info!("Chat history will be stored in: {} at {}", history_type, history_host);
    create_history_store(history_type, history_host, redis_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_store_type_is_rejected() {
        let result = create_history_store("qdrant", "localhost", "history:");
        assert!(result.is_err());
    }

    #[test]
    fn store_type_is_case_insensitive() {
        assert!(create_history_store("Memory", "", "").is_ok());
    }
}
