// Service exports
pub mod cache;
pub mod cached;
pub mod gateway;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use cached::CachedStore;
pub use gateway::{Gateway, GatewayError, HttpGateway, LogGateway};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use store::{ProfileStore, StoreError};
