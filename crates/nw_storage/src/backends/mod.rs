pub mod memory;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "notion")]
pub mod notion;

pub use memory::MemoryStorage;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStorage;

#[cfg(feature = "notion")]
pub use notion::NotionStorage;
