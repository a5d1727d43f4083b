//! # chat-db
//!
//! Message store adapters implementing [`chat_core::MessageStore`].
//!
//! ## Overview
//!
//! - PostgreSQL store via SQLx, with connection pool management and migrations
//! - In-memory store for local development and tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chat_db::{create_pool, run_migrations, PgMessageStore, PoolSettings};
//!
//! async fn example(config: &chat_common::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let database = config.database.as_ref().ok_or("DATABASE_URL not set")?;
//!     let pool = create_pool(&PoolSettings::from(database)).await?;
//!     run_migrations(&pool).await?;
//!     let store = PgMessageStore::new(pool);
//!
//!     // Use the store...
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, PgPool, PoolSettings};
pub use repositories::{MemoryMessageStore, PgMessageStore};
