// Database layer module: PostgreSQL pool and repositories

pub mod pool;
pub mod repositories;

pub use pool::DbPool;
