pub mod memory_store;
pub mod models;
pub mod order_repo;
pub mod redis_store;
