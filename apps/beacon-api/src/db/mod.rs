pub mod pg;
pub mod pool;
pub mod schema;
pub mod store;
