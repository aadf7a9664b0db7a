pub mod loader;
pub mod nzem;
pub mod prod_db;
pub mod query;
