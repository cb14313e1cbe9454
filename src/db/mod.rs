//! Database layer
//!
//! Connection pooling, embedded migrations, and repository traits with SQLx
//! implementations for SQLite (default) and MySQL.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
