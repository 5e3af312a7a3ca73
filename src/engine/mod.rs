pub mod batch;
pub mod column;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod json;
pub mod mysql;
pub mod postgres;
pub mod processor;
pub mod value;

use crate::engine::batch::BindingKey;
use crate::engine::column::ValueKind;
use crate::engine::value::SqlValue;
use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of input rows, each in `all_columns` order.
pub type RowStream = Pin<Box<dyn Stream<Item = Result<Vec<SqlValue>>> + Send>>;

/// One value ready to bind, with the column kind it was produced for.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundParam {
    pub key: BindingKey,
    pub kind: ValueKind,
    pub value: SqlValue,
}

/// SQL text plus its parameters in row-major binding order.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

/// Database engine trait for provider abstraction
#[async_trait]
pub trait DbEngine: Send + Sync {
    /// Connect to a database using the provider's URL format
    async fn connect(&self, url: &str) -> Result<Box<dyn DbSession>>;
}

/// Active database session
#[async_trait]
pub trait DbSession: Send {
    /// Declared product name of the backend (e.g. "PostgreSQL", "MySQL").
    async fn product_name(&mut self) -> Result<String>;

    /// Execute one statement inside its own transaction.
    /// Returns the number of affected rows; on error nothing is committed.
    async fn execute_bound(&mut self, statement: &BoundStatement) -> Result<u64>;
}

/// Factory for creating database engines from a connection URL
pub fn create_engine(url: &str) -> Result<Box<dyn DbEngine>> {
    let scheme = url.split("://").next().unwrap_or_default().to_lowercase();
    match scheme.as_str() {
        "postgres" | "postgresql" => Ok(Box::new(postgres::PostgresEngine)),
        "mysql" => Ok(Box::new(mysql::MysqlEngine)),
        _ => Err(anyhow::anyhow!("Unsupported database URL scheme: {}", scheme)),
    }
}
