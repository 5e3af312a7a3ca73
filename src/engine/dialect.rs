use crate::engine::batch::{BatchRequest, PlaceholderStyle};
use crate::engine::column::check_distinct;
use crate::engine::error::{Result, UpsertError};
use crate::engine::DbSession;
use crate::util::dialects::mysql::MYSQL_DIALECT;
use crate::util::dialects::postgres::POSTGRES_DIALECT;
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Backend-specific rendering of upsert statements.
///
/// Implementations never quote identifiers: table and column names are
/// expected to be valid unquoted SQL already. Values are only ever bound.
pub trait UpsertDialect: Send + Sync {
    /// Dialect display name (used in logs).
    fn name(&self) -> &'static str;

    /// Placeholder spelling used by batch statements.
    fn placeholder_style(&self) -> PlaceholderStyle;

    /// Single-row upsert with positional `?` placeholders in
    /// `key_columns ++ value_columns` order.
    fn generate_upsert_sql(
        &self,
        table: &str,
        key_columns: &[String],
        value_columns: &[String],
    ) -> Result<String>;

    /// Multi-row upsert for `request.row_count()` rows in one statement.
    fn generate_batch_upsert_sql(&self, request: &BatchRequest) -> Result<String>;
}

/// Reject single-row requests that would render a degenerate statement.
pub fn check_columns(table: &str, key_columns: &[String], value_columns: &[String]) -> Result<()> {
    if key_columns.is_empty() {
        return Err(UpsertError::MissingKeyColumns {
            entity: table.to_string(),
        });
    }
    if value_columns.is_empty() {
        return Err(UpsertError::MissingValueColumns {
            entity: table.to_string(),
        });
    }
    check_distinct(
        table,
        key_columns.iter().map(String::as_str),
        value_columns.iter().map(String::as_str),
    )
}

/// Map a backend's declared product name to its dialect.
pub fn dialect_for_product(product: &str) -> Result<&'static dyn UpsertDialect> {
    let normalized = product.trim().to_lowercase();
    if normalized.contains("postgres") {
        Ok(&POSTGRES_DIALECT)
    } else if normalized.contains("mysql") || normalized.contains("mariadb") {
        Ok(&MYSQL_DIALECT)
    } else {
        Err(UpsertError::UnsupportedDatabase {
            product: product.to_string(),
        })
    }
}

/// Picks the dialect for a live session from its product identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct DialectFactory;

impl DialectFactory {
    pub async fn get_dialect(
        &self,
        session: &mut dyn DbSession,
    ) -> anyhow::Result<&'static dyn UpsertDialect> {
        let product = session
            .product_name()
            .await
            .context("Failed to read database product name")?;
        let dialect = dialect_for_product(&product)?;
        debug!(product = %product, dialect = dialect.name(), "resolved upsert dialect");
        Ok(dialect)
    }
}

/// Dialect resolution memoized per product identity.
///
/// A product name is resolved at most once; unsupported names are not
/// cached and fail every time.
#[derive(Default)]
pub struct CachedDialectFactory {
    resolved: Mutex<HashMap<String, &'static dyn UpsertDialect>>,
}

impl CachedDialectFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, product: &str) -> Result<&'static dyn UpsertDialect> {
        let mut resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(dialect) = resolved.get(product) {
            return Ok(*dialect);
        }
        let dialect = dialect_for_product(product)?;
        resolved.insert(product.to_string(), dialect);
        Ok(dialect)
    }

    pub async fn get_dialect(
        &self,
        session: &mut dyn DbSession,
    ) -> anyhow::Result<&'static dyn UpsertDialect> {
        let product = session
            .product_name()
            .await
            .context("Failed to read database product name")?;
        Ok(self.resolve(&product)?)
    }

    pub fn cached_products(&self) -> usize {
        self.resolved.lock().map(|r| r.len()).unwrap_or(0)
    }
}
