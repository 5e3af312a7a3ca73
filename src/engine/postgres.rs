use super::{BoundParam, BoundStatement, DbEngine, DbSession};
use crate::engine::column::ValueKind;
use crate::engine::executor::native_statement;
use crate::engine::value::SqlValue;
use crate::util::named_params::NativeStyle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::postgres::{PgArguments, PgConnection};
use sqlx::query::Query;
use sqlx::types::BigDecimal;
use sqlx::{Connection, Postgres};

pub struct PostgresEngine;

#[async_trait]
impl DbEngine for PostgresEngine {
    async fn connect(&self, url: &str) -> Result<Box<dyn DbSession>> {
        let conn = PgConnection::connect(url)
            .await
            .context("Failed to connect to PostgreSQL database")?;

        Ok(Box::new(PostgresSession { conn }))
    }
}

pub struct PostgresSession {
    conn: PgConnection,
}

#[async_trait]
impl DbSession for PostgresSession {
    async fn product_name(&mut self) -> Result<String> {
        let version: String = sqlx::query_scalar("SELECT version()")
            .fetch_one(&mut self.conn)
            .await
            .context("Failed to query server version")?;
        Ok(product_from_version(&version))
    }

    async fn execute_bound(&mut self, statement: &BoundStatement) -> Result<u64> {
        let (sql, params) = native_statement(statement, NativeStyle::Numbered)?;

        let mut tx = self.conn.begin().await?;
        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param);
        }
        // dropping an uncommitted transaction rolls it back
        let result = query.execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

/// `SELECT version()` reads like "PostgreSQL 16.2 on x86_64-pc-linux-gnu, ...".
fn product_from_version(version: &str) -> String {
    version
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string()
}

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

fn bind_param(query: PgQuery<'_>, param: BoundParam) -> PgQuery<'_> {
    match param.value {
        SqlValue::Null => bind_null(query, &param.kind),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Float(v) => query.bind(v),
        SqlValue::Decimal(v) => query.bind(v),
        SqlValue::String(v) => query.bind(v),
        SqlValue::Bytes(v) => query.bind(v),
        SqlValue::Date(v) => query.bind(v),
        SqlValue::Time(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

/// PostgreSQL checks parameter types, so NULLs are sent with the column's type.
fn bind_null<'q>(query: PgQuery<'q>, kind: &ValueKind) -> PgQuery<'q> {
    match kind {
        ValueKind::Bool => query.bind(None::<bool>),
        ValueKind::Int => query.bind(None::<i64>),
        ValueKind::Float => query.bind(None::<f64>),
        ValueKind::Decimal => query.bind(None::<BigDecimal>),
        ValueKind::Bytes => query.bind(None::<Vec<u8>>),
        ValueKind::Date => query.bind(None::<NaiveDate>),
        ValueKind::Time => query.bind(None::<NaiveTime>),
        ValueKind::Timestamp => query.bind(None::<NaiveDateTime>),
        // text-bound kinds are cast in the generated SQL
        ValueKind::Text | ValueKind::Json | ValueKind::Uuid | ValueKind::Other(_) => {
            query.bind(None::<String>)
        }
    }
}
