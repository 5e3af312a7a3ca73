use super::{BoundParam, BoundStatement, DbEngine, DbSession};
use crate::engine::executor::native_statement;
use crate::engine::value::SqlValue;
use crate::util::named_params::NativeStyle;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{Connection, MySql};

pub struct MysqlEngine;

#[async_trait]
impl DbEngine for MysqlEngine {
    async fn connect(&self, url: &str) -> Result<Box<dyn DbSession>> {
        let conn = MySqlConnection::connect(url)
            .await
            .context("Failed to connect to MySQL database")?;

        Ok(Box::new(MysqlSession { conn }))
    }
}

pub struct MysqlSession {
    conn: MySqlConnection,
}

#[async_trait]
impl DbSession for MysqlSession {
    async fn product_name(&mut self) -> Result<String> {
        let (version, comment): (String, String) =
            sqlx::query_as("SELECT VERSION(), @@version_comment")
                .fetch_one(&mut self.conn)
                .await
                .context("Failed to query server version")?;
        Ok(product_from_version(&version, &comment))
    }

    async fn execute_bound(&mut self, statement: &BoundStatement) -> Result<u64> {
        let (sql, params) = native_statement(statement, NativeStyle::Question)?;

        let mut tx = self.conn.begin().await?;
        let mut query = sqlx::query(&sql);
        for param in params {
            query = bind_param(query, param);
        }
        let result = query.execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected())
    }
}

/// MariaDB reports itself in the version string ("10.11.6-MariaDB") or the
/// version comment; everything else on this wire is MySQL.
fn product_from_version(version: &str, comment: &str) -> String {
    let haystack = format!("{} {}", version, comment).to_lowercase();
    if haystack.contains("mariadb") {
        "MariaDB".to_string()
    } else {
        "MySQL".to_string()
    }
}

type MySqlQuery<'q> = Query<'q, MySql, MySqlArguments>;

fn bind_param(query: MySqlQuery<'_>, param: BoundParam) -> MySqlQuery<'_> {
    match param.value {
        SqlValue::Null => query.bind(None::<String>),
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
