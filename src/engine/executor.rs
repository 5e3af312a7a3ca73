use crate::engine::batch::BindingKey;
use crate::engine::column::ConflictTarget;
use crate::engine::error::UpsertError;
use crate::engine::json::{CompactJson, JsonSerializer};
use crate::engine::processor::{MetadataProvider, PreparedBatch, UpsertProcessor};
use crate::engine::value::SqlValue;
use crate::engine::{BoundParam, BoundStatement, DbSession, RowStream};
use crate::util::named_params::{self, NativeStyle};
use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

/// Where a streamed load writes to.
#[derive(Clone, Debug)]
pub struct LoadTarget<'a> {
    pub entity_type: &'a str,
    pub table_name: &'a str,
    pub conflict_target: &'a ConflictTarget,
    pub batch_rows: usize,
}

/// Binds row values to prepared upsert statements and runs them.
pub struct UpsertExecutor {
    serializer: Box<dyn JsonSerializer>,
}

impl Default for UpsertExecutor {
    fn default() -> Self {
        Self::new(Box::new(CompactJson))
    }
}

impl UpsertExecutor {
    pub fn new(serializer: Box<dyn JsonSerializer>) -> Self {
        Self { serializer }
    }

    /// Pair every row value with its binding key, row-major.
    ///
    /// Rows must match the prepared row count and each row must hold one value
    /// per column in `all_columns` order.
    pub fn bind(
        &self,
        prepared: &PreparedBatch,
        rows: &[Vec<SqlValue>],
    ) -> Result<BoundStatement, UpsertError> {
        let request = &prepared.request;
        let columns = request.all_columns();

        if rows.len() != request.row_count() {
            return Err(UpsertError::BatchSizeMismatch {
                table: request.table_name().to_string(),
                expected: request.row_count(),
                actual: rows.len(),
            });
        }

        let mut params = Vec::with_capacity(prepared.bindings.len());
        let mut keys = prepared.bindings.iter();
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(UpsertError::RowArity {
                    table: request.table_name().to_string(),
                    row: row_idx + 1,
                    expected: columns.len(),
                    actual: row.len(),
                });
            }
            for (column, value) in columns.iter().zip(row) {
                let value = match value {
                    SqlValue::Json(json) => {
                        SqlValue::String(self.serializer.serialize(column.name(), json)?)
                    }
                    other => other.clone(),
                };
                // bindings were generated for exactly rows x columns
                if let Some(key) = keys.next() {
                    params.push(BoundParam {
                        key: key.clone(),
                        kind: column.kind().clone(),
                        value,
                    });
                }
            }
        }

        Ok(BoundStatement {
            sql: prepared.sql.clone(),
            params,
        })
    }

    /// Bind and execute one batch; the whole batch commits or nothing does.
    pub async fn execute(
        &self,
        session: &mut dyn DbSession,
        prepared: &PreparedBatch,
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let statement = self.bind(prepared, rows)?;
        let table = prepared.request.table_name();
        debug!(table, rows = rows.len(), params = statement.params.len(), "executing upsert batch");
        session
            .execute_bound(&statement)
            .await
            .with_context(|| format!("Failed to upsert batch of {} rows into table '{}'", rows.len(), table))
    }

    /// Upsert every row of `rows` in batches of `target.batch_rows`.
    ///
    /// Statements are generated once per distinct batch length. Stops at the
    /// first failing batch; earlier batches stay committed.
    pub async fn load_stream<P, F>(
        &self,
        session: &mut dyn DbSession,
        processor: &UpsertProcessor<P>,
        target: LoadTarget<'_>,
        mut rows: RowStream,
        mut on_progress: F,
    ) -> Result<u64>
    where
        P: MetadataProvider,
        F: FnMut(u64),
    {
        if target.batch_rows == 0 {
            bail!("Batch size must be at least 1");
        }

        // A full batch must fit the backend's parameter limit before any input is read.
        let full = processor.process_batch_upsert(
            target.entity_type,
            target.table_name,
            target.conflict_target,
            target.batch_rows,
        )?;
        let mut prepared: HashMap<usize, PreparedBatch> = HashMap::new();
        prepared.insert(target.batch_rows, full);
        let mut batch: Vec<Vec<SqlValue>> = Vec::with_capacity(target.batch_rows);
        let mut total_rows = 0u64;

        while let Some(row_result) = rows.next().await {
            batch.push(row_result?);

            if batch.len() >= target.batch_rows {
                let upserted = self
                    .flush(session, processor, &target, &mut prepared, &batch)
                    .await
                    .with_context(|| rows_context(total_rows, batch.len()))?;
                total_rows += upserted;
                on_progress(total_rows);
                batch.clear();
            }
        }

        if !batch.is_empty() {
            let upserted = self
                .flush(session, processor, &target, &mut prepared, &batch)
                .await
                .with_context(|| rows_context(total_rows, batch.len()))?;
            total_rows += upserted;
            on_progress(total_rows);
        }

        info!(table = target.table_name, rows = total_rows, "load finished");
        Ok(total_rows)
    }

    async fn flush<P: MetadataProvider>(
        &self,
        session: &mut dyn DbSession,
        processor: &UpsertProcessor<P>,
        target: &LoadTarget<'_>,
        prepared: &mut HashMap<usize, PreparedBatch>,
        batch: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if !prepared.contains_key(&batch.len()) {
            let statement = processor.process_batch_upsert(
                target.entity_type,
                target.table_name,
                target.conflict_target,
                batch.len(),
            )?;
            prepared.insert(batch.len(), statement);
        }
        let statement = &prepared[&batch.len()];
        self.execute(session, statement, batch).await?;
        Ok(batch.len() as u64)
    }
}

fn rows_context(done: u64, len: usize) -> String {
    format!("Input rows {}-{} were not upserted", done + 1, done + len as u64)
}

/// Rewrite a bound statement into the driver's placeholder form and order
/// its parameters to match.
pub fn native_statement(
    statement: &BoundStatement,
    style: NativeStyle,
) -> Result<(String, Vec<BoundParam>)> {
    let named = statement
        .params
        .iter()
        .any(|p| matches!(p.key, BindingKey::Named(_)));

    if !named {
        let mut params = statement.params.clone();
        params.sort_by_key(|p| match p.key {
            BindingKey::Position(pos) => pos,
            BindingKey::Named(_) => usize::MAX,
        });
        return Ok((statement.sql.clone(), params));
    }

    let by_name: HashMap<&str, &BoundParam> = statement
        .params
        .iter()
        .filter_map(|p| match &p.key {
            BindingKey::Named(name) => Some((name.as_str(), p)),
            BindingKey::Position(_) => None,
        })
        .collect();

    let expanded = named_params::expand(&statement.sql, style);
    let mut params = Vec::with_capacity(expanded.names.len());
    for name in &expanded.names {
        match by_name.get(name.as_str()) {
            Some(param) => params.push((*param).clone()),
            None => bail!("No value bound for parameter ':{}'", name),
        }
    }
    Ok((expanded.sql, params))
}
