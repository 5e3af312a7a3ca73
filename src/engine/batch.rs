//! Dialect-agnostic expansion of a single-row tuple into multi-row
//! `VALUES` lists.
//!
//! Named placeholders carry a 1-based row suffix (`:name_3`) so rows sharing
//! one statement never bind to the same parameter. Tuples follow caller row
//! order and columns follow `all_columns` order; the execution layer binds
//! values row-major against [`binding_keys`].

use crate::engine::column::{check_distinct, ColumnInfo, ColumnPartition};
use crate::engine::error::{Result, UpsertError};

/// Bind parameters one statement may carry on both PostgreSQL and MySQL.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// How parameters are spelled in a generated statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every value.
    Positional,
    /// `:<column>_<row>`.
    Named,
}

/// Where one bound value goes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindingKey {
    Named(String),
    /// 1-based position across the whole statement.
    Position(usize),
}

/// Everything a dialect needs to render one multi-row upsert.
#[derive(Clone, Debug)]
pub struct BatchRequest {
    table_name: String,
    key_columns: Vec<ColumnInfo>,
    all_columns: Vec<ColumnInfo>,
    value_columns: Vec<ColumnInfo>,
    row_count: usize,
}

impl BatchRequest {
    /// `all_columns` is always `key_columns ++ value_columns`.
    pub fn new(
        table_name: impl Into<String>,
        key_columns: Vec<ColumnInfo>,
        value_columns: Vec<ColumnInfo>,
        row_count: usize,
    ) -> Self {
        let all_columns = key_columns.iter().chain(&value_columns).cloned().collect();
        Self {
            table_name: table_name.into(),
            key_columns,
            all_columns,
            value_columns,
            row_count,
        }
    }

    pub fn from_partition(
        table_name: impl Into<String>,
        partition: &ColumnPartition,
        row_count: usize,
    ) -> Self {
        Self::new(
            table_name,
            partition.key_columns().to_vec(),
            partition.value_columns().to_vec(),
            row_count,
        )
    }

    /// Reject requests that would render a degenerate statement.
    pub fn validate(&self) -> Result<()> {
        if self.key_columns.is_empty() {
            return Err(UpsertError::MissingKeyColumns {
                entity: self.table_name.clone(),
            });
        }
        if self.value_columns.is_empty() {
            return Err(UpsertError::MissingValueColumns {
                entity: self.table_name.clone(),
            });
        }
        check_distinct(
            &self.table_name,
            self.key_columns.iter().map(ColumnInfo::name),
            self.value_columns.iter().map(ColumnInfo::name),
        )?;
        if self.row_count < 1 {
            return Err(UpsertError::InvalidRowCount {
                table: self.table_name.clone(),
                row_count: self.row_count,
            });
        }
        let params = self.all_columns.len().saturating_mul(self.row_count);
        if params > MAX_BIND_PARAMS {
            return Err(UpsertError::TooManyParameters {
                table: self.table_name.clone(),
                row_count: self.row_count,
                columns: self.all_columns.len(),
                limit: MAX_BIND_PARAMS,
            });
        }
        Ok(())
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn key_columns(&self) -> &[ColumnInfo] {
        &self.key_columns
    }

    pub fn all_columns(&self) -> &[ColumnInfo] {
        &self.all_columns
    }

    pub fn value_columns(&self) -> &[ColumnInfo] {
        &self.value_columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }
}

pub fn named_placeholder(column: &str, row: usize) -> String {
    format!(":{}_{}", column, row)
}

fn placeholder(style: PlaceholderStyle, column: &str, row: usize) -> String {
    match style {
        PlaceholderStyle::Positional => "?".to_string(),
        PlaceholderStyle::Named => named_placeholder(column, row),
    }
}

/// Join column names with `, ` in the given order.
pub fn column_list<'a>(columns: impl IntoIterator<Item = &'a str>) -> String {
    columns.into_iter().collect::<Vec<_>>().join(", ")
}

/// One parenthesized tuple for `row` (1-based). `render` may wrap each
/// placeholder, e.g. with a cast.
pub fn row_tuple<F>(columns: &[ColumnInfo], row: usize, style: PlaceholderStyle, render: &F) -> String
where
    F: Fn(&ColumnInfo, String) -> String,
{
    let mut tuple = String::with_capacity(columns.len() * 8 + 2);
    tuple.push('(');
    for (idx, column) in columns.iter().enumerate() {
        if idx > 0 {
            tuple.push_str(", ");
        }
        tuple.push_str(&render(column, placeholder(style, column.name(), row)));
    }
    tuple.push(')');
    tuple
}

/// `row_count` tuples joined by `, `.
pub fn values_clause<F>(
    columns: &[ColumnInfo],
    row_count: usize,
    style: PlaceholderStyle,
    render: &F,
) -> String
where
    F: Fn(&ColumnInfo, String) -> String,
{
    let mut clause = String::new();
    for row in 1..=row_count {
        if row > 1 {
            clause.push_str(", ");
        }
        clause.push_str(&row_tuple(columns, row, style, render));
    }
    clause
}

/// Plain placeholders, no wrapping.
pub fn bare(_: &ColumnInfo, placeholder: String) -> String {
    placeholder
}

/// Binding order implied by a statement rendered for `request`: row-major,
/// `all_columns` order within each row.
pub fn binding_keys(request: &BatchRequest, style: PlaceholderStyle) -> Vec<BindingKey> {
    let width = request.all_columns().len();
    let mut keys = Vec::with_capacity(width * request.row_count());
    for row in 1..=request.row_count() {
        for (idx, column) in request.all_columns().iter().enumerate() {
            keys.push(match style {
                PlaceholderStyle::Positional => BindingKey::Position((row - 1) * width + idx + 1),
                PlaceholderStyle::Named => BindingKey::Named(format!("{}_{}", column.name(), row)),
            });
        }
    }
    keys
}
