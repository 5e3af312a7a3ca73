use crate::engine::error::{Result, UpsertError};
use serde::Deserialize;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Semantic type of a column's values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    Json,
    Uuid,
    Other(String),
}

impl ValueKind {
    /// JDBC type code used when the metadata does not carry one.
    pub fn default_sql_type(&self) -> i32 {
        match self {
            ValueKind::Bool => 16,
            ValueKind::Int => -5,
            ValueKind::Float => 8,
            ValueKind::Decimal => 3,
            ValueKind::Text => 12,
            ValueKind::Bytes => -3,
            ValueKind::Date => 91,
            ValueKind::Time => 92,
            ValueKind::Timestamp => 93,
            ValueKind::Json | ValueKind::Uuid | ValueKind::Other(_) => 1111,
        }
    }
}

/// Immutable descriptor of a single mapped column.
///
/// Two descriptors are equal when their physical names match, which is what
/// partitioning relies on.
#[derive(Clone, Debug, Deserialize)]
#[serde(from = "ColumnSpec")]
pub struct ColumnInfo {
    name: String,
    property_name: String,
    kind: ValueKind,
    sql_type: i32,
    generated: bool,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        Self {
            property_name: name.clone(),
            sql_type: kind.default_sql_type(),
            name,
            kind,
            generated: false,
        }
    }

    pub fn with_property(mut self, property_name: impl Into<String>) -> Self {
        self.property_name = property_name.into();
        self
    }

    pub fn with_sql_type(mut self, sql_type: i32) -> Self {
        self.sql_type = sql_type;
        self
    }

    /// Mark the column as assigned by the backend (identity, auto-increment).
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    pub fn kind(&self) -> &ValueKind {
        &self.kind
    }

    pub fn sql_type(&self) -> i32 {
        self.sql_type
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }
}

impl PartialEq for ColumnInfo {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ColumnInfo {}

impl Hash for ColumnInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Manifest representation of a column; optional fields fall back to
/// values derived from the name and kind.
#[derive(Deserialize)]
struct ColumnSpec {
    name: String,
    #[serde(default)]
    property: Option<String>,
    kind: ValueKind,
    #[serde(default)]
    sql_type: Option<i32>,
    #[serde(default)]
    generated: bool,
}

impl From<ColumnSpec> for ColumnInfo {
    fn from(raw: ColumnSpec) -> Self {
        let mut column = ColumnInfo::new(raw.name, raw.kind);
        if let Some(property) = raw.property {
            column = column.with_property(property);
        }
        if let Some(sql_type) = raw.sql_type {
            column = column.with_sql_type(sql_type);
        }
        if raw.generated {
            column = column.generated();
        }
        column
    }
}

/// Named group of columns that can serve as an alternate conflict target.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
}

/// Column set used to detect a colliding row.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum ConflictTarget {
    #[default]
    PrimaryKey,
    Constraint(String),
}

/// Key/value split of an entity's columns.
///
/// `all_columns` is always `key_columns ++ value_columns`; that order is the
/// column order of emitted SQL and the order callers must supply values in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnPartition {
    key_columns: Vec<ColumnInfo>,
    value_columns: Vec<ColumnInfo>,
    all_columns: Vec<ColumnInfo>,
}

impl ColumnPartition {
    /// Build a partition for `owner` (an entity type or table name).
    ///
    /// Generated columns are dropped from the value side; key columns keep
    /// them so identity columns can still act as conflict targets.
    pub fn new(owner: &str, keys: Vec<ColumnInfo>, values: Vec<ColumnInfo>) -> Result<Self> {
        let values: Vec<ColumnInfo> = values.into_iter().filter(|c| !c.is_generated()).collect();

        if keys.is_empty() {
            return Err(UpsertError::MissingKeyColumns {
                entity: owner.to_string(),
            });
        }
        if values.is_empty() {
            return Err(UpsertError::MissingValueColumns {
                entity: owner.to_string(),
            });
        }

        check_distinct(
            owner,
            keys.iter().map(ColumnInfo::name),
            values.iter().map(ColumnInfo::name),
        )?;

        let all_columns = keys.iter().chain(values.iter()).cloned().collect();
        Ok(Self {
            key_columns: keys,
            value_columns: values,
            all_columns,
        })
    }

    pub fn key_columns(&self) -> &[ColumnInfo] {
        &self.key_columns
    }

    pub fn value_columns(&self) -> &[ColumnInfo] {
        &self.value_columns
    }

    pub fn all_columns(&self) -> &[ColumnInfo] {
        &self.all_columns
    }

    pub fn key_names(&self) -> Vec<String> {
        names(&self.key_columns)
    }

    pub fn value_names(&self) -> Vec<String> {
        names(&self.value_columns)
    }
}

/// Column metadata for one entity, as reported by a metadata provider.
#[derive(Clone, Debug, Deserialize)]
pub struct EntityMetadata {
    pub entity_type: String,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl EntityMetadata {
    pub fn new(entity_type: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique_constraints: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnInfo) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a column and mark it as part of the primary key.
    pub fn key(mut self, column: ColumnInfo) -> Self {
        self.primary_key.push(column.name().to_string());
        self.columns.push(column);
        self
    }

    pub fn unique(mut self, name: impl Into<String>, columns: &[&str]) -> Self {
        self.unique_constraints.push(UniqueConstraint {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    /// Primary key when declared, otherwise the first declared unique
    /// constraint. Entities with neither resolve to the primary key, which
    /// then fails partitioning.
    pub fn preferred_target(&self) -> ConflictTarget {
        if self.primary_key.is_empty() {
            if let Some(first) = self.unique_constraints.first() {
                return ConflictTarget::Constraint(first.name.clone());
            }
        }
        ConflictTarget::PrimaryKey
    }

    /// Split the columns into conflict-target keys and updatable values.
    pub fn partition(&self, target: &ConflictTarget) -> Result<ColumnPartition> {
        let key_names: &[String] = match target {
            ConflictTarget::PrimaryKey => &self.primary_key,
            ConflictTarget::Constraint(name) => {
                &self
                    .unique_constraints
                    .iter()
                    .find(|c| &c.name == name)
                    .ok_or_else(|| UpsertError::UnknownConstraint {
                        entity: self.entity_type.clone(),
                        constraint: name.clone(),
                    })?
                    .columns
            }
        };

        let keys = key_names
            .iter()
            .map(|name| {
                self.columns
                    .iter()
                    .find(|c| c.name() == name)
                    .cloned()
                    .ok_or_else(|| UpsertError::UnknownColumn {
                        entity: self.entity_type.clone(),
                        column: name.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let values = self
            .columns
            .iter()
            .filter(|c| !key_names.iter().any(|k| k == c.name()))
            .cloned()
            .collect();

        ColumnPartition::new(&self.entity_type, keys, values)
    }
}

/// Key names must be unique, value names must be unique, and no name may
/// sit on both sides.
pub fn check_distinct<'a>(
    owner: &str,
    keys: impl IntoIterator<Item = &'a str>,
    values: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let mut seen_keys = HashSet::new();
    for key in keys {
        if !seen_keys.insert(key) {
            return Err(UpsertError::DuplicateColumn {
                table: owner.to_string(),
                column: key.to_string(),
            });
        }
    }

    let mut seen_values = HashSet::new();
    for value in values {
        if seen_keys.contains(value) {
            return Err(UpsertError::KeyValueOverlap {
                table: owner.to_string(),
                column: value.to_string(),
            });
        }
        if !seen_values.insert(value) {
            return Err(UpsertError::DuplicateColumn {
                table: owner.to_string(),
                column: value.to_string(),
            });
        }
    }
    Ok(())
}

pub fn names(columns: &[ColumnInfo]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}
