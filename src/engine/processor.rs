use crate::engine::batch::{binding_keys, BatchRequest, BindingKey, PlaceholderStyle};
use crate::engine::column::{ColumnPartition, ConflictTarget, EntityMetadata};
use crate::engine::dialect::UpsertDialect;
use crate::engine::error::{Result, UpsertError};
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Source of entity column metadata.
pub trait MetadataProvider: Send + Sync {
    fn describe(&self, entity_type: &str) -> Result<EntityMetadata>;
}

/// In-memory metadata, registered in code or loaded from a JSON manifest.
#[derive(Debug, Default, Clone)]
pub struct MetadataRegistry {
    entities: HashMap<String, EntityMetadata>,
}

#[derive(Deserialize)]
struct Manifest {
    entities: Vec<EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: EntityMetadata) -> &mut Self {
        self.entities.insert(metadata.entity_type.clone(), metadata);
        self
    }

    /// Parse a manifest of the form `{"entities": [...]}`.
    pub fn from_json_str(manifest: &str) -> anyhow::Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(manifest).context("Failed to parse metadata manifest")?;
        let mut registry = Self::new();
        for entity in manifest.entities {
            registry.register(entity);
        }
        Ok(registry)
    }

    pub fn from_manifest(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn describe(&self, entity_type: &str) -> Result<EntityMetadata> {
        self.entities
            .get(entity_type)
            .cloned()
            .ok_or_else(|| UpsertError::UnknownEntity {
                entity: entity_type.to_string(),
            })
    }
}

/// A rendered batch statement together with the bind order it expects.
#[derive(Clone, Debug)]
pub struct PreparedBatch {
    pub sql: String,
    pub style: PlaceholderStyle,
    pub request: BatchRequest,
    pub bindings: Vec<BindingKey>,
}

/// Turns entity metadata into upsert SQL for one dialect.
pub struct UpsertProcessor<P> {
    provider: P,
    dialect: &'static dyn UpsertDialect,
}

impl<P: MetadataProvider> UpsertProcessor<P> {
    pub fn new(provider: P, dialect: &'static dyn UpsertDialect) -> Self {
        Self { provider, dialect }
    }

    pub fn dialect(&self) -> &'static dyn UpsertDialect {
        self.dialect
    }

    /// Validated key/value split for `entity_type` against `target`.
    pub fn partition(&self, entity_type: &str, target: &ConflictTarget) -> Result<ColumnPartition> {
        self.provider.describe(entity_type)?.partition(target)
    }

    /// Single-row upsert keyed on the entity's primary key.
    pub fn process_upsert_entity(&self, entity_type: &str, table_name: &str) -> Result<String> {
        self.process_upsert_entity_on(entity_type, table_name, &ConflictTarget::PrimaryKey)
    }

    /// Single-row upsert keyed on an explicit conflict target.
    pub fn process_upsert_entity_on(
        &self,
        entity_type: &str,
        table_name: &str,
        target: &ConflictTarget,
    ) -> Result<String> {
        let partition = self.partition(entity_type, target)?;
        let sql = self.dialect.generate_upsert_sql(
            table_name,
            &partition.key_names(),
            &partition.value_names(),
        )?;
        debug!(entity = entity_type, dialect = self.dialect.name(), %sql, "generated upsert");
        Ok(sql)
    }

    /// Multi-row upsert for `row_count` rows plus its binding order.
    pub fn process_batch_upsert(
        &self,
        entity_type: &str,
        table_name: &str,
        target: &ConflictTarget,
        row_count: usize,
    ) -> Result<PreparedBatch> {
        let partition = self.partition(entity_type, target)?;
        let request = BatchRequest::from_partition(table_name, &partition, row_count);
        let sql = self.dialect.generate_batch_upsert_sql(&request)?;
        let style = self.dialect.placeholder_style();
        debug!(
            entity = entity_type,
            dialect = self.dialect.name(),
            rows = row_count,
            "generated batch upsert"
        );
        Ok(PreparedBatch {
            bindings: binding_keys(&request, style),
            sql,
            style,
            request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::column::{ColumnInfo, ValueKind};
    use crate::util::dialects::mysql::MYSQL_DIALECT;
    use crate::util::dialects::postgres::POSTGRES_DIALECT;

    fn registry() -> MetadataRegistry {
        let mut registry = MetadataRegistry::new();
        registry
            .register(
                EntityMetadata::new("Widget", "widgets")
                    .key(ColumnInfo::new("id", ValueKind::Int))
                    .column(ColumnInfo::new("name", ValueKind::Text))
                    .column(ColumnInfo::new("updated_at", ValueKind::Timestamp).generated())
                    .column(ColumnInfo::new("sku", ValueKind::Text))
                    .unique("widgets_sku_key", &["sku"]),
            )
            .register(
                EntityMetadata::new("Keyless", "keyless")
                    .column(ColumnInfo::new("name", ValueKind::Text)),
            )
            .register(
                EntityMetadata::new("OnlyKeys", "only_keys")
                    .key(ColumnInfo::new("id", ValueKind::Int))
                    .column(ColumnInfo::new("seq", ValueKind::Int).generated()),
            );
        registry
    }

    #[test]
    fn strips_generated_columns_from_values() {
        let processor = UpsertProcessor::new(registry(), &POSTGRES_DIALECT);
        let sql = processor.process_upsert_entity("Widget", "widgets").unwrap();
        assert_eq!(
            sql,
            "INSERT INTO widgets (id, name, sku) VALUES (?, ?, ?) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, sku = EXCLUDED.sku"
        );
    }

    #[test]
    fn targets_named_unique_constraint() {
        let processor = UpsertProcessor::new(registry(), &POSTGRES_DIALECT);
        let target = ConflictTarget::Constraint("widgets_sku_key".into());
        let sql = processor
            .process_upsert_entity_on("Widget", "widgets", &target)
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO widgets (sku, id, name) VALUES (?, ?, ?) \
             ON CONFLICT (sku) DO UPDATE SET id = EXCLUDED.id, name = EXCLUDED.name"
        );
    }

    #[test]
    fn missing_keys_name_the_entity() {
        let processor = UpsertProcessor::new(registry(), &MYSQL_DIALECT);
        let err = processor.process_upsert_entity("Keyless", "keyless").unwrap_err();
        assert_eq!(err, UpsertError::MissingKeyColumns { entity: "Keyless".into() });
        let message = err.to_string();
        assert!(message.contains("Keyless"));
        assert!(message.contains("primary key"));
    }

    #[test]
    fn missing_values_name_the_entity() {
        let processor = UpsertProcessor::new(registry(), &MYSQL_DIALECT);
        let err = processor.process_upsert_entity("OnlyKeys", "only_keys").unwrap_err();
        assert_eq!(err, UpsertError::MissingValueColumns { entity: "OnlyKeys".into() });
        assert!(err.to_string().contains("neither a key column nor generated"));
    }

    #[test]
    fn unknown_entity() {
        let processor = UpsertProcessor::new(registry(), &MYSQL_DIALECT);
        assert_eq!(
            processor.process_upsert_entity("Ghost", "ghosts").unwrap_err(),
            UpsertError::UnknownEntity { entity: "Ghost".into() }
        );
    }

    #[test]
    fn batch_carries_bindings() {
        let processor = UpsertProcessor::new(registry(), &POSTGRES_DIALECT);
        let prepared = processor
            .process_batch_upsert("Widget", "widgets", &ConflictTarget::PrimaryKey, 2)
            .unwrap();
        assert!(prepared.sql.contains("(:id_1, :name_1, :sku_1), (:id_2, :name_2, :sku_2)"));
        assert_eq!(prepared.bindings.len(), 6);
        assert_eq!(prepared.bindings[3], BindingKey::Named("id_2".into()));
    }

    #[test]
    fn loads_manifest() {
        let registry = MetadataRegistry::from_json_str(
            r#"{
                "entities": [{
                    "entity_type": "Account",
                    "table_name": "accounts",
                    "primary_key": ["tenant", "email"],
                    "columns": [
                        {"name": "tenant", "kind": "text"},
                        {"name": "email", "kind": "text"},
                        {"name": "profile", "kind": "json"}
                    ]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 1);

        let processor = UpsertProcessor::new(registry, &MYSQL_DIALECT);
        let sql = processor.process_upsert_entity("Account", "accounts").unwrap();
        assert_eq!(
            sql,
            "INSERT INTO accounts (tenant, email, profile) VALUES (?, ?, ?) \
             ON DUPLICATE KEY UPDATE profile = VALUES(profile)"
        );
    }
}
