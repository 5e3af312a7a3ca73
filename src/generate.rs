use anyhow::{Context, Result};
use upsquel::engine::column::ConflictTarget;
use upsquel::engine::dialect::dialect_for_product;
use upsquel::engine::processor::{MetadataProvider, MetadataRegistry, UpsertProcessor};

pub struct GenerateOptions {
    pub manifest: String,
    pub entity: String,
    pub table: Option<String>,
    pub product: &'static str,
    pub constraint: Option<String>,
    pub rows: Option<usize>,
}

/// Render the upsert statement for one entity without touching a database.
pub fn generate(opts: &GenerateOptions) -> Result<String> {
    let registry = MetadataRegistry::from_manifest(&opts.manifest)?;
    let metadata = registry.describe(&opts.entity)?;
    let table = opts
        .table
        .clone()
        .unwrap_or_else(|| metadata.table_name.clone());
    let target = match &opts.constraint {
        Some(name) => ConflictTarget::Constraint(name.clone()),
        None => metadata.preferred_target(),
    };

    let processor = UpsertProcessor::new(registry, dialect_for_product(opts.product)?);
    let sql = match opts.rows {
        Some(rows) => {
            processor
                .process_batch_upsert(&opts.entity, &table, &target, rows)
                .with_context(|| format!("Failed to generate batch upsert for '{}'", opts.entity))?
                .sql
        }
        None => processor
            .process_upsert_entity_on(&opts.entity, &table, &target)
            .with_context(|| format!("Failed to generate upsert for '{}'", opts.entity))?,
    };
    Ok(sql)
}
