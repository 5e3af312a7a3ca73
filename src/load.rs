use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use futures::stream;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value as JsonValue;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use upsquel::engine::column::{ColumnInfo, ConflictTarget};
use upsquel::engine::dialect::DialectFactory;
use upsquel::engine::executor::{LoadTarget, UpsertExecutor};
use upsquel::engine::json::JsonStyle;
use upsquel::engine::processor::{MetadataProvider, MetadataRegistry, UpsertProcessor};
use upsquel::engine::value::SqlValue;
use upsquel::engine::{DbEngine, RowStream};

pub struct LoadOptions {
    pub manifest: String,
    pub entity: String,
    pub table: Option<String>,
    pub input: String,
    pub constraint: Option<String>,
    pub batch_rows: usize,
    pub json_style: JsonStyle,
}

pub async fn load(engine: &dyn DbEngine, destination_url: &str, opts: LoadOptions) -> Result<()> {
    println!("Starting upsert load...");

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

    // Connect to destination
    let mut session = engine
        .connect(destination_url)
        .await
        .context("Failed to connect to destination database")?;

    let dialect = DialectFactory.get_dialect(&mut *session).await?;
    let processor = UpsertProcessor::new(registry, dialect);
    println!("Using {} dialect", processor.dialect().name());

    // Validate the partition before reading any input
    let partition = processor.partition(&opts.entity, &target)?;
    println!(
        "Upserting into '{}' ({} key, {} value column(s))",
        table,
        partition.key_columns().len(),
        partition.value_columns().len()
    );

    let rows = open_rows(&opts.input, partition.all_columns().to_vec())?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("Invalid progress template")?,
    );
    progress.set_message("Processing rows...");

    let executor = UpsertExecutor::new(opts.json_style.serializer());
    let total_rows = executor
        .load_stream(
            &mut *session,
            &processor,
            LoadTarget {
                entity_type: &opts.entity,
                table_name: &table,
                conflict_target: &target,
                batch_rows: opts.batch_rows,
            },
            rows,
            |n| progress.set_message(format!("Upserted {} rows...", n)),
        )
        .await
        .with_context(|| format!("Failed to load '{}' into table '{}'", opts.input, table))?;

    progress.finish_and_clear();

    println!("\n═══════════════════════════════════════");
    println!("Upsert Summary");
    println!("═══════════════════════════════════════");
    println!("Source:        {}", opts.input);
    println!("Table:         {}", table);
    println!("Batch size:    {}", opts.batch_rows);
    println!("Upserted:      {} rows ✓", total_rows);
    println!("═══════════════════════════════════════");

    Ok(())
}

/// Stream NDJSON records as rows in `columns` order; `.gz` input is
/// decompressed on the fly.
pub fn open_rows(input_path: &str, columns: Vec<ColumnInfo>) -> Result<RowStream> {
    let file =
        File::open(input_path).with_context(|| format!("Failed to open input file {}", input_path))?;
    let reader: Box<dyn Read + Send> = if input_path.ends_with(".gz") {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let lines = BufReader::new(reader)
        .lines()
        .enumerate()
        .filter(|(_, line)| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(move |(idx, line)| {
            let line = line.with_context(|| format!("Failed to read line {}", idx + 1))?;
            record_to_row(&line, &columns).with_context(|| format!("Invalid record at line {}", idx + 1))
        });

    Ok(Box::pin(stream::iter(lines)))
}

/// Pick each column's value by column name, then by property name; absent
/// fields bind as NULL. A value that does not fit its column fails the row.
fn record_to_row(line: &str, columns: &[ColumnInfo]) -> Result<Vec<SqlValue>> {
    let record: JsonValue = serde_json::from_str(line).context("Malformed JSON")?;
    let JsonValue::Object(fields) = record else {
        bail!("Expected a JSON object per line");
    };

    let row = columns
        .iter()
        .map(|column| {
            match fields
                .get(column.name())
                .or_else(|| fields.get(column.property_name()))
            {
                Some(value) => SqlValue::from_json(column, value),
                None => Ok(SqlValue::Null),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(row)
}
