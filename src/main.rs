mod cli;
mod generate;
mod load;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;
use upsquel::engine;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("upsquel=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Generate {
            manifest,
            entity,
            table,
            dialect,
            constraint,
            rows,
        } => {
            let opts = generate::GenerateOptions {
                manifest,
                entity,
                table,
                product: dialect.product_name(),
                constraint,
                rows,
            };

            println!("{}", generate::generate(&opts)?);
        }

        Commands::Load {
            manifest,
            entity,
            table,
            input,
            destination,
            destination_env,
            constraint,
            batch_rows,
            json_style,
        } => {
            let dest_url = Commands::get_url(&destination, &destination_env, "destination")?;

            println!("Connecting to: {}", Commands::redact_url(&dest_url));

            let engine = engine::create_engine(&dest_url)?;

            let opts = load::LoadOptions {
                manifest,
                entity,
                table,
                input,
                constraint,
                batch_rows,
                json_style: json_style.into(),
            };

            load::load(&*engine, &dest_url, opts).await?;
        }
    }

    Ok(())
}
