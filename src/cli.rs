use clap::{Parser, Subcommand, ValueEnum};
use upsquel::engine::json::JsonStyle;

#[derive(Parser, Debug)]
#[command(name = "upsquel")]
#[command(
    about = "Batched upsert statements for PostgreSQL and MySQL",
    long_about = None
)]
pub struct Cli {
    /// Log generated SQL and batch details to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    Postgres,
    Mysql,
}

impl DialectArg {
    /// Product name the dialect factory expects.
    pub fn product_name(self) -> &'static str {
        match self {
            DialectArg::Postgres => "PostgreSQL",
            DialectArg::Mysql => "MySQL",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JsonStyleArg {
    Compact,
    Pretty,
}

impl From<JsonStyleArg> for JsonStyle {
    fn from(value: JsonStyleArg) -> Self {
        match value {
            JsonStyleArg::Compact => JsonStyle::Compact,
            JsonStyleArg::Pretty => JsonStyle::Pretty,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the upsert statement for an entity
    Generate {
        /// Metadata manifest (JSON)
        #[arg(short, long)]
        manifest: String,

        /// Entity type to generate for
        #[arg(short, long)]
        entity: String,

        /// Table name (defaults to the manifest's table)
        #[arg(short, long)]
        table: Option<String>,

        /// SQL dialect
        #[arg(long, value_enum, default_value = "postgres")]
        dialect: DialectArg,

        /// Unique constraint to use as conflict target instead of the primary key
        #[arg(long)]
        constraint: Option<String>,

        /// Rows per statement; without it a single-row statement is printed
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Upsert NDJSON rows into a database
    Load {
        /// Metadata manifest (JSON)
        #[arg(short, long)]
        manifest: String,

        /// Entity type the rows belong to
        #[arg(short, long)]
        entity: String,

        /// Table name (defaults to the manifest's table)
        #[arg(short, long)]
        table: Option<String>,

        /// Input file path (.ndjson or .ndjson.gz)
        #[arg(short, long)]
        input: String,

        /// Destination database URL (postgres:// or mysql://)
        #[arg(short, long)]
        destination: Option<String>,

        /// Environment variable containing destination URL
        #[arg(long)]
        destination_env: Option<String>,

        /// Unique constraint to use as conflict target instead of the primary key
        #[arg(long)]
        constraint: Option<String>,

        /// Rows per upsert batch
        #[arg(long, default_value = "500")]
        batch_rows: usize,

        /// How JSON columns are written
        #[arg(long, value_enum, default_value = "compact")]
        json_style: JsonStyleArg,
    },
}

impl Commands {
    /// Get database URL from either direct argument or environment variable
    pub fn get_url(
        direct: &Option<String>,
        env_var: &Option<String>,
        url_type: &str,
    ) -> anyhow::Result<String> {
        if let Some(url) = direct {
            Ok(url.clone())
        } else if let Some(env) = env_var {
            std::env::var(env).map_err(|_| anyhow::anyhow!("Environment variable {} not found", env))
        } else {
            Err(anyhow::anyhow!(
                "Either --{} or --{}-env must be provided",
                url_type,
                url_type
            ))
        }
    }

    /// Redact password from URL for logging
    pub fn redact_url(url: &str) -> String {
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                if url[colon_pos + 1..].starts_with("//") {
                    return url.to_string();
                }
                let mut redacted = url.to_string();
                redacted.replace_range(colon_pos + 1..at_pos, "***");
                return redacted;
            }
        }
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_password() {
        assert_eq!(
            Commands::redact_url("postgres://app:s3cret@db:5432/app"),
            "postgres://app:***@db:5432/app"
        );
        assert_eq!(
            Commands::redact_url("mysql://root@localhost/app"),
            "mysql://root@localhost/app"
        );
    }

    #[test]
    fn url_from_direct_or_env() {
        let direct = Commands::get_url(&Some("mysql://x".into()), &None, "destination").unwrap();
        assert_eq!(direct, "mysql://x");

        let err = Commands::get_url(&None, &None, "destination").unwrap_err();
        assert!(err.to_string().contains("--destination-env"));
    }

    #[test]
    fn parses_generate_command() {
        let cli = Cli::parse_from([
            "upsquel", "generate", "-m", "m.json", "-e", "Widget", "--dialect", "mysql", "--rows", "3",
        ]);
        match cli.command {
            Commands::Generate { dialect, rows, .. } => {
                assert_eq!(dialect, DialectArg::Mysql);
                assert_eq!(rows, Some(3));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
