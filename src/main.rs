//! `wqmon`: resolve water-quality series, collections and advisories from
//! the command line and print them as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use wqmon_service::config::ServiceConfig;
use wqmon_service::logging::init_logging;
use wqmon_service::{AdvisoryType, Contaminant, SeriesQuery, SeriesResolver};

#[derive(Parser)]
#[command(name = "wqmon", version, about = "Water-quality status for regulated contaminants")]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "WQMON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve one contaminant's series
    Series {
        contaminant: Contaminant,
        #[arg(long)]
        system_id: Option<String>,
        #[arg(long)]
        site: Option<String>,
        #[arg(long)]
        county: Option<String>,
        #[arg(long)]
        zip: Option<String>,
        #[arg(long)]
        kind: Option<String>,
        /// Fail when nothing matches instead of printing null
        #[arg(long)]
        strict: bool,
    },
    /// Resolve every contaminant (or a comma-separated subset)
    Collection {
        #[arg(long, value_delimiter = ',')]
        only: Vec<Contaminant>,
    },
    /// List active advisories, newest first
    Advisories {
        #[arg(long = "type")]
        advisory_type: Option<AdvisoryType>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = ServiceConfig::load(cli.config.as_deref())?;
    init_logging(&config.log_level, config.log_json);

    let resolver = SeriesResolver::from_config(&config)?;

    let output = match cli.command {
        Command::Series { contaminant, system_id, site, county, zip, kind, strict } => {
            let query = SeriesQuery { system_id, zip, county, site, kind };
            if strict {
                serde_json::to_string_pretty(&resolver.resolve_strict(contaminant, &query).await?)?
            } else {
                serde_json::to_string_pretty(&resolver.resolve_one(contaminant, &query).await?)?
            }
        }
        Command::Collection { only } => {
            let subset = (!only.is_empty()).then_some(only.as_slice());
            let collection = resolver.resolve_collection(subset, &SeriesQuery::default()).await;
            serde_json::to_string_pretty(&collection)?
        }
        Command::Advisories { advisory_type } => {
            serde_json::to_string_pretty(&resolver.advisories(advisory_type).await)?
        }
    };

    println!("{}", output);
    Ok(())
}
