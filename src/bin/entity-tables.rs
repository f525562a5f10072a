use clap::{Parser, Subcommand};
use entity_tables::*;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::show::ShowArgs;
use commands::status::StatusArgs;
use commands::sync::SyncArgs;
use commands::tables::TablesArgs;
use commands::write::WriteArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.entity-tables/entity-tables.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output as JSON objects
    #[clap(long, global = true)]
    json: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, alter, and reconcile entity tables against the definitions.
    Sync(SyncArgs),

    /// List entity types with their physical tables and columns.
    Tables(TablesArgs),

    /// Show the database file, its entity tables, and the last sync.
    Status(StatusArgs),

    /// Write property values of one entity.
    Write(WriteArgs),

    /// Show the stored row of one entity.
    Show(ShowArgs),

    /// Show configuration.
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.debug {
        tracing_subscriber::fmt()
            // filter spans/events with level TRACE or higher.
            .with_max_level(Level::INFO)
            .init();
    }

    let config = match EntityTablesConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    // You can check for the existence of subcommands, and if found use their
    // matches just as you would the top level cmd
    let result = match cli.command {
        Commands::Sync(args) => commands::sync::run(&config, args, cli.json),
        Commands::Tables(args) => commands::tables::run(&config, args, cli.json),
        Commands::Status(args) => commands::status::run(&config, args, cli.json),
        Commands::Write(args) => commands::write::run(&config, args, cli.json),
        Commands::Show(args) => commands::show::run(&config, args, cli.json),
        Commands::Config(args) => commands::config::run(&config, args, cli.json),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
