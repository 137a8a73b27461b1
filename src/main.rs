use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use raft_logstore::migrate;
use raft_logstore::Backend;
use raft_logstore::LogStore;
use raft_logstore::RaftLogStore;
use raft_logstore::RedbEngine;
use raft_logstore::Result;
use raft_logstore::SledEngine;
use raft_logstore::StorageEngine;
use raft_logstore::StoreConfig;
use raft_logstore::StoreOptions;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

/// Maintenance tool for Raft log stores
#[derive(Parser, Debug)]
#[command(name = "raft-logstore")]
#[command(about = "Inspect Raft log stores and migrate legacy databases")]
struct Args {
    /// TOML file layered over the defaults, `CONFIG_PATH` and the environment
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a legacy (sled) database into a new current-format (redb) file
    Migrate {
        /// Legacy database directory
        #[arg(long)]
        source: PathBuf,

        /// Destination file; must not exist
        #[arg(long)]
        destination: PathBuf,
    },

    /// Open a database read-only and print its index range
    Inspect {
        /// Database location; defaults to `storage.db_path`
        #[arg(long)]
        path: Option<PathBuf>,

        /// Container format; defaults to `storage.backend`
        #[arg(long, value_parser = parse_backend)]
        backend: Option<Backend>,
    },
}

fn parse_backend(value: &str) -> std::result::Result<Backend, String> {
    match value {
        "sled" => Ok(Backend::Sled),
        "redb" => Ok(Backend::Redb),
        other => Err(format!("unknown backend '{other}', expected sled or redb")),
    }
}

fn main() -> Result<()> {
    init_observability();

    let args = Args::parse();
    let mut settings = StoreConfig::new()?;
    if let Some(path) = &args.config {
        settings = settings.with_override_config(path)?;
    }
    let settings = settings.validate()?;

    match args.command {
        Commands::Migrate {
            source,
            destination,
        } => {
            let options = settings.migration.to_migration_options(&settings.storage);
            let store = migrate::<SledEngine, RedbEngine>(&source, &destination, &options)?;
            info!("migrated {:?} to {:?}", source, destination);
            print_range(&store)?;
        }
        Commands::Inspect { path, backend } => {
            let mut options = settings.storage.to_store_options();
            options.engine.read_only = true;
            if let Some(path) = path {
                options.path = path;
            }
            match backend.unwrap_or(settings.storage.backend) {
                Backend::Sled => inspect::<SledEngine>(options)?,
                Backend::Redb => inspect::<RedbEngine>(options)?,
            }
        }
    }

    Ok(())
}

fn inspect<E: StorageEngine>(options: StoreOptions) -> Result<()> {
    let store = LogStore::<E>::open_with_options(options)?;
    println!("{} database {}", E::NAME, store.path().display());
    print_range(&store)
}

fn print_range<E: StorageEngine>(store: &LogStore<E>) -> Result<()> {
    println!("first index: {}", store.first_index()?);
    println!("last index: {}", store.last_index()?);
    Ok(())
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
}
