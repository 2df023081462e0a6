//! `odoo-tasks`: operator tasks for an Odoo project.
//!
//! Dumps the compose database, shares dumps encrypted on the dumps bag,
//! fetches them back, and inspects the local databases.

mod commands;
mod config;

use clap::{Parser, Subcommand};

/// Odoo project tasks.
#[derive(Parser, Debug)]
#[command(name = "odoo-tasks", about = "Odoo project database tasks")]
struct Cli {
    /// Path to config file (default: ~/.odoo-tasks/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// Log every external command (same as RUST_LOG=debug).
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a table of DBs with Marabunta version and install date.
    #[command(name = "list-versions")]
    ListVersions,

    /// Download and decrypt the latest dump of a database from the dumps bag.
    #[command(name = "download-dump")]
    DownloadDump {
        /// Dumps bag folder name (e.g. fighting_snail_1024).
        database_name: String,
        /// Directory receiving the dump.
        #[arg(long, default_value = ".")]
        dumpdir: String,
    },

    /// Create a PG dump of a local database.
    #[command(name = "local-dump")]
    LocalDump {
        /// Database to dump (default from config: odoodb).
        #[arg(long)]
        db_name: Option<String>,
        /// Directory receiving the dump.
        #[arg(long, default_value = ".")]
        path: String,
    },

    /// Encrypt a dump and push it to your folder of the dumps bag.
    #[command(name = "share-on-dumps-bag")]
    ShareOnDumpsBag {
        /// Path of the *.pg dump file.
        dump_file_path: String,
    },

    /// Create a dump and share it on the dumps bag.
    #[command(name = "dump-and-share")]
    DumpAndShare {
        /// Database to dump (default from config: odoodb).
        #[arg(long)]
        db_name: Option<String>,
        /// Temporary directory for the dump.
        #[arg(long, default_value = "/tmp")]
        tmp_path: String,
        /// Keep the generated and encrypted dumps locally.
        #[arg(long)]
        keep_local_dump: bool,
    },

    /// Empty the content of your folder on the dumps bag.
    #[command(name = "empty-my-dump-bag")]
    EmptyMyDumpBag,

    /// Print the module comparison between databases.
    #[command(name = "check-modules")]
    CheckModules {
        migrated_db: String,
        full_db: String,
        sample_db: Option<String>,
    },

    /// Inspect or create the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Write a config file with default settings.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);
    tracing::debug!("using config {}", config_path.display());

    if let Commands::Config { action } = &cli.command {
        return match action {
            ConfigAction::Show => commands::config::show(&config_path),
            ConfigAction::Init { force } => commands::config::init(&config_path, *force),
        };
    }

    let client_config = config::ClientConfig::load(&config_path)?;
    let default_db = client_config.database.default_db.clone();

    match cli.command {
        Commands::ListVersions => {
            commands::database::list_versions(&client_config)?;
        }

        Commands::DownloadDump {
            database_name,
            dumpdir,
        } => {
            commands::database::download_dump(&client_config, &database_name, &dumpdir)?;
        }

        Commands::LocalDump { db_name, path } => {
            let db_name = db_name.unwrap_or(default_db);
            commands::database::local_dump(&client_config, &db_name, &path)?;
        }

        Commands::ShareOnDumpsBag { dump_file_path } => {
            commands::database::share_on_dumps_bag(&client_config, &dump_file_path)?;
        }

        Commands::DumpAndShare {
            db_name,
            tmp_path,
            keep_local_dump,
        } => {
            let db_name = db_name.unwrap_or(default_db);
            commands::database::dump_and_share(
                &client_config,
                &db_name,
                &tmp_path,
                keep_local_dump,
            )?;
        }

        Commands::EmptyMyDumpBag => {
            commands::database::empty_my_dump_bag(&client_config)?;
        }

        Commands::CheckModules {
            migrated_db,
            full_db,
            sample_db,
        } => {
            commands::migrate::check_modules(
                &client_config,
                &migrated_db,
                &full_db,
                sample_db.as_deref(),
            )?;
        }

        Commands::Config { .. } => {}

        Commands::Version => {
            println!("odoo-tasks v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
