use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use argent::application::errors::BotError;
use argent::application::services::{RunOutcome, Runtime};
use argent::domain::traits::AccountInfo;
use argent::infrastructure::adapters::ConsoleAdapter;
use argent::infrastructure::config::Config;
use argent::infrastructure::security::{OwnerRegistry, StartupSecurity};
use argent::infrastructure::storage::SessionStorage;

#[derive(Parser)]
#[command(name = "argent")]
#[command(about = "Self-hosted userbot with loadable modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the agent (requires a claimed owner)
    Run,
    /// Claim the primary owner slot
    Claim {
        /// Account id of the owner
        id: i64,
    },
    /// Show owner configuration
    Owners,
    /// Forget every owner, including the primary
    ResetOwners {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
    /// Store a session credential file
    ImportSession {
        file: PathBuf,
        #[arg(long)]
        user_id: Option<i64>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Generate default config
    InitConfig,
    /// Show version
    Version,
}

/// What `main` does once the async work is over
enum Exit {
    Code(ExitCode),
    Restart,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Version => {
            println!("argent v{}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        Commands::InitConfig => return init_config(&cli.config),
        _ => {}
    }

    let config = load_config(&cli.config);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = rt.block_on(async move {
        match cli.command {
            Commands::Run => run_agent(config).await,
            Commands::Claim { id } => claim(config, id).await,
            Commands::Owners => show_owners(config).await,
            Commands::ResetOwners { yes } => reset_owners(config, yes).await,
            Commands::ImportSession {
                file,
                user_id,
                username,
            } => import_session(config, &file, user_id, username.as_deref()).await,
            Commands::InitConfig | Commands::Version => Ok(Exit::Code(ExitCode::SUCCESS)),
        }
    });
    drop(rt);

    match result {
        Ok(Exit::Code(code)) => code,
        Ok(Exit::Restart) => restart_process(),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config at {}, using defaults", path.display());
        return Config::load_env();
    }
    match Config::load(path) {
        Ok(config) => config.with_env(),
        Err(e) => {
            tracing::warn!("Failed to load config: {}, using defaults", e);
            Config::load_env()
        }
    }
}

async fn open_owners(config: &Config) -> Result<Arc<OwnerRegistry>, BotError> {
    Ok(Arc::new(
        OwnerRegistry::open(&config.storage.data_dir, config.security.min_principal_id).await?,
    ))
}

async fn run_agent(config: Config) -> Result<Exit, BotError> {
    tracing::info!("Starting {} v{}", config.userbot.name, config.userbot.version);

    let transport = Arc::new(ConsoleAdapter::new(AccountInfo {
        id: config.account.id,
        name: config.userbot.name.clone(),
        username: config.account.username.clone(),
    }));
    let data_dir = config.storage.data_dir.clone();
    let runtime = Runtime::build(config, transport).await?;

    let security = StartupSecurity::new(runtime.owners.clone(), data_dir);
    let issues = security.validate_environment().await;
    if !issues.is_empty() {
        for issue in issues {
            eprintln!("✗ {}", issue);
        }
        return Ok(Exit::Code(ExitCode::FAILURE));
    }
    if !security.require_owner_setup(&runtime.config.userbot.name) {
        return Ok(Exit::Code(ExitCode::FAILURE));
    }

    let loaded = runtime.start_modules().await;
    tracing::info!(
        "{} modules loaded, {} module commands",
        loaded,
        runtime.registry.command_count()
    );

    match runtime.service.run().await? {
        RunOutcome::Shutdown => Ok(Exit::Code(ExitCode::SUCCESS)),
        RunOutcome::Restart => Ok(Exit::Restart),
    }
}

async fn claim(config: Config, id: i64) -> Result<Exit, BotError> {
    let owners = open_owners(&config).await?;
    if owners.set_primary_owner(id).await {
        println!("✓ {} is now the primary owner", id);
        Ok(Exit::Code(ExitCode::SUCCESS))
    } else {
        eprintln!("✗ Claim refused (already claimed, or implausible id)");
        Ok(Exit::Code(ExitCode::FAILURE))
    }
}

async fn show_owners(config: Config) -> Result<Exit, BotError> {
    let owners = open_owners(&config).await?;
    let info = owners.get_config_info().await;
    let rendered = serde_json::to_string_pretty(&info)
        .map_err(|e| BotError::Internal(e.to_string()))?;
    println!("{}", rendered);
    for id in owners.get_all_owners() {
        println!("  {}", id);
    }
    Ok(Exit::Code(ExitCode::SUCCESS))
}

async fn reset_owners(config: Config, confirmed: bool) -> Result<Exit, BotError> {
    if !confirmed {
        eprintln!("This removes every owner. Re-run with --yes to confirm.");
        return Ok(Exit::Code(ExitCode::FAILURE));
    }
    let owners = open_owners(&config).await?;
    owners.emergency_reset().await?;
    println!("✓ Owner configuration reset. Claim again with `argent claim <id>`.");
    Ok(Exit::Code(ExitCode::SUCCESS))
}

async fn import_session(
    config: Config,
    file: &Path,
    user_id: Option<i64>,
    username: Option<&str>,
) -> Result<Exit, BotError> {
    let credentials = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| BotError::NotFound(format!("{}: {}", file.display(), e)))?;

    let sessions = SessionStorage::open(&config.storage.data_dir).await?;
    let id = sessions
        .save_session(credentials.trim(), user_id, username, None)
        .await?;
    println!("✓ Session stored as {}", id);
    Ok(Exit::Code(ExitCode::SUCCESS))
}

fn init_config(path: &Path) -> ExitCode {
    match Config::init_config(path) {
        Ok(()) => {
            println!("✓ Wrote {}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Replace this process with a fresh copy of itself.
fn restart_process() -> ExitCode {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            tracing::error!("Cannot locate own executable: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let mut command = std::process::Command::new(exe);
    command.args(std::env::args_os().skip(1));

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let e = command.exec();
        tracing::error!("Restart failed: {}", e);
        ExitCode::FAILURE
    }

    #[cfg(not(unix))]
    {
        match command.status() {
            Ok(status) if status.success() => ExitCode::SUCCESS,
            Ok(_) => ExitCode::FAILURE,
            Err(e) => {
                tracing::error!("Restart failed: {}", e);
                ExitCode::FAILURE
            }
        }
    }
}
