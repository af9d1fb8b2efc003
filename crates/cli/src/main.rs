use clap::{Parser, Subcommand};
use promptrelay::filter::SessionPolicy;

#[derive(Parser)]
#[command(name = "promptrelay")]
#[command(about = "Relay prompt server events to a local OSC listener", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: PROMPTRELAY_CONFIG_PATH or ~/.promptrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Subscribe to the prompt server and forward events until interrupted.
    Run {
        /// Session identifier (default from config, PROMPTRELAY_SESSION, or "1")
        session: Option<String>,

        /// Config file path (default: PROMPTRELAY_CONFIG_PATH or ~/.promptrelay/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Prompt server base URL (e.g. http://localhost:3451)
        #[arg(long, value_name = "URL")]
        server: Option<String>,

        /// App path the server mounts Socket.IO under (e.g. masterprompt)
        #[arg(long, value_name = "PATH")]
        path: Option<String>,

        /// Session policy: none, tag, strict, or echo
        #[arg(long)]
        policy: Option<SessionPolicy>,

        /// OSC listener UDP port (default from config or 4800)
        #[arg(long, short)]
        port: Option<u16>,
    },
}

struct RunArgs {
    session: Option<String>,
    config: Option<std::path::PathBuf>,
    server: Option<String>,
    path: Option<String>,
    policy: Option<SessionPolicy>,
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("promptrelay {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Run {
            session,
            config,
            server,
            path,
            policy,
            port,
        }) => {
            let args = RunArgs {
                session,
                config,
                server,
                path,
                policy,
                port,
            };
            if let Err(e) = run_relay(args).await {
                log::error!("relay failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(promptrelay::config::default_config_path);
    let dir = promptrelay::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_relay(args: RunArgs) -> anyhow::Result<()> {
    let (mut config, path) = promptrelay::config::load_config(args.config)?;
    log::debug!("loaded config from {}", path.display());
    promptrelay::config::apply_env_overrides(&mut config);
    if let Some(s) = args.session {
        config.session.id = s;
    }
    if let Some(url) = args.server {
        config.server.url = url;
    }
    if let Some(p) = args.path {
        config.server.path = p;
    }
    if let Some(policy) = args.policy {
        config.session.policy = policy;
    }
    if let Some(p) = args.port {
        config.forward.port = p;
    }

    log::info!(
        "starting relay: {} ({}) -> {}:{}{}",
        config.server.url,
        config.server.path,
        config.forward.host,
        config.forward.port,
        config.forward.address
    );
    let relay = promptrelay::Relay::new(config).await?;
    relay.run().await?;
    Ok(())
}
