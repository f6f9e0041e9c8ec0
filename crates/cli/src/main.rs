mod webhook_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    courier_agents::{GeminiBackend, Runner},
    courier_common::ConversationIdentity,
    courier_config::CourierConfig,
    courier_sessions::{InMemorySessionStore, SessionStore},
    secrecy::ExposeSecret,
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "courier", about = "Courier: Telegram webhook bridge to a Gemini agent")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./courier.toml etc.).
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server (default when no subcommand is provided).
    Gateway,
    /// Run one turn against the agent and print the answer.
    Agent {
        #[arg(short, long)]
        message: String,
        /// Conversation identity to run the turn under.
        #[arg(long, default_value = "cli")]
        user: String,
    },
    /// Telegram webhook registration.
    Webhook {
        #[command(subcommand)]
        action: webhook_commands::WebhookAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CourierConfig> {
    let mut config = match cli.config {
        Some(ref path) => {
            let mut config = courier_config::load_config(path)?;
            courier_config::apply_env_overrides(&mut config);
            config
        },
        None => courier_config::discover_and_load(),
    };

    // CLI args override config and env values.
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

async fn run_agent(config: &CourierConfig, message: &str, user: &str) -> anyhow::Result<()> {
    if config.agent.api_key.expose_secret().trim().is_empty() {
        bail!("GOOGLE_API_KEY is not set");
    }

    let backend = Arc::new(GeminiBackend::from_config(&config.agent)?);
    let runner = Runner::new(
        backend,
        Duration::from_secs(config.agent.turn_timeout_secs),
    );
    let sessions = InMemorySessionStore::new(config.agent.app_name.clone());
    let session = sessions.resolve(&ConversationIdentity::parse(user)?).await?;

    let answer = runner.converse(&session, message).await?;
    println!("{answer}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "courier starting");

    let config = load_config(&cli)?;

    match cli.command {
        // Default: start gateway when no subcommand is provided
        None | Some(Commands::Gateway) => courier_gateway::start_gateway(config).await,
        Some(Commands::Agent { message, user }) => run_agent(&config, &message, &user).await,
        Some(Commands::Webhook { action }) => {
            webhook_commands::handle_webhook(action, &config).await
        },
    }
}
