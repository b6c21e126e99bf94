use clap::Parser;
use tracing_subscriber::EnvFilter;

use quiz_client::config::{ChannelConfig, DEFAULT_NAMESPACE, DEFAULT_SERVER_URL, MAX_RECONNECT_ATTEMPTS};
use quiz_client::identity::{FixedIdentity, RandomIdentity};

mod client;
mod command;

#[derive(Parser)]
#[command(name = "quiz")]
#[command(about = "Play a live quiz game from the terminal", long_about = None)]
struct Cli {
    /// Game server URL
    #[arg(short, long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Channel path the game events live under
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Play under this user id (random anonymous id if omitted)
    #[arg(short, long)]
    user_id: Option<String>,

    /// Automatic reconnection attempts before giving up
    #[arg(long, default_value_t = MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ChannelConfig::new(cli.server)
        .with_namespace(cli.namespace)
        .with_max_reconnect_attempts(cli.max_reconnect_attempts);
    println!("Connecting to {}...", config.channel_url());

    let result = match cli.user_id {
        Some(id) => client::start_client(config, &FixedIdentity::new(id)).await,
        None => client::start_client(config, &RandomIdentity).await,
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }
}
