//! nickacct-bot: answers `!account <nick>` with the nick's services account.
//!
//! Resolution goes through NickServ `ACC` queries and a presence-driven
//! cache. Settings come from `~/.config/nickacct/bot.toml` (or `--config`),
//! overridden by the flags below.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use nickacct_sdk::client;
use nickacct_sdk::event::Event;

use nickacct_bot::config::{BotConfig, Overrides};

#[derive(Parser)]
#[command(name = "nickacct-bot", about = "Resolve IRC nicks to NickServ accounts")]
struct Args {
    /// Config file (default: ~/.config/nickacct/bot.toml)
    #[arg(long, env = "NICKACCT_CONFIG")]
    config: Option<PathBuf>,

    /// IRC server address (host:port)
    #[arg(long, env = "NICKACCT_SERVER")]
    server: Option<String>,

    /// Bot nick
    #[arg(long, env = "NICKACCT_NICK")]
    nick: Option<String>,

    /// Channel to join (repeatable)
    #[arg(long = "channel")]
    channels: Vec<String>,

    /// Use TLS
    #[arg(long)]
    tls: bool,

    /// Services identity to query, e.g. NickServ@services.example.net
    #[arg(long, env = "NICKACCT_NICKSERV")]
    nickserv: Option<String>,

    /// Command prefix
    #[arg(long)]
    prefix: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nickacct_bot=info,nickacct_sdk=info".into()),
        )
        .init();

    let args = Args::parse();

    let settings = BotConfig::load(args.config.as_deref())?.resolve(Overrides {
        server: args.server,
        nick: args.nick,
        tls: args.tls,
        channels: args.channels,
        nickserv: args.nickserv,
        prefix: args.prefix,
    });

    tracing::info!(
        server = %settings.server,
        nick = %settings.nick,
        nickserv = %settings.nickserv,
        channels = ?settings.channels,
        "Starting nickacct-bot"
    );

    let mut bus = nickacct_bot::build_bus(&settings);

    client::run_with_reconnect(
        settings.connect_config(),
        settings.reconnect_config(),
        move |event| {
            match &event {
                Event::Registered { nick } => {
                    tracing::info!(nick = %nick, "Registered");
                }
                Event::Disconnected { reason } => {
                    tracing::warn!(reason = %reason, "Disconnected");
                }
                _ => {}
            }
            bus.publish(event)
        },
    )
    .await
}
