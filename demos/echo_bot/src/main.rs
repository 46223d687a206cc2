//! Echo Bot Example
//!
//! A small opsdroid deployment: a webhook connector feeding the built-in
//! `ping` and `echo` skills plus two skills defined here.
//!
//! Without a configuration file the bot listens on
//! `POST http://127.0.0.1:8080/connector/hooks`:
//!
//! ```bash
//! cargo run --package echo-bot
//! curl -X POST http://127.0.0.1:8080/connector/hooks \
//!     -d '{"user": "alice", "target": "#ops", "text": "echo hello"}'
//! ```
//!
//! Replies are only logged unless the connector has a `reply_url`. A
//! configuration file can add connectors and skills or override the
//! defaults:
//!
//! ```toml
//! [connectors.hooks]
//! module = "webhook"
//! reply_url = "http://127.0.0.1:9000/replies"
//!
//! [connectors.ops]
//! module = "rest"
//! api_url = "https://chat.example.com/api"
//! token = "xoxb-..."
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use opsdroid::prelude::*;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "A simple echo bot built on opsdroid")]
struct Args {
    /// Configuration file (TOML or YAML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `development` or `production`.
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Skills
// ============================================================================

/// Logs every message.
async fn log_message(ctx: SkillContext) -> anyhow::Result<()> {
    let event = ctx.event();
    info!(
        "[{}] {}: {}",
        event.target().unwrap_or("-"),
        event.user().unwrap_or("Unknown"),
        event.text().unwrap_or_default()
    );
    Ok(())
}

/// Sends the command overview.
async fn help(ctx: SkillContext) -> anyhow::Result<()> {
    let help_text = r"╭─────────────────────────────╮
│     Echo Bot - Commands     │
├─────────────────────────────┤
│ echo <text> - Echo text     │
│ ping        - Pong!         │
│ help        - This help     │
╰─────────────────────────────╯";

    ctx.respond(help_text).await?;
    Ok(())
}

/// The built-in connection used when no configuration file overrides it.
fn defaults() -> OpsDroidConfig {
    OpsDroidConfig::default()
        .with_connector("hooks", ModuleConfig::new("webhook"))
        .with_skill("ping", ModuleConfig::new("ping"))
        .with_skill("echo", ModuleConfig::new("echo"))
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = OpsDroid::builder()
        .merge(defaults())
        .connector_module::<RestConnector>()
        .connector_module::<WebhookConnector>()
        .skill(Skill::new("log", match_kind("message"), log_message))
        .skill(Skill::new("help", match_text("help"), help));

    if let Some(config) = args.config {
        builder = builder.config_file(config);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    let droid = builder.build()?;
    droid.run().await?;

    Ok(())
}
