//! hulink-demo - Head-unit link demo application
//!
//! Builds a [`LinkManager`] against a scripted in-process peer that plays
//! the head-unit side, then walks through the typical flows: readiness,
//! icon bootstrap, screen updates, a voice prompt and a command batch.
//!
//! Usage:
//!   hulink-demo [config.toml]
//!
//! If no config file is provided, a built-in demo identity is used.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hulink_core::peer::mock::MockSessionPeer;
use hulink_manager::{
    BatchListener, BatchUpdate, FunctionId, IconAsset, LinkManager, LinkManagerBuilder, Locale,
    ManagerEventListener, Message, Notification, Request, ResultCode, Version,
};
use serde_json::json;
use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Parsed command-line arguments
struct Args {
    /// App identity file (TOML)
    config_path: Option<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut result = Args { config_path: None };

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                // Positional argument = config file
                result.config_path = Some(arg.to_string());
                i += 1;
            }
            _ => {
                tracing::warn!("Unknown argument: {}", args[i]);
                i += 1;
            }
        }
    }

    result
}

fn print_help() {
    eprintln!(
        r#"hulink-demo - Head-unit link demo application

Usage: hulink-demo [config.toml]

Options:
  -h, --help  Print this help message

Config file format:
  [app]
  id = "8675309"
  name = "Hulink Demo"
  short_name = "Demo"          # optional
  locale = "EN-US"             # optional

  [versions]
  minimum_protocol = "1.0.0"   # optional
  minimum_rpc = "1.0.0"        # optional

Examples:
  # Run with the built-in demo identity
  hulink-demo

  # Run with a config file
  hulink-demo app.toml
"#
    );
}

/// App identity fed into the manager builder
struct Identity {
    app_id: String,
    app_name: String,
    short_app_name: Option<String>,
    locale: Locale,
    minimum_protocol_version: Version,
    minimum_rpc_version: Version,
}

impl Identity {
    fn builtin_demo() -> Self {
        Self {
            app_id: "8675309".to_string(),
            app_name: "Hulink Demo".to_string(),
            short_app_name: Some("Demo".to_string()),
            locale: Locale::EnUs,
            minimum_protocol_version: Version::lowest(),
            minimum_rpc_version: Version::lowest(),
        }
    }
}

/// Load the app identity from a TOML file
fn load_config_file(path: &str) -> anyhow::Result<Identity> {
    let content = std::fs::read_to_string(path)?;
    let config: toml::Value = toml::from_str(&content)?;

    let app = config
        .get("app")
        .ok_or_else(|| anyhow::anyhow!("Config missing [app] section"))?;

    let app_id = app
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("[app] missing 'id' field"))?
        .to_string();

    let app_name = app
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("[app] missing 'name' field"))?
        .to_string();

    let short_app_name = app
        .get("short_name")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let locale = match app.get("locale").and_then(|v| v.as_str()) {
        Some(s) => Locale::from_str(s).map_err(|e| anyhow::anyhow!("Invalid locale: {}", e))?,
        None => Locale::default(),
    };

    let versions = config.get("versions");
    let minimum_protocol_version = parse_version(versions, "minimum_protocol")?;
    let minimum_rpc_version = parse_version(versions, "minimum_rpc")?;

    Ok(Identity {
        app_id,
        app_name,
        short_app_name,
        locale,
        minimum_protocol_version,
        minimum_rpc_version,
    })
}

fn parse_version(versions: Option<&toml::Value>, key: &str) -> anyhow::Result<Version> {
    match versions.and_then(|v| v.get(key)).and_then(|v| v.as_str()) {
        Some(s) => Version::from_str(s).map_err(|e| anyhow::anyhow!("Invalid {}: {}", key, e)),
        None => Ok(Version::lowest()),
    }
}

/// Owner listener: logs lifecycle events and wakes main on ready
struct DemoListener {
    ready: Arc<Notify>,
}

impl ManagerEventListener for DemoListener {
    fn on_ready(&self) {
        tracing::info!("manager reported ready");
        self.ready.notify_one();
    }

    fn on_error(&self, info: &str) {
        tracing::warn!(info, "manager reported an error");
    }

    fn on_destroyed(&self) {
        tracing::info!("manager destroyed");
    }
}

/// Batch observer that logs progress and wakes main on completion
struct LoggingBatch {
    done: Arc<Notify>,
}

impl BatchListener for LoggingBatch {
    fn on_update(&self, update: BatchUpdate) {
        match update.outcome.response() {
            Some(response) => tracing::info!(
                index = update.index,
                function = %update.function,
                result = ?response.result,
                "batch item answered"
            ),
            None => tracing::warn!(
                index = update.index,
                function = %update.function,
                "batch item failed"
            ),
        }
    }

    fn on_finished(&self, all_succeeded: bool) {
        tracing::info!(all_succeeded, "batch finished");
        self.done.notify_one();
    }
}

/// Script the mock peer to answer like a cooperative head unit
fn script_head_unit(peer: &MockSessionPeer) {
    peer.respond_with(FunctionId::ListFiles, ResultCode::Success, json!({"filenames": []}));
    peer.respond_to(FunctionId::PutFile, ResultCode::Success);
    peer.respond_to(FunctionId::SetAppIcon, ResultCode::Success);
    peer.respond_to(FunctionId::Show, ResultCode::Success);
    peer.respond_to(FunctionId::Speak, ResultCode::Success);
    peer.respond_to(FunctionId::AddCommand, ResultCode::Success);
    peer.respond_to(FunctionId::SubscribeButton, ResultCode::Success);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hulink_demo=info,hulink_manager=debug,hulink_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting hulink-demo");

    let args = parse_args();
    let identity = if let Some(ref path) = args.config_path {
        tracing::info!("Loading config from: {}", path);
        load_config_file(path)?
    } else {
        tracing::info!("No config file provided, using built-in demo identity");
        Identity::builtin_demo()
    };

    let peer = Arc::new(MockSessionPeer::new());
    script_head_unit(&peer);

    let ready = Arc::new(Notify::new());
    let manager = build_manager(&identity, peer.clone(), ready.clone())?;

    manager.start();
    peer.connect();
    ready.notified().await;
    tracing::info!(
        state = %manager.state(),
        protocol = ?manager.negotiated_protocol_version(),
        rpc = ?manager.negotiated_rpc_version(),
        "link is up"
    );

    run_demo_flows(&manager, &peer).await?;

    manager.dispose();
    tracing::info!("Done");
    Ok(())
}

fn build_manager(
    identity: &Identity,
    peer: Arc<MockSessionPeer>,
    ready: Arc<Notify>,
) -> anyhow::Result<LinkManager> {
    let mut builder = LinkManagerBuilder::new()
        .app_id(&identity.app_id)
        .app_name(&identity.app_name)
        .locale(identity.locale)
        .minimum_protocol_version(identity.minimum_protocol_version)
        .minimum_rpc_version(identity.minimum_rpc_version)
        .icon(IconAsset::png(
            "demo_icon.png",
            Bytes::from_static(b"\x89PNG\r\n\x1a\n fake demo icon"),
        ))
        .listener(Arc::new(DemoListener { ready }))
        .notification_listener(
            FunctionId::OnHmiStatus,
            Arc::new(|notification: &Notification| {
                tracing::info!(payload = %notification.payload, "HMI status changed");
            }),
        )
        .peer(peer);
    if let Some(ref short) = identity.short_app_name {
        builder = builder.short_app_name(short);
    }
    Ok(builder.build()?)
}

async fn run_demo_flows(manager: &LinkManager, peer: &Arc<MockSessionPeer>) -> anyhow::Result<()> {
    // Screen update through the component surface
    if let Some(screen) = manager.screen() {
        screen.set_main_field_1("Hello from hulink");
        screen.set_main_field_2("Demo in progress");
        screen.apply().await?;
        tracing::info!("screen updated");
    }

    // One-shot request with the response awaited inline
    let response = manager
        .send_request(Request::new(
            FunctionId::Speak,
            json!({"ttsChunks": [{"text": "Welcome aboard", "type": "TEXT"}]}),
        ))
        .await?;
    tracing::info!(result = ?response.result, "speak answered");

    // Ordered menu command batch
    let done = Arc::new(Notify::new());
    let commands: Vec<Message> = (1..=3)
        .map(|id| {
            Message::request(
                FunctionId::AddCommand,
                json!({"cmdID": id, "menuParams": {"menuName": format!("Command {id}")}}),
            )
        })
        .collect();
    let batch = manager.send_sequential(commands, Arc::new(LoggingBatch { done: done.clone() }))?;
    tracing::info!(%batch, "command batch submitted");
    done.notified().await;

    // Parallel button subscriptions; arrival order is the head unit's choice
    let done = Arc::new(Notify::new());
    let subscriptions: Vec<Message> = ["OK", "SEEKLEFT", "SEEKRIGHT"]
        .iter()
        .map(|button| {
            Message::request(FunctionId::SubscribeButton, json!({"buttonName": button}))
        })
        .collect();
    let batch =
        manager.send_concurrent(subscriptions, Arc::new(LoggingBatch { done: done.clone() }))?;
    tracing::info!(%batch, "button subscription batch submitted");
    done.notified().await;

    // Unsolicited push from the head unit
    peer.deliver(Message::notification(
        FunctionId::OnHmiStatus,
        json!({"hmiLevel": "FULL", "audioStreamingState": "AUDIBLE"}),
    ));
    tokio::time::sleep(Duration::from_millis(50)).await;
    if let Some(screen) = manager.screen() {
        tracing::info!(level = ?screen.hmi_level(), "HMI level after status push");
    }

    Ok(())
}
