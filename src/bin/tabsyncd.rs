//! tabsync coordinator - replay and inspection tool
//!
//! Runs the event coordinator against the in-memory browser. Input is a
//! JSON-lines script mixing user actions, raw browser events and page
//! requests; every notification the coordinator sends to a page is printed
//! to stdout as one JSON line.
//!
//! # Usage
//!
//! ```bash
//! # Replay a script
//! tabsyncd replay session.jsonl
//!
//! # Replay from stdin and print the registry afterwards
//! tabsyncd replay --dump - < session.jsonl
//!
//! # Classify a URL with the effective page matcher
//! tabsyncd classify 'https://crm.example/CustomerScreenEntry.aspx?CustomerId=42'
//!
//! # Print the effective configuration
//! tabsyncd config
//!
//! # Enable debug logging
//! RUST_LOG=tabsyncd=debug tabsyncd replay session.jsonl
//! ```
//!
//! # Script format
//!
//! ```text
//! {"do":"open_window"}
//! {"do":"open_tab","tab":10,"window":1,"url":"https://crm.example/CustomerScreenEntry.aspx?CustomerId=42"}
//! {"type":"spe:open","data":{"id":"42:7","url":"https://crm.example/CustomerService/ActionScreen.aspx?CustomerId=42&ActionId=7"}}
//! {"event":"tab_activated","tab":10,"window":1}
//! {"do":"close_tab","tab":10}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use tabsync_core::{TabId, WindowId};
use tabsync_protocol::parse_request_value;
use tabsyncd::browser::{BrowserCall, BrowserEvent, MemoryBrowser};
use tabsyncd::config::Config;
use tabsyncd::context::Context;
use tabsyncd::coordinator::{spawn_coordinator, CoordinatorHandle};

/// Upper bound on settle rounds after one script line.
const MAX_SETTLE_ROUNDS: usize = 64;

/// tabsync coordinator - tab/window registry and focus synchronization
#[derive(Parser, Debug)]
#[command(name = "tabsyncd", version, about)]
struct Args {
    /// Configuration file (defaults to $TABSYNC_CONFIG, then the user config file)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a JSON-lines script against the in-memory browser
    Replay {
        /// Script file, or `-` for stdin
        input: String,

        /// Print the registry after the script finishes
        #[arg(long)]
        dump: bool,
    },
    /// Classify a URL as customer, action or main page
    Classify {
        url: String,
    },
    /// Print the effective configuration
    Config,
}

/// A user action applied to the in-memory browser.
#[derive(Debug, Deserialize)]
#[serde(tag = "do", rename_all = "snake_case")]
enum UserAction {
    OpenWindow,
    OpenTab {
        tab: TabId,
        window: WindowId,
        url: String,
        #[serde(default = "default_true")]
        active: bool,
    },
    Navigate {
        tab: TabId,
        url: String,
    },
    CloseTab {
        tab: TabId,
    },
    CloseWindow {
        window: WindowId,
    },
}

fn default_true() -> bool {
    true
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("tabsyncd=info".parse()?)
                .add_directive("tabsync_core=info".parse()?)
                .add_directive("tabsync_protocol=info".parse()?),
        )
        .init();

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::discover()?,
    };

    match args.command {
        Command::Replay { input, dump } => run_replay(config, &input, dump),
        Command::Classify { url } => {
            let page = config.pages.classify(&url);
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn run_replay(config: Config, input: &str, dump: bool) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), input, "Replay starting");

    let (browser, events) = MemoryBrowser::with_events();
    let browser = Arc::new(browser);
    let context = Arc::new(Context::from_browser(browser.clone(), config));
    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let handle = spawn_coordinator(context, cancel_token.clone());

    let result = if input == "-" {
        let reader = BufReader::new(tokio::io::stdin());
        replay(reader, &browser, &handle, events, &cancel_token).await
    } else {
        let file = tokio::fs::File::open(input)
            .await
            .with_context(|| format!("Failed to open {input}"))?;
        replay(BufReader::new(file), &browser, &handle, events, &cancel_token).await
    };

    if dump && result.is_ok() {
        let registry = handle.dump().await?;
        println!("{}", serde_json::to_string_pretty(&registry)?);
    }

    cancel_token.cancel();
    info!("Replay finished");
    result
}

async fn replay<R>(
    reader: R,
    browser: &MemoryBrowser,
    handle: &CoordinatorHandle,
    mut events: UnboundedReceiver<BrowserEvent>,
    cancel_token: &CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if cancel_token.is_cancelled() {
            bail!("Replay interrupted at line {line_no}");
        }

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Line {line_no}: invalid JSON"))?;
        if let Err(e) = apply(value, browser, handle).await {
            warn!(line = line_no, error = %e, "Script line failed");
        }

        settle(handle, &mut events).await?;
        print_notifications(browser)?;
    }

    debug!(lines = line_no, "Script consumed");
    Ok(())
}

/// Applies one script line.
async fn apply(value: Value, browser: &MemoryBrowser, handle: &CoordinatorHandle) -> Result<()> {
    if value.get("type").is_some() {
        let request = parse_request_value(value)?;
        handle.request(request).await?;
    } else if value.get("event").is_some() {
        let event: BrowserEvent = serde_json::from_value(value)?;
        handle.event(event).await?;
    } else if value.get("do").is_some() {
        let action: UserAction = serde_json::from_value(value)?;
        apply_user_action(action, browser)?;
    } else {
        bail!("Line has none of `type`, `event` or `do`");
    }
    Ok(())
}

fn apply_user_action(action: UserAction, browser: &MemoryBrowser) -> Result<()> {
    match action {
        UserAction::OpenWindow => {
            let window = browser.insert_window();
            info!(window = %window, "Window opened");
        }
        UserAction::OpenTab {
            tab,
            window,
            url,
            active,
        } => {
            browser.insert_tab(tab, window, "about:blank", active)?;
            browser.navigate(tab, &url)?;
        }
        UserAction::Navigate { tab, url } => browser.navigate(tab, &url)?,
        UserAction::CloseTab { tab } => browser.close_tab(tab)?,
        UserAction::CloseWindow { window } => browser.close_window(window)?,
    }
    Ok(())
}

/// Feeds browser events back to the coordinator until it goes quiet.
async fn settle(
    handle: &CoordinatorHandle,
    events: &mut UnboundedReceiver<BrowserEvent>,
) -> Result<()> {
    for _ in 0..MAX_SETTLE_ROUNDS {
        handle.flush().await?;

        let mut forwarded = 0;
        while let Ok(event) = events.try_recv() {
            handle.event(event).await?;
            forwarded += 1;
        }
        if forwarded == 0 {
            return Ok(());
        }
    }
    warn!("Coordinator did not settle");
    Ok(())
}

fn print_notifications(browser: &MemoryBrowser) -> Result<()> {
    for call in browser.take_calls() {
        if let BrowserCall::Send { tab, notification } = call {
            let line = serde_json::json!({ "tab": tab, "message": notification });
            println!("{}", serde_json::to_string(&line)?);
        }
    }
    Ok(())
}
