//! Walletlink CLI - wallet connection from the terminal
//!
//! All commands print one JSON object:
//!   walletlink uri                      → {"uri": "wc:...", "deeplink": "wc://wc?uri=..."}
//!   walletlink qr --out session.png     → {"path": "...", "width": 99, "height": 99}
//!   walletlink address                  → {"address": "0x..."}
//!   walletlink sign --message <text>    → {"address": "0x...", "signature": "0x..."}
//!
//! Configuration:
//!   --bridge <url>        env: WALLETLINK_BRIDGE_URL
//!   --timeout <secs>      env: WALLETLINK_SIGN_TIMEOUT_SECS
//!   --open-scheme <s>     Schemes this machine can open (repeatable)
//!   --local-key <hex>     Sign with an in-process key instead of a wallet

use anyhow::{anyhow, bail, Context as _, Result};
use serde_json::{json, Value};
use std::env;
use std::io::IsTerminal;
use std::time::Duration;
use tracing::{debug, info};
use walletlink::logging::init_logging;
use walletlink::{
    generate_session_url, install_signal_handlers, qr_connection_method, Account, ConnectionMethod,
    LocalWalletConnection, SchemeAllowList, Shutdown, WalletConfig, WalletContext, WalletSignature,
};

const DEFAULT_QR_PATH: &str = "walletlink-session.png";

fn main() {
    init_logging();
    let _ = rustls::crypto::ring::default_provider().install_default();

    let args: Vec<String> = env::args().collect();
    let opts = ParsedArgs::parse(&args[1..]);

    if opts.help {
        print_usage();
        return;
    }

    if opts.version {
        println!("walletlink {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let result = match opts.command.as_deref() {
        Some("uri") => cmd_uri(&opts),
        Some("qr") => cmd_qr(&opts),
        Some("address") => run_async(cmd_address(&opts)),
        Some("sign") => run_async(cmd_sign(&opts)),
        Some(cmd) => Err(anyhow!("Unknown command: {}", cmd)),
        None => {
            print_usage();
            return;
        }
    };

    let pretty = opts.pretty || std::io::stdout().is_terminal();
    match result {
        Ok(output) => println!("{}", render(&output, pretty)),
        Err(e) => {
            eprintln!("{}", render(&json!({"error": format!("{:#}", e)}), pretty));
            std::process::exit(1);
        }
    }
}

fn render(value: &Value, pretty: bool) -> String {
    let rendered =
        if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    rendered.unwrap_or_else(|_| value.to_string())
}

fn run_async(fut: impl std::future::Future<Output = Result<Value>>) -> Result<Value> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(fut)
}

#[derive(Default)]
struct ParsedArgs {
    command: Option<String>,
    bridge: Option<String>,
    timeout: Option<u64>,
    open_schemes: Vec<String>,
    message: Option<String>,
    out: Option<String>,
    local_key: Option<String>,
    pretty: bool,
    help: bool,
    version: bool,
}

impl ParsedArgs {
    fn parse(args: &[String]) -> Self {
        let mut opts = ParsedArgs::default();
        let mut positional = Vec::new();
        let mut i = 0;

        while i < args.len() {
            let arg = &args[i];
            let value = args.get(i + 1).cloned();
            let mut takes_value = true;
            match arg.as_str() {
                "--bridge" | "-b" => opts.bridge = value,
                "--timeout" | "-t" => opts.timeout = value.and_then(|v| v.parse().ok()),
                "--open-scheme" => opts.open_schemes.extend(value),
                "--message" | "-m" => opts.message = value,
                "--out" | "-o" => opts.out = value,
                "--local-key" => opts.local_key = value,
                _ => {
                    takes_value = false;
                    match arg.as_str() {
                        "--help" | "-h" => opts.help = true,
                        "--version" | "-V" => opts.version = true,
                        "--pretty" => opts.pretty = true,
                        _ if !arg.starts_with('-') => positional.push(arg.clone()),
                        _ => {} // Ignore unknown flags
                    }
                }
            }
            i += if takes_value { 2 } else { 1 };
        }

        if !positional.is_empty() {
            opts.command = Some(positional.remove(0));
        }
        // `sign hello world` reads as the message when --message is absent
        if opts.message.is_none() && !positional.is_empty() {
            opts.message = Some(positional.join(" "));
        }
        if opts.local_key.is_none() {
            opts.local_key = env::var("WALLETLINK_LOCAL_KEY").ok().filter(|s| !s.is_empty());
        }

        opts
    }

    /// Environment config with CLI flags on top.
    fn config(&self) -> Result<WalletConfig> {
        let mut config = WalletConfig::from_env("walletlink")?;
        if let Some(bridge) = &self.bridge {
            config = config.with_bridge(bridge);
        }
        match self.timeout {
            Some(0) => Ok(config.without_sign_timeout()),
            Some(secs) => Ok(config.with_sign_timeout(Duration::from_secs(secs))),
            None => Ok(config),
        }
    }
}

fn print_usage() {
    println!(
        r#"walletlink - wallet connection and message signing

USAGE:
    walletlink <command> [options]

COMMANDS:
    uri                     Print a fresh session URI and deep link
    qr --out <file>         Write a fresh session deep link as a PNG QR code
    address                 Connect a wallet and print its address
    sign --message <text>   Connect a wallet and personal-sign <text>

OPTIONS:
    --bridge, -b <url>      Bridge server (env: WALLETLINK_BRIDGE_URL)
    --timeout, -t <secs>    Sign timeout, 0 waits forever (env: WALLETLINK_SIGN_TIMEOUT_SECS)
    --open-scheme <scheme>  URL scheme this machine can open (can repeat)
    --out, -o <file>        QR output path (default for address/sign: walletlink-session.png)
    --local-key <hex>       In-process secp256k1 key (env: WALLETLINK_LOCAL_KEY)
    --pretty                Pretty-print JSON
    --version, -V           Print version

EXAMPLES:
    walletlink uri --bridge https://bridge.example
    walletlink qr --out session.png
    walletlink sign --message "XMTP : Create Identity" --timeout 120
    walletlink address --local-key 4c0883a6...2318 | jq -r .address
"#
    );
}

fn cmd_uri(opts: &ParsedArgs) -> Result<Value> {
    let config = opts.config()?;
    let url = generate_session_url(&config.bridge_url)?;
    Ok(json!({
        "uri": url.wc_uri(),
        "deeplink": url.deeplink(),
        "topic": url.topic(),
        "bridge": url.bridge(),
    }))
}

fn cmd_qr(opts: &ParsedArgs) -> Result<Value> {
    let out = opts.out.as_ref().ok_or_else(|| anyhow!("--out <file> is required"))?;
    let config = opts.config()?;
    let url = generate_session_url(&config.bridge_url)?;
    let ConnectionMethod::QrCode(image) = qr_connection_method(&url.deeplink())? else {
        bail!("QR rendering produced no image");
    };
    std::fs::write(out, &image.png).with_context(|| format!("Failed to write {}", out))?;
    Ok(json!({
        "path": out,
        "width": image.width,
        "height": image.height,
        "deeplink": url.deeplink(),
    }))
}

async fn cmd_address(opts: &ParsedArgs) -> Result<Value> {
    let shutdown = install_signal_handlers();
    let context = build_context(opts, shutdown.clone())?;
    let account = build_account(&context, opts)?;

    let outcome = connect(&account, opts, &shutdown).await;
    let address = account.address();
    context.shutdown().await;
    outcome?;

    Ok(json!({"address": address}))
}

async fn cmd_sign(opts: &ParsedArgs) -> Result<Value> {
    let message = opts
        .message
        .clone()
        .ok_or_else(|| anyhow!("Message required: walletlink sign --message <text>"))?;
    let shutdown = install_signal_handlers();
    let context = build_context(opts, shutdown.clone())?;
    let account = build_account(&context, opts)?;

    let outcome = connect_and_sign(&account, &message, opts, &shutdown).await;
    let address = account.address();
    context.shutdown().await;
    let signature = outcome?;

    Ok(json!({
        "address": address,
        "message": message,
        "signature": signature.to_hex(),
        "recovery": signature.recovery(),
    }))
}

async fn connect_and_sign(
    account: &Account,
    message: &str,
    opts: &ParsedArgs,
    shutdown: &Shutdown,
) -> Result<WalletSignature> {
    connect(account, opts, shutdown).await?;
    info!("Requesting signature from {}", account.address());
    tokio::select! {
        signed = account.sign_text(message) => signed.context("Signing failed"),
        _ = shutdown.wait() => Err(anyhow!("Interrupted")),
    }
}

fn build_context(opts: &ParsedArgs, shutdown: Shutdown) -> Result<WalletContext> {
    let config = opts.config()?;
    debug!(bridge = %config.bridge_url, "wallet config");
    Ok(WalletContext::new(config)
        .with_platform(SchemeAllowList::new(opts.open_schemes.iter().cloned()))
        .with_shutdown(shutdown))
}

fn build_account(context: &WalletContext, opts: &ParsedArgs) -> Result<Account> {
    match &opts.local_key {
        Some(secret) => Ok(context.local_account(LocalWalletConnection::from_hex(secret)?)),
        None => Ok(context.relay_account()),
    }
}

/// Present the connection method on stderr, then wait for approval.
async fn connect(account: &Account, opts: &ParsedArgs, shutdown: &Shutdown) -> Result<()> {
    match account.preferred_connection_method()? {
        ConnectionMethod::Redirect(url) => {
            eprintln!("Open in your wallet: {}", url);
        }
        ConnectionMethod::QrCode(image) => {
            let out = opts.out.as_deref().unwrap_or(DEFAULT_QR_PATH);
            std::fs::write(out, &image.png).with_context(|| format!("Failed to write {}", out))?;
            eprintln!("Scan the QR code written to {}", out);
        }
        ConnectionMethod::Manual(text) => {
            eprintln!("Connect with: {}", text);
        }
    }

    tokio::select! {
        connected = account.connect() => connected.context("Wallet connection failed"),
        _ = shutdown.wait() => Err(anyhow!("Interrupted")),
    }
}
