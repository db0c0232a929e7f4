//! chainnode CLI: rank Steem/Hive nodes and send calls from the terminal.
//!
//! Usage:
//! ```bash
//! # List the seed nodes for Hive, probing and ranking them first
//! chainnode nodes --hive --probe
//!
//! # Probe a single endpoint
//! chainnode probe --url https://api.hive.blog
//!
//! # Send a raw call through a connection handle
//! chainnode call --url https://api.hive.blog --method condenser_api.get_config
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chainnode_core::{
    ChainVariant, ConnectionHandle, ConnectionOptions, Endpoint, HealthProbe, NodeFilter,
    NodeList,
};
use chainnode_http::HttpConnector;

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "nodes" => cmd_nodes(&args[2..]).await,
        "probe" => cmd_probe(&args[2..]).await,
        "call" => cmd_call(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("chainnode {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

fn print_usage() {
    println!("chainnode {}", env!("CARGO_PKG_VERSION"));
    println!("Rank Steem/Hive RPC nodes and send calls\n");
    println!("USAGE:");
    println!("    chainnode <COMMAND>\n");
    println!("COMMANDS:");
    println!("    nodes      List seed nodes for a chain");
    println!("    probe      Probe one endpoint (reachability, latency)");
    println!("    call       Send a raw call through a connection handle");
    println!("    version    Print version");
    println!("    help       Print this help\n");
    println!("NODES FLAGS:");
    println!("    --hive | --steem   Chain variant  [default: hive]");
    println!("    --https            Only https:// endpoints");
    println!("    --wss              Only wss:// endpoints");
    println!("    --probe            Probe and rank before listing\n");
    println!("PROBE FLAGS:");
    println!("    --url <URL>        Endpoint URL  [required]\n");
    println!("CALL FLAGS:");
    println!("    --url <URL>        Endpoint URL, repeatable (first is primary)  [required]");
    println!("    --method <NAME>    Method name  [required]");
    println!("    --params <JSON>    JSON array of params  [default: []]");
    println!("    --retries <N>      Retries after the first attempt  [default: 10]");
}

async fn cmd_nodes(args: &[String]) -> Result<()> {
    let variant = if has_flag(args, "--steem") {
        ChainVariant::Steem
    } else {
        ChainVariant::Hive
    };

    let mut filter = NodeFilter::new(variant);
    if has_flag(args, "--https") {
        filter = filter.https_only();
    }
    if has_flag(args, "--wss") {
        filter = filter.wss_only();
    }

    let mut list = NodeList::new();
    if has_flag(args, "--probe") {
        println!("Probing {} candidates...", list.len());
        list.update_nodes(&HttpConnector::default().probe()).await;
    }

    for url in list.get_nodes_with(&filter) {
        match list.health(&url) {
            Some(h) if h.reachable => println!("  {url:<40} {}ms", h.latency.as_millis()),
            Some(_) => println!("  {url:<40} unreachable"),
            None => println!("  {url}"),
        }
    }
    Ok(())
}

async fn cmd_probe(args: &[String]) -> Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let probe = HttpConnector::default().probe();

    println!("Probing {url}...");
    let result = probe.probe(&Endpoint::new(url, ChainVariant::Hive)).await;

    if result.reachable {
        println!("  Status:  OK");
    } else {
        println!("  Status:  UNREACHABLE");
    }
    println!("  Latency: {}ms", result.latency.as_millis());
    Ok(())
}

async fn cmd_call(args: &[String]) -> Result<()> {
    let urls = parse_all(args, "--url");
    if urls.is_empty() {
        return Err(anyhow!("--url is required"));
    }
    let method = parse_flag(args, "--method").ok_or_else(|| anyhow!("--method is required"))?;

    let params = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str::<Vec<serde_json::Value>>(&raw)
            .context("--params must be a JSON array")?,
        None => Vec::new(),
    };

    let mut options = ConnectionOptions::default();
    if let Some(raw) = parse_flag(args, "--retries") {
        let n = raw
            .parse::<u32>()
            .with_context(|| format!("--retries expects a number, got {raw:?}"))?;
        options = options.num_retries(n);
    }

    let handle = ConnectionHandle::new(urls, options, Arc::new(HttpConnector::default())).await?;
    tracing::info!(url = handle.url(), attempts = handle.attempts(), "bound");

    let result = handle.call_raw(&method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_all(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn repeated_url_flags_keep_order() {
        let a = args(&["--url", "https://a", "--method", "m", "--url", "https://b"]);
        assert_eq!(parse_all(&a, "--url"), vec!["https://a", "https://b"]);
        assert_eq!(parse_flag(&a, "--method").as_deref(), Some("m"));
    }

    #[test]
    fn missing_flag_value_is_none() {
        let a = args(&["--url"]);
        assert_eq!(parse_flag(&a, "--url"), None);
        assert!(has_flag(&a, "--url"));
    }
}
