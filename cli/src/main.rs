//! chainweb3 CLI: talk to a node through the chainweb3 provider stack.
//!
//! Usage:
//! ```bash
//! # Send a JSON-RPC call (filter methods are emulated client-side)
//! chainweb3 call --url https://cloudflare-eth.com --method eth_blockNumber
//!
//! # Print new block hashes as they arrive
//! chainweb3 watch-blocks --url https://cloudflare-eth.com --polls 5
//!
//! # Decode a raw signed legacy transaction
//! chainweb3 decode-tx 0xf86c...
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use chainweb3_core::{FilterChanges, JsonRpcRequest, Provider, RequestIdCounter};
use chainweb3_filters::{FilterEngineConfig, FilterMiddleware};
use chainweb3_http::HttpProvider;
use chainweb3_signer::SignedTransaction;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "call" => cmd_call(&args[2..]).await,
        "watch-blocks" => cmd_watch_blocks(&args[2..]).await,
        "decode-tx" => cmd_decode_tx(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("chainweb3 {}", env!("CARGO_PKG_VERSION"));
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

fn print_usage() {
    println!("chainweb3 {}", env!("CARGO_PKG_VERSION"));
    println!("Ethereum JSON-RPC client with client-side filters and local signing\n");
    println!("USAGE:");
    println!("    chainweb3 <COMMAND>\n");
    println!("COMMANDS:");
    println!("    call          Send a JSON-RPC call through the filter middleware");
    println!("    watch-blocks  Install a block filter and print new block hashes");
    println!("    decode-tx     Decode a raw signed transaction");
    println!("    version       Print version");
    println!("    help          Print this help\n");
    println!("CALL FLAGS:");
    println!("    --url <URL>        RPC endpoint URL  [required]");
    println!("    --method <METHOD>  JSON-RPC method   [required]");
    println!("    --params <JSON>    JSON array of params (default: [])\n");
    println!("WATCH-BLOCKS FLAGS:");
    println!("    --url <URL>        RPC endpoint URL  [required]");
    println!("    --polls <N>        Stop after N polls (default: run forever)\n");
    println!("DECODE-TX:");
    println!("    chainweb3 decode-tx <RAW_HEX> [--chain-id <ID>]");
}

/// HTTP provider wrapped in the filter middleware.
fn filtered_stack(url: &str) -> anyhow::Result<(FilterMiddleware, Arc<RequestIdCounter>)> {
    let http = HttpProvider::default_for(url)?;
    let ids = Arc::new(RequestIdCounter::new());
    let stack = FilterMiddleware::new(Arc::new(http), ids.clone(), FilterEngineConfig::default());
    Ok((stack, ids))
}

async fn request(
    provider: &dyn Provider,
    ids: &RequestIdCounter,
    method: &str,
    params: Vec<Value>,
) -> anyhow::Result<Value> {
    let resp = provider.send(JsonRpcRequest::new(ids.next(), method, params)).await?;
    Ok(resp.into_result()?.unwrap_or(Value::Null))
}

async fn cmd_call(args: &[String]) -> anyhow::Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let method = parse_flag(args, "--method").ok_or_else(|| anyhow!("--method is required"))?;
    let params: Vec<Value> = match parse_flag(args, "--params") {
        Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON array")?,
        None => vec![],
    };

    let (stack, ids) = filtered_stack(&url)?;
    let result = request(&stack, &ids, &method, params).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_watch_blocks(args: &[String]) -> anyhow::Result<()> {
    let url = parse_flag(args, "--url").ok_or_else(|| anyhow!("--url is required"))?;
    let polls: Option<u64> = parse_flag(args, "--polls")
        .map(|n| n.parse::<u64>().context("--polls must be a positive integer"))
        .transpose()?;

    let (stack, ids) = filtered_stack(&url)?;
    let id = request(&stack, &ids, "eth_newBlockFilter", vec![]).await?;
    let interval = stack.engine().config().poll_interval;
    println!(
        "Watching {url} (filter {}, every {}s)...",
        id.as_str().unwrap_or_default(),
        interval.as_secs()
    );

    let mut done = 0u64;
    while polls.map_or(true, |max| done < max) {
        tokio::time::sleep(interval).await;
        let changes = request(&stack, &ids, "eth_getFilterChanges", vec![id.clone()]).await?;
        if let FilterChanges::Hashes(hashes) = serde_json::from_value::<FilterChanges>(changes)? {
            for hash in hashes {
                println!("{hash}");
            }
        }
        done += 1;
    }

    request(&stack, &ids, "eth_uninstallFilter", vec![id]).await?;
    Ok(())
}

fn cmd_decode_tx(args: &[String]) -> anyhow::Result<()> {
    let Some(raw) = args.first().filter(|a| !a.starts_with("--")) else {
        bail!("raw transaction hex is required");
    };
    let chain_id: Option<u64> = parse_flag(args, "--chain-id")
        .map(|n| n.parse::<u64>().context("--chain-id must be an integer"))
        .transpose()?;

    let bytes = alloy_primitives::hex::decode(raw).context("raw transaction is not valid hex")?;
    let tx = SignedTransaction::decode_with_chain_id(&bytes, chain_id)
        .context("raw transaction is not a signed legacy transaction")?;

    let out = serde_json::json!({ "hash": tx.hash(), "transaction": tx });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}
