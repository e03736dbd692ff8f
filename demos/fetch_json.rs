//! Fetch a URL and print its JSON body
//!
//! Demonstrates opening a request, materializing the body and asserting on
//! the status.
//!
//! Run with: cargo run --example fetch_json -- http://localhost:3000/data [timeout_ms]

use anyhow::Context;
use unifetch::client::{Client, ClientConfig, TransportKind};
use unifetch::{from_json_if_json, only_ok, to_string, Body, RawParams, Reason};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args().skip(1);
    let url = args
        .next()
        .context("usage: fetch_json <url> [timeout_ms] [buffered]")?;
    let timeout_ms = args
        .next()
        .map(|t| t.parse::<u64>())
        .transpose()
        .context("timeout_ms must be a number")?
        .unwrap_or(5_000);
    let transport = match args.next().as_deref() {
        Some("buffered") => TransportKind::Buffered,
        _ => TransportKind::Streaming,
    };

    println!("unifetch demo");
    println!("=============\n");
    println!("GET {} ({:?}, timeout {} ms)", url, transport, timeout_ms);

    let client = Client::with_config(ClientConfig {
        transport,
        default_headers: vec![("accept".to_string(), "application/json".to_string())],
        ..Default::default()
    })?;

    let response = client
        .fetch(RawParams::new(url).timeout_ms(timeout_ms))
        .await?;

    if response.reason != Reason::Load {
        println!("\nNo response: {} ({})", response.reason, response.status_text);
        return Ok(());
    }

    let response = from_json_if_json(to_string(response).await?)?;
    println!("\nStatus: {} {}", response.status, response.status_text);
    for (name, value) in response.headers.iter() {
        println!("  {}: {}", name, value.joined());
    }

    let response = only_ok(response)?;
    match &response.body {
        Body::Json(value) => println!("\n{}", serde_json::to_string_pretty(value)?),
        Body::Text(text) => println!("\n{}", text),
        other => println!("\n<{} body>", other.kind()),
    }

    Ok(())
}
