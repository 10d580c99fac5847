use anyhow::Result;
use clap::Parser;
use janus_router::{QueryParams, RouteRequest, Router, RouterConfig};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Resolve one request against a rules file and print the outcome. Meant
/// for checking rule sets offline before they are shipped.
#[derive(Parser)]
#[command(name = "janus-router", about = "Resolve requests against a routing rule set")]
struct Cli {
    /// Path to the rules file (.toml or .json)
    #[arg(short, long, default_value = "rules.toml")]
    config: PathBuf,

    /// Request path to resolve
    #[arg(short, long)]
    path: String,

    /// Request method
    #[arg(short, long, default_value = "GET")]
    method: String,

    /// Request host, optionally with a port
    #[arg(long, default_value = "")]
    host: String,

    /// Request header as key=value (repeatable)
    #[arg(long = "header", value_name = "KEY=VALUE")]
    headers: Vec<String>,

    /// Query parameter as key=value (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    queries: Vec<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = RouterConfig::load(&cli.config)?;
    let router = Router::new(&config.rules)?;

    let mut headers = http::HeaderMap::new();
    for pair in &cli.headers {
        let (key, value) = split_pair(pair)?;
        headers.append(
            http::HeaderName::from_bytes(key.as_bytes())?,
            http::HeaderValue::from_str(value)?,
        );
    }

    let mut queries = QueryParams::new();
    for pair in &cli.queries {
        let (key, value) = split_pair(pair)?;
        queries.insert(key, value);
    }

    let req = RouteRequest {
        method: &cli.method,
        host: &cli.host,
        path: &cli.path,
        headers: &headers,
        queries: &queries,
    };

    match router.find(&req) {
        Some(m) => {
            println!("backend: {}", m.backend());
            println!("pattern: {}", m.pattern());
            for (key, value) in m.params() {
                println!("param:   {}={}", key, value);
            }
            Ok(())
        }
        None => {
            println!("no match");
            std::process::exit(1);
        }
    }
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    pair.split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected KEY=VALUE, got '{pair}'"))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false),
        )
        .init();
}
