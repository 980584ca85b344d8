#![forbid(unsafe_code)]
//! HTTP API server for hashledger

use hashledger::api::run_api_server;
use hashledger::cli::init_tracing;
use hashledger::config::load_config;
use hashledger::node::LedgerNode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info");

    let config = load_config()?;
    let node = Arc::new(LedgerNode::init(config)?);

    run_api_server(node).await
}
