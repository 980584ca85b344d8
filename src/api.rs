//! REST API server for hashledger
//!
//! Exposes the ledger queries, transaction submission and mining over HTTP.
//! Proof-of-work runs on the blocking thread pool so a long search never
//! stalls the async runtime.

use axum::{
    extract::{Path, Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{error, info};

use crate::blockchain::{Block, ChainStats, LedgerSnapshot};
use crate::canonical::json_float;
use crate::error::LedgerError;
use crate::node::{LedgerNode, NodeState};
use crate::transaction::Transaction;

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    Ledger(LedgerError),
    InvalidInput(String),
    NotFound(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Ledger(e @ LedgerError::EmptyPendingPool) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Ledger(e @ LedgerError::Cancelled) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            ApiError::Ledger(e @ LedgerError::MalformedImport(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Ledger(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub blockchain_valid: bool,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Deserialize)]
pub struct SubmitTransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

#[derive(Serialize)]
pub struct SubmitTransactionResponse {
    pub transaction_id: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct PendingResponse {
    pub pending_transactions: Vec<Transaction>,
}

#[derive(Deserialize)]
pub struct MineRequest {
    pub miner_address: String,
}

#[derive(Serialize)]
pub struct MiningStatusResponse {
    pub pending_transactions: usize,
    pub difficulty: u32,
    #[serde(serialize_with = "json_float::serialize")]
    pub mining_reward: f64,
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    #[serde(serialize_with = "json_float::serialize")]
    pub balance: f64,
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn api_index() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "hashledger API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "blockchain": "/api/blockchain",
            "transactions": "/api/transactions",
            "mining": "/api/mining",
            "addresses": "/api/addresses/:address/balance"
        }
    }))
}

async fn health_check(State(node): State<Arc<LedgerNode>>) -> impl IntoResponse {
    let valid = node.shared().validate();
    let (status, label) = match node.state() {
        NodeState::Ready => (StatusCode::OK, "healthy"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
    };
    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            blockchain_valid: valid,
        }),
    )
}

async fn get_blockchain(State(node): State<Arc<LedgerNode>>) -> Json<LedgerSnapshot> {
    Json(node.snapshot())
}

async fn get_blockchain_stats(State(node): State<Arc<LedgerNode>>) -> Json<ChainStats> {
    Json(node.shared().stats())
}

async fn validate_blockchain(State(node): State<Arc<LedgerNode>>) -> Json<ValidateResponse> {
    Json(ValidateResponse {
        valid: node.shared().validate(),
    })
}

async fn get_block(
    State(node): State<Arc<LedgerNode>>,
    Path(index): Path<u64>,
) -> Result<Json<Block>, ApiError> {
    node.shared()
        .find_block(index)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Block not found".to_string()))
}

async fn submit_transaction(
    State(node): State<Arc<LedgerNode>>,
    Json(req): Json<SubmitTransactionRequest>,
) -> Result<Json<SubmitTransactionResponse>, ApiError> {
    if !req.amount.is_finite() {
        return Err(ApiError::InvalidInput(
            "amount must be a finite number".to_string(),
        ));
    }

    let id = node
        .shared()
        .submit_transaction(&req.sender, &req.recipient, req.amount);

    Ok(Json(SubmitTransactionResponse {
        transaction_id: id,
        message: "Transaction added to pending pool".to_string(),
    }))
}

async fn get_pending_transactions(State(node): State<Arc<LedgerNode>>) -> Json<PendingResponse> {
    Json(PendingResponse {
        pending_transactions: node.shared().pending_transactions(),
    })
}

async fn get_transaction(
    State(node): State<Arc<LedgerNode>>,
    Path(id): Path<String>,
) -> Result<Json<Transaction>, ApiError> {
    node.shared()
        .find_transaction(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Transaction not found".to_string()))
}

async fn mine_block(
    State(node): State<Arc<LedgerNode>>,
    Json(req): Json<MineRequest>,
) -> Result<Json<Block>, ApiError> {
    if req.miner_address.is_empty() {
        return Err(ApiError::InvalidInput(
            "Miner address cannot be empty".to_string(),
        ));
    }

    let block = tokio::task::spawn_blocking(move || node.mine_pending(&req.miner_address))
        .await
        .map_err(|e| ApiError::InternalError(format!("Mining task failed: {}", e)))??;

    Ok(Json(block))
}

async fn get_mining_status(State(node): State<Arc<LedgerNode>>) -> Json<MiningStatusResponse> {
    let stats = node.shared().stats();
    Json(MiningStatusResponse {
        pending_transactions: stats.pending_transactions,
        difficulty: stats.difficulty,
        mining_reward: stats.mining_reward,
    })
}

async fn get_address_balance(
    State(node): State<Arc<LedgerNode>>,
    Path(address): Path<String>,
) -> Json<BalanceResponse> {
    let balance = node.shared().balance_of(&address);
    Json(BalanceResponse { address, balance })
}

// ============================================================================
// Middleware
// ============================================================================

/// Logs method, path, status, duration and the node state of every request.
async fn logging_middleware(
    State(node): State<Arc<LedgerNode>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        node_state = ?node.state(),
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

/// Build the API router with all endpoints.
pub fn build_api_router(node: Arc<LedgerNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![
            http::Method::GET,
            http::Method::POST,
            http::Method::OPTIONS,
        ])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    let api_routes = Router::new()
        // Blockchain endpoints
        .route("/blockchain", get(get_blockchain))
        .route("/blockchain/stats", get(get_blockchain_stats))
        .route("/blockchain/validate", get(validate_blockchain))
        .route("/blockchain/blocks/:index", get(get_block))
        // Transaction endpoints
        .route("/transactions", post(submit_transaction))
        .route("/transactions/pending", get(get_pending_transactions))
        .route("/transactions/:id", get(get_transaction))
        // Mining endpoints
        .route("/mining/mine", post(mine_block))
        .route("/mining/status", get(get_mining_status))
        // Address endpoints
        .route("/addresses/:address/balance", get(get_address_balance));

    Router::new()
        .route("/", get(api_index))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .with_state(node)
        .layer(cors)
}

/// Serve the API on the configured address until Ctrl-C, then shut the node
/// down.
pub async fn run_api_server(node: Arc<LedgerNode>) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("{}:{}", node.config().api.host, node.config().api.port)
        .parse()?;
    let app = build_api_router(node.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(node.clone()))
        .await?;

    if let Err(e) = node.shutdown() {
        error!(error = %e, "Failed to shut down ledger node cleanly");
        return Err(e.into());
    }
    Ok(())
}

/// Resolves on Ctrl-C. Mining is cancelled right away so open mine requests
/// return before the server finishes draining connections.
async fn shutdown_signal(node: Arc<LedgerNode>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
    node.begin_shutdown();
}
