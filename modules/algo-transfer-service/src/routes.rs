//! Axum route handlers for the transfer API.

use algo_transfer_types::*;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use crate::algod::ChainClient;
use crate::error::Error;
use crate::reconcile::StatusReconciler;
use crate::store::TransactionStore;
use crate::submission::{SubmissionCoordinator, TransferRequest};
use crate::validation::validate_send;

pub struct AppState {
    pub store: Arc<dyn TransactionStore>,
    pub chain: Arc<dyn ChainClient>,
    pub submitter: SubmissionCoordinator,
    pub reconciler: StatusReconciler,
    pub min_amount: f64,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn TransactionStore>,
        confirmation_rounds: u64,
        min_amount: f64,
    ) -> Self {
        Self {
            submitter: SubmissionCoordinator::new(
                chain.clone(),
                store.clone(),
                confirmation_rounds,
                min_amount,
            ),
            reconciler: StatusReconciler::new(chain.clone(), store.clone()),
            store,
            chain,
            min_amount,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: Arc<AppState>, frontend_url: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/algorand/send", post(send_transaction))
        .route("/api/algorand/status/:tx_id", get(transaction_status))
        .route("/api/algorand/transactions", get(list_transactions))
        .route("/rpc/status", get(status))
        .with_state(state)
        .layer(cors(frontend_url))
}

fn cors(frontend_url: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);
    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            log::warn!(
                "Ignoring invalid FRONTEND_URL {:?}, cross-origin requests will be refused",
                frontend_url
            );
            layer
        }
    }
}

fn error_status(e: &Error) -> StatusCode {
    if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Algorand transfer service is running".to_string(),
        timestamp: Utc::now(),
    })
}

// POST /api/algorand/send
pub async fn send_transaction(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SendTransactionRequest>, JsonRejection>,
) -> (StatusCode, Json<RpcResponse<TransactionResult>>) {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(RpcResponse::err(rejection.body_text())),
            );
        }
    };
    if let Err(issues) = validate_send(&req, state.chain.as_ref(), state.min_amount) {
        return (StatusCode::BAD_REQUEST, Json(RpcResponse::invalid(issues)));
    }

    let transfer = TransferRequest {
        sender_secret: req.from_mnemonic,
        recipient: req.to_address,
        amount: req.amount,
        note: req.note,
    };
    match state.submitter.submit(transfer).await {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::ok(result))),
        Err(e) => {
            log::error!("[SUBMIT] {}", e);
            (error_status(&e), Json(RpcResponse::err(e.to_string())))
        }
    }
}

// GET /api/algorand/status/:tx_id
pub async fn transaction_status(
    State(state): State<Arc<AppState>>,
    Path(tx_id): Path<String>,
) -> (StatusCode, Json<RpcResponse<TransactionResult>>) {
    match state.reconciler.reconcile(&tx_id).await {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::ok(result))),
        Err(e) => {
            if !e.is_client_error() {
                log::error!("[RECONCILE] {}: {}", tx_id, e);
            }
            (error_status(&e), Json(RpcResponse::err(e.to_string())))
        }
    }
}

// GET /api/algorand/transactions
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTransactionsQuery>,
) -> (StatusCode, Json<RpcResponse<Vec<TransactionRecord>>>) {
    let limit = query.limit.unwrap_or(MAX_LIST_LIMIT).min(MAX_LIST_LIMIT);
    match state.store.find_all(limit) {
        Ok(records) => {
            let count = records.len();
            (StatusCode::OK, Json(RpcResponse::ok(records).with_count(count)))
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(RpcResponse::err(e.to_string()))),
    }
}

// GET /rpc/status
pub async fn status(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<RpcResponse<ServiceStatus>>) {
    let transactions = state.store.stats().unwrap_or_else(|e| {
        log::warn!("[DB] Failed to count transactions: {}", e);
        TransactionStats::default()
    });
    (
        StatusCode::OK,
        Json(RpcResponse::ok(ServiceStatus {
            running: true,
            uptime_secs: state.start_time.elapsed().as_secs(),
            algod_server: state.chain.endpoint(),
            confirmation_rounds: state.submitter.confirmation_rounds(),
            transactions,
        })),
    )
}
