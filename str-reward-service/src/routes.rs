use crate::metrics::ClaimMetrics;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE,
};
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::convert::Infallible;
use std::sync::Arc;
use str_supply::{ClaimOutcome, LedgerBackend, LedgerError, LedgerStore, RejectReason};
use tracing::{error, warn};

/// Largest claim body accepted.
const MAX_BODY_BYTES: usize = 100 * 1024;

pub type SharedStore = LedgerStore<Box<dyn LedgerBackend>>;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SharedStore>,
    pub metrics: Arc<ClaimMetrics>,
}

impl AppState {
    pub fn new(store: SharedStore, metrics: ClaimMetrics) -> Self {
        Self {
            store: Arc::new(store),
            metrics: Arc::new(metrics),
        }
    }
}

/// JSON request body for POST /claim.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRequest {
    #[serde(default)]
    player_id: Option<String>,
    /// Number or numeric string; absent or null counts as 0.
    #[serde(default)]
    points: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimCredited {
    success: bool,
    earned: u64,
    new_balance: u64,
    required_points: u64,
    multiplier: f64,
    total_distributed: u64,
    remaining: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRejected {
    success: bool,
    message: String,
    reason: &'static str,
    required_points: u64,
    multiplier: f64,
    total_distributed: u64,
    remaining: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceResponse {
    player_id: String,
    balance: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SupplyResponse {
    total_supply: u64,
    total_distributed: u64,
    remaining: u64,
    difficulty_multiplier: f64,
    points_per_unit_now: u64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

type HttpResponse = Response<Full<Bytes>>;

fn json<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut resp = Response::new(Full::new(Bytes::from(bytes)));
            *resp.status_mut() = status;
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            resp
        }
        Err(e) => {
            error!(error = %e, "failed to encode response");
            let mut resp = Response::new(Full::new(Bytes::from_static(b"{\"error\":\"internal error\"}")));
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        }
    }
}

fn json_error(status: StatusCode, msg: &str) -> HttpResponse {
    json(status, &ErrorResponse { error: msg })
}

fn ledger_error(e: &LedgerError) -> HttpResponse {
    match e {
        LedgerError::InvalidInput(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        LedgerError::Persistence(_) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    }
}

fn with_cors(mut resp: HttpResponse) -> HttpResponse {
    let headers = resp.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,HEAD,PUT,PATCH,POST,DELETE"),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    resp
}

fn no_content() -> HttpResponse {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NO_CONTENT;
    resp
}

/// Runs a ledger operation off the async workers; ledger I/O is blocking.
async fn on_ledger<T, F>(state: &AppState, f: F) -> Result<T, LedgerError>
where
    T: Send + 'static,
    F: FnOnce(&SharedStore) -> Result<T, LedgerError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || f(&store)).await {
        Ok(res) => res,
        Err(e) => {
            error!(error = %e, "ledger task aborted");
            Err(LedgerError::Persistence(str_supply::StoreError::Io(
                std::io::Error::new(std::io::ErrorKind::Other, "ledger task aborted"),
            )))
        }
    }
}

/// Missing or null points count as 0 and numeric strings are parsed;
/// anything else is rejected.
fn parse_points(points: Option<Value>) -> Result<f64, LedgerError> {
    match points {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| LedgerError::invalid("points is not a valid number")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| LedgerError::invalid("points is not a valid number")),
        Some(_) => Err(LedgerError::invalid("points is not a valid number")),
    }
}

async fn claim<B>(state: AppState, body: B) -> HttpResponse
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let body_bytes = match Limited::new(body, MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "unreadable claim body");
            state.metrics.observe_error("invalid");
            return json_error(StatusCode::BAD_REQUEST, "request body too large or unreadable");
        }
    };

    let parsed: ClaimRequest = match serde_json::from_slice(&body_bytes) {
        Ok(r) => r,
        Err(e) => {
            state.metrics.observe_error("invalid");
            return json_error(StatusCode::BAD_REQUEST, &format!("invalid JSON: {}", e));
        }
    };

    let player_id = parsed.player_id.unwrap_or_default();
    let points = match parse_points(parsed.points) {
        Ok(p) => p,
        Err(e) => {
            state.metrics.observe_error("invalid");
            return ledger_error(&e);
        }
    };

    match on_ledger(&state, move |store| store.claim(&player_id, points)).await {
        Ok(outcome) => {
            state.metrics.observe_outcome(&outcome);
            match outcome {
                ClaimOutcome::Credited(r) => json(
                    StatusCode::OK,
                    &ClaimCredited {
                        success: true,
                        earned: r.earned,
                        new_balance: r.new_balance,
                        required_points: r.required_points,
                        multiplier: r.multiplier,
                        total_distributed: r.total_distributed,
                        remaining: r.remaining,
                    },
                ),
                ClaimOutcome::Rejected(r) => json(
                    StatusCode::OK,
                    &ClaimRejected {
                        success: false,
                        message: r.message(),
                        reason: match r.reason {
                            RejectReason::InsufficientPoints => "insufficient_points",
                            RejectReason::SupplyExhausted => "supply_exhausted",
                        },
                        required_points: r.required_points,
                        multiplier: r.multiplier,
                        total_distributed: r.total_distributed,
                        remaining: r.remaining,
                    },
                ),
            }
        }
        Err(e) => {
            state.metrics.observe_error(match e {
                LedgerError::InvalidInput(_) => "invalid",
                LedgerError::Persistence(_) => "failed",
            });
            ledger_error(&e)
        }
    }
}

async fn balance(state: AppState, player_id: String) -> HttpResponse {
    let id = player_id.clone();
    match on_ledger(&state, move |store| store.get_balance(&id)).await {
        Ok(balance) => json(StatusCode::OK, &BalanceResponse { player_id, balance }),
        Err(e) => ledger_error(&e),
    }
}

async fn supply(state: AppState) -> HttpResponse {
    match on_ledger(&state, |store| store.supply_status()).await {
        Ok(status) => {
            state.metrics.observe_supply(&status);
            json(
                StatusCode::OK,
                &SupplyResponse {
                    total_supply: status.total_supply,
                    total_distributed: status.total_distributed,
                    remaining: status.remaining,
                    difficulty_multiplier: status.multiplier,
                    points_per_unit_now: status.points_per_unit_now,
                },
            )
        }
        Err(e) => ledger_error(&e),
    }
}

fn metrics(state: &AppState) -> HttpResponse {
    match state.metrics.render() {
        Ok(text) => {
            let mut resp = Response::new(Full::new(Bytes::from(text)));
            resp.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            resp
        }
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// Every `%` must introduce exactly two hex digits; `urlencoding` would
/// otherwise pass malformed escapes through literally.
fn escapes_well_formed(raw: &str) -> bool {
    raw.split('%')
        .skip(1)
        .all(|chunk| chunk.len() >= 2 && chunk.as_bytes()[..2].iter().all(u8::is_ascii_hexdigit))
}

fn balance_player(path: &str) -> Option<String> {
    let raw = path.strip_prefix("/balance/")?;
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    if !escapes_well_formed(raw) {
        return None;
    }
    urlencoding::decode(raw).ok().map(Cow::into_owned)
}

const KNOWN_PATHS: [&str; 5] = ["/claim", "/supply", "/withdraw", "/metrics", "/healthz"];

pub async fn handle_request<B>(state: AppState, req: Request<B>) -> Result<HttpResponse, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let resp = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => no_content(),
        (&Method::POST, "/claim") => claim(state, req.into_body()).await,
        (&Method::GET, "/supply") => supply(state).await,
        (&Method::POST, "/withdraw") => json_error(
            StatusCode::NOT_IMPLEMENTED,
            "withdraw is not implemented on-chain yet",
        ),
        (&Method::GET, "/metrics") => metrics(&state),
        (&Method::GET, "/healthz") => json(StatusCode::OK, &serde_json::json!({ "status": "ok" })),
        (_, p) if p.starts_with("/balance/") => match balance_player(p) {
            Some(player_id) if method == Method::GET => balance(state, player_id).await,
            Some(_) => json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"),
            None => json_error(StatusCode::NOT_FOUND, "not found"),
        },
        (_, p) if KNOWN_PATHS.contains(&p) => {
            json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
        }
        _ => json_error(StatusCode::NOT_FOUND, "not found"),
    };

    Ok(with_cors(resp))
}
