use axum::{
    Router,
    extract::{Json, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    CalculationResult, CapTableSnapshot, EngineConfig, ExitScenario, FundingRound, Scenario,
    calculate_cap_table_with, calculate_exit_returns_with,
};

mod validation;

pub use validation::{
    FieldError, validate_exit_valuation, validate_funding_rounds, validate_scenario,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub scenario: Scenario,
    #[serde(default)]
    pub funding_rounds: Vec<FundingRound>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitSimulationRequest {
    #[serde(default)]
    pub cap_table: Vec<CapTableSnapshot>,
    pub exit_valuation: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Validation failed: {}", describe(.0))]
    Validation(Vec<FieldError>),
    #[error("No cap table data found. Please calculate cap table first.")]
    NoCapTable,
}

fn describe(details: &[FieldError]) -> String {
    details
        .iter()
        .map(|d| format!("{}: {}", d.path, d.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<FieldError>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub engine: EngineConfig,
}

pub fn calculate_request_from_json(json: &str) -> Result<CalculateRequest, String> {
    serde_json::from_str::<CalculateRequest>(json)
        .map_err(|e| format!("Invalid calculate request JSON: {e}"))
}

/// Validates the request shape, then runs the engine. Engine-level problems
/// come back inside the result, not as an error.
pub fn run_calculation(
    engine: &EngineConfig,
    request: &CalculateRequest,
) -> Result<CalculationResult, ApiError> {
    let mut details = validate_scenario(&request.scenario);
    details.extend(validate_funding_rounds(&request.funding_rounds));
    if !details.is_empty() {
        return Err(ApiError::Validation(details));
    }

    Ok(calculate_cap_table_with(
        engine,
        &request.scenario,
        &request.funding_rounds,
    ))
}

/// Distributes the exit over the latest snapshot in the supplied history.
pub fn run_exit_simulation(
    engine: &EngineConfig,
    request: &ExitSimulationRequest,
) -> Result<ExitScenario, ApiError> {
    let details = validate_exit_valuation(request.exit_valuation);
    if !details.is_empty() {
        return Err(ApiError::Validation(details));
    }

    let latest = request.cap_table.last().ok_or(ApiError::NoCapTable)?;
    Ok(calculate_exit_returns_with(
        engine,
        latest,
        request.exit_valuation,
    ))
}

pub fn router(engine: EngineConfig) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/api/exit-simulation", post(exit_simulation_handler))
        .fallback(not_found_handler)
        .with_state(engine)
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "cap table HTTP API listening");

    axum::serve(listener, router(config.engine)).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn calculate_handler(
    State(engine): State<EngineConfig>,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match run_calculation(&engine, &request) {
        Ok(result) => {
            info!(
                scenario = %request.scenario.id,
                rounds = request.funding_rounds.len(),
                issues = result.validation_errors.len(),
                "calculate request served"
            );
            json_response(StatusCode::OK, result)
        }
        Err(err) => api_error_response(err),
    }
}

async fn exit_simulation_handler(
    State(engine): State<EngineConfig>,
    payload: Result<Json<ExitSimulationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    match run_exit_simulation(&engine, &request) {
        Ok(exit) => {
            info!(
                exit_valuation = request.exit_valuation,
                holders = exit.returns.len(),
                "exit simulation served"
            );
            json_response(StatusCode::OK, exit)
        }
        Err(err) => api_error_response(err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            details: Vec::new(),
        },
    )
}

fn rejection_response(rejection: JsonRejection) -> Response {
    warn!(error = %rejection.body_text(), "rejected request body");
    error_response(
        StatusCode::BAD_REQUEST,
        &format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn api_error_response(err: ApiError) -> Response {
    match err {
        ApiError::Validation(details) => json_response(
            StatusCode::BAD_REQUEST,
            ErrorResponse {
                error: "Validation failed".to_string(),
                details,
            },
        ),
        ApiError::NoCapTable => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}
