use crate::accumulator::Accumulator;
use crate::auth::{AuthError, TokenAuthority};
use crate::config::Config;
use crate::metrics_defs::LOGIN_FAILURES;
use crate::pagination::{PageWindow, RepositoriesResponse};
use crate::types::FilterSpec;
use crate::upstream::{RepositorySource, UpstreamError};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, Request, State},
    http::{StatusCode, header::AUTHORIZATION},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::counter;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared by all requests and read-only after startup.
#[derive(Clone)]
pub struct AppState {
    accumulator: Accumulator,
    auth: Arc<TokenAuthority>,
}

impl AppState {
    pub fn new(source: Arc<dyn RepositorySource>, config: &Config) -> Self {
        AppState {
            accumulator: Accumulator::new(source, config.accumulation.clone()),
            auth: Arc::new(TokenAuthority::new(config.login.clone(), &config.jwt)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/repositories", get(list_repositories))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/login", post(login))
        .merge(protected)
        .with_state(state)
}

/// Serves the public API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Invalid jwt token")]
    Unauthorized,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid request body")]
    InvalidRequestBody,
    #[error("Error generating JWT token")]
    TokenIssue(#[source] AuthError),
    #[error("Failed to fetch repositories: {0}")]
    Upstream(#[from] UpstreamError),
}

#[derive(Serialize)]
struct ApiErrorResponse {
    error_message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequestBody => StatusCode::BAD_REQUEST,
            ApiError::TokenIssue(_) | ApiError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ApiErrorResponse {
            error_message: self.to_string(),
        });

        (status, body).into_response()
    }
}

async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    match state.auth.verify_header(header) {
        Ok(claims) => {
            tracing::debug!(user = %claims.sub, "token accepted");
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(error = %e, path = request.uri().path(), "token validation failed");
            Err(ApiError::Unauthorized)
        }
    }
}

#[derive(Debug, Default, PartialEq)]
struct RepositoryParams {
    language: Option<String>,
    license: Option<String>,
    org: Option<String>,
    // Kept as raw strings so that invalid values fall back to defaults
    // instead of rejecting the request.
    page: Option<String>,
    limit: Option<String>,
}

impl RepositoryParams {
    /// Reads the known keys from a raw query string. The first occurrence of
    /// a repeated key wins and unknown keys are ignored.
    fn from_query(query: Option<&str>) -> Self {
        let mut params = RepositoryParams::default();

        for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "language" => &mut params.language,
                "license" => &mut params.license,
                "org" => &mut params.org,
                "page" => &mut params.page,
                "limit" => &mut params.limit,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }
}

async fn list_repositories(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<RepositoriesResponse>, ApiError> {
    let params = RepositoryParams::from_query(query.as_deref());
    let filter = FilterSpec::new(params.language, params.license, params.org);
    let window = PageWindow::for_request(&filter, params.page.as_deref(), params.limit.as_deref());

    let set = state
        .accumulator
        .accumulate(&filter, Utc::now().date_naive())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, ?filter, "failed to accumulate repositories");
            ApiError::from(e)
        })?;

    let response = RepositoriesResponse::assemble(set, window);
    tracing::info!(
        ?filter,
        page = window.page(),
        limit = window.limit(),
        total_count = response.total_count,
        returned = response.repositories.len(),
        "repositories served"
    );

    Ok(Json(response))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
struct LoginResponse {
    token: String,
}

async fn login(State(state): State<AppState>, body: Bytes) -> Result<Json<LoginResponse>, ApiError> {
    let request: LoginRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "could not decode login request");
        ApiError::InvalidRequestBody
    })?;

    if !state
        .auth
        .check_credentials(&request.username, &request.password)
    {
        counter!(LOGIN_FAILURES).increment(1);
        tracing::warn!(username = %request.username, "invalid login attempt");
        return Err(ApiError::InvalidCredentials);
    }

    let token = state.auth.issue(&request.username).map_err(|e| {
        tracing::error!(error = %e, "could not generate token");
        ApiError::TokenIssue(e)
    })?;
    tracing::info!(username = %request.username, "login succeeded");

    Ok(Json(LoginResponse { token }))
}
