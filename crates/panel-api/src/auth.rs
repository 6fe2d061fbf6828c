//! API key and session authentication middleware.
//!
//! `AuthLayer` wraps the API routes with credential validation. Two
//! credentials are accepted: the `X-API-Key` header carrying an `sk_` key
//! (what the test tool sends on every request) and an opaque session token
//! minted by the session endpoint, sent as `Authorization: Bearer` or the
//! `X-Session-Token` header. On success the resolved [`CurrentUser`] lands
//! in request extensions.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::Json;
use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use http::Request;
use serde_json::json;
use tower::{Layer, Service};

use panel_store::{Role, User};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the tool's API key.
pub const API_KEY_HEADER: &str = "x-api-key";
/// Header carrying a minted session token.
pub const SESSION_HEADER: &str = "x-session-token";

/// The authenticated user, available to handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Fails with 403 unless the user is an admin.
    pub fn require_admin(&self) -> ApiResult<&User> {
        if self.0.role == Role::Admin {
            Ok(&self.0)
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// Tower `Layer` that wraps services with credential validation.
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    /// Create an auth layer backed by the app's store.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: self.state.clone(),
        }
    }
}

/// Tower `Service` that validates credentials before forwarding requests.
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    state: AppState,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let state = self.state.clone();

        Box::pin(async move {
            let user = match authenticate(&state, &req) {
                Ok(user) => user,
                Err(message) => return Ok(unauthorized_response(&message)),
            };

            req.extensions_mut().insert(CurrentUser(user));
            let resp = inner
                .call(req)
                .await
                .unwrap_or_else(|infallible| match infallible {});
            Ok(resp.into_response())
        })
    }
}

fn authenticate(state: &AppState, req: &Request<Body>) -> Result<User, String> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    if let Some(key) = header(API_KEY_HEADER) {
        return match state.store.user_by_api_key(key) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err("invalid API key".to_string()),
            Err(e) => {
                log::error!("API key lookup failed: {e}");
                Err("authentication unavailable".to_string())
            }
        };
    }

    // Session tokens arrive either as a bearer token (browser) or in the
    // dedicated header (older tooling).
    let bearer = header("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(token) = bearer.or_else(|| header(SESSION_HEADER)) {
        return match state.store.user_by_session(token) {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err("invalid or expired session".to_string()),
            Err(e) => {
                log::error!("session lookup failed: {e}");
                Err("authentication unavailable".to_string())
            }
        };
    }

    Err("missing API key".to_string())
}

fn unauthorized_response(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"success": false, "error": message})),
    )
        .into_response()
}
