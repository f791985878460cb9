//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware with role-based access control.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {role}:{actor_id}:{secret}    # role-scoped actor
//! Bearer {secret}                       # legacy: admin, actor "legacy-admin"
//! ```
//!
//! Roles are ordered `contributor < reviewer < admin`. The actor id is the
//! identity every four-eyes comparison runs on.
//!
//! With authentication disabled (no `AUTH_TOKEN`), every request runs as an
//! admin whose actor id comes from the `x-actor-id` header, defaulting to
//! `local-operator`.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use acr_core::ActorId;

use crate::error::{AppError, ErrorBody, ErrorDetail};

/// Header naming the actor when authentication is disabled.
pub const ACTOR_HEADER: &str = "x-actor-id";

const LOCAL_OPERATOR: &str = "local-operator";
const LEGACY_ADMIN: &str = "legacy-admin";

// ── Role ────────────────────────────────────────────────────────────────────

/// Roles ordered by privilege level.
///
/// `Ord` follows declaration order, so `>=` is the role check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Registers systems, drafts and submits assessments, generates documents.
    Contributor,
    /// Approves or rejects assessments, activates systems, updates mappings.
    Reviewer,
    /// Everything, including policy catalog management.
    Admin,
}

impl Role {
    /// Return the string representation of this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contributor => "contributor",
            Self::Reviewer => "reviewer",
            Self::Admin => "admin",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "contributor" => Some(Self::Contributor),
            "reviewer" => Some(Self::Reviewer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller, injected by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// The acting principal.
    pub actor: ActorId,
    /// The caller's role.
    pub role: Role,
}

impl CallerIdentity {
    /// Check if the caller has at least the given minimum role.
    pub fn has_role(&self, minimum: Role) -> bool {
        self.role >= minimum
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller has at least the required role.
pub fn require_role(caller: &CallerIdentity, minimum: Role) -> Result<(), AppError> {
    if caller.has_role(minimum) {
        Ok(())
    } else {
        Err(AppError::PermissionDenied(format!(
            "role '{}' required, caller has '{}'",
            minimum.as_str(),
            caller.role.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token in format `{role}:{actor_id}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity {
                    actor: ActorId::new(LEGACY_ADMIN).map_err(|e| e.to_string())?,
                    role: Role::Admin,
                })
            } else {
                Err("invalid bearer token".into())
            }
        }
        [role, actor, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let role = Role::parse(role).ok_or_else(|| format!("unknown role: {role}"))?;
            let actor = ActorId::new(*actor).map_err(|e| e.to_string())?;
            Ok(CallerIdentity { actor, role })
        }
        _ => Err("invalid token format, expected {role}:{actor_id}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    let provided = &header_value[7..];
                    match parse_bearer_token(provided, expected) {
                        Ok(identity) => {
                            request.extensions_mut().insert(identity);
                            next.run(request).await
                        }
                        Err(msg) => {
                            tracing::warn!(
                                reason = %msg,
                                "authentication failed: invalid bearer token"
                            );
                            unauthorized_response(&msg)
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            let raw = request
                .headers()
                .get(ACTOR_HEADER)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(LOCAL_OPERATOR);
            match ActorId::new(raw) {
                Ok(actor) => {
                    request.extensions_mut().insert(CallerIdentity {
                        actor,
                        role: Role::Admin,
                    });
                    next.run(request).await
                }
                Err(e) => {
                    tracing::warn!(error = %e, "rejected malformed actor header");
                    unauthorized_response(&e.to_string())
                }
            }
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
