/// Admin Authentication Routes
///
/// Login, token refresh, logout and the guarded session endpoints.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{AdminAuthGate, IssuedToken, Session};
use crate::directory::Principal;
use crate::error::{AppError, ErrorContext, ValidationError};
use crate::middleware::bearer_token;
use crate::validators::{is_present_password, is_valid_email};

/// Admin login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Optional logout body; lets a client drop its refresh token too
#[derive(Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Superuser request to revoke someone else's token
#[derive(Deserialize)]
pub struct RevokeRequest {
    pub token: String,
}

/// Login response with access and refresh tokens
#[derive(Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Refresh response, access token only
#[derive(Serialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl From<IssuedToken> for AccessTokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            access_token: token.token,
            token_type: token.token_type,
            expires_in: token.expires_in,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&Principal> for UserResponse {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.id,
            email: principal.email.clone(),
            is_staff: principal.is_staff,
            is_superuser: principal.is_superuser,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub valid: bool,
    pub expires_at: i64,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

/// POST /admin/login
///
/// Authenticate an administrator with email and password.
///
/// # Errors
/// - 400: Email or password missing / malformed
/// - 401: `INVALID_CREDENTIALS` for every rejection, including inactive and
///   non-admin accounts
/// - 503: User directory unavailable
pub async fn login(
    form: web::Json<LoginRequest>,
    gate: web::Data<AdminAuthGate>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_login");

    let LoginRequest { email, password } = form.into_inner();
    let email = is_valid_email(&email)?;
    is_present_password(&password)?;

    // bcrypt is CPU bound, keep it off the worker thread
    let gate = gate.into_inner();
    let outcome = web::block(move || gate.login(&email, &password))
        .await?
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    tracing::info!(
        request_id = %context.request_id,
        user_id = outcome.principal.id,
        "Admin login succeeded"
    );

    let user = UserResponse::from(&outcome.principal);
    let access = outcome.tokens.access;

    Ok(HttpResponse::Ok().json(AuthResponse {
        access_token: access.token,
        refresh_token: outcome.tokens.refresh.token,
        token_type: access.token_type,
        expires_in: access.expires_in,
        user,
    }))
}

/// POST /admin/refresh-token
///
/// Issue a new access token from a refresh token. The refresh token is not
/// rotated.
///
/// # Errors
/// - 400: Empty refresh token
/// - 401: Refresh token expired, revoked, malformed, of the wrong kind, or
///   belonging to a principal that is gone or inactive
pub async fn refresh_token(
    form: web::Json<RefreshRequest>,
    gate: web::Data<AdminAuthGate>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_refresh_token");

    if form.refresh_token.trim().is_empty() {
        return Err(ValidationError::EmptyField("refresh_token").into());
    }

    let access = gate.refresh(form.refresh_token.trim()).map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::Ok().json(AccessTokenResponse::from(access)))
}

/// POST /admin/logout
///
/// Revoke the bearer token and, when given, the refresh token in the body.
/// Expired tokens are accepted as long as their signature holds. Nothing is
/// revoked unless both tokens parse.
///
/// # Errors
/// - 400: Missing bearer header or a token that cannot be parsed
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<LogoutRequest>>,
    gate: web::Data<AdminAuthGate>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_logout");

    let token = bearer_token(req.headers()).ok_or(ValidationError::EmptyField("token"))?;
    let refresh_token = body
        .map(|body| body.into_inner())
        .unwrap_or_default()
        .refresh_token
        .filter(|token| !token.trim().is_empty());

    gate.logout(token, refresh_token.as_deref().map(str::trim))
        .map_err(|e| {
            context.log_error(&e);
            ValidationError::InvalidFormat("token")
        })?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Logged out",
    }))
}

/// GET /admin/verify-token
///
/// **Requires a valid admin access token** (`AdminGuard`).
pub async fn verify_token(
    session: web::ReqData<Session>,
    gate: web::Data<AdminAuthGate>,
) -> HttpResponse {
    let session = session.into_inner();
    HttpResponse::Ok().json(SessionResponse {
        valid: true,
        expires_at: session.claims.exp,
        expires_in: gate.remaining_seconds(&session),
        user: UserResponse::from(&session.principal),
    })
}

/// GET /admin/profile
///
/// **Requires a valid admin access token** (`AdminGuard`).
pub async fn profile(session: web::ReqData<Session>) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(&session.principal))
}

/// POST /admin/revoke-token
///
/// **Superuser only.** Revoke an arbitrary admin token, e.g. one that leaked.
///
/// # Errors
/// - 400: Token cannot be parsed
pub async fn revoke_token(
    session: web::ReqData<Session>,
    form: web::Json<RevokeRequest>,
    gate: web::Data<AdminAuthGate>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_revoke_token").with_user_id(session.principal.id);

    gate.revoke(form.token.trim(), &session.principal)
        .map_err(|e| {
            context.log_error(&e);
            ValidationError::InvalidFormat("token")
        })?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Token revoked",
    }))
}
