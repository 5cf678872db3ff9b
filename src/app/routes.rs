//! Reference routes: login/refresh/logout, profile, user lookup, uploads, assets.

use axum::http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::app::users::UserDirectory;
use crate::auth::{AuthCookies, CredentialVerifier, Identity, IdentityProvider, REFRESH_COOKIE};
use crate::binding::{
    Arguments, Constraint, FileUploadSpec, ParamType, ParameterDescriptor, UploadOutcome, Validate,
    ValidationReport,
};
use crate::dispatch::DispatchError;
use crate::http::{Reply, ResponseEntity};
use crate::observability::AuditPolicy;
use crate::routing::RouteSpec;
use crate::security::{RateKeySource, RateLimitPolicy, TokenKind, TokenService};

pub const UPLOAD_MAX_BYTES: usize = 100 * 1024 * 1024;

/// Shared by the auth handlers.
#[derive(Debug, Clone)]
pub struct AuthState {
    pub users: Arc<UserDirectory>,
    pub tokens: Arc<TokenService>,
    pub cookies: AuthCookies,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username.
    pub value: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        report
            .not_blank("value", &self.value)
            .not_blank("password", &self.password);
        report
    }
}

#[derive(Debug, Serialize)]
struct TokenPair<'a> {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: i64,
    user: &'a Identity,
}

fn issue_tokens(state: &AuthState, args: &Arguments, identity: &Identity) -> Result<Reply, DispatchError> {
    let request = args.request()?;
    let (ip, ua) = (request.client_ip.as_str(), request.user_agent());
    let access_token = state.tokens.issue_access(&identity.id, ip, ua);
    let refresh_token = state.tokens.issue_refresh(&identity.id, ip, ua);
    state.cookies.set(&args.response()?, &access_token, &refresh_token);

    Reply::json(&TokenPair {
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.tokens.access_ttl().num_seconds(),
        user: identity,
    })
}

async fn login(args: Arguments, state: AuthState) -> Result<Reply, DispatchError> {
    let credentials = args.body::<LoginRequest>("credentials")?;
    let Some(identity) = state.users.verify(&credentials.value, &credentials.password) else {
        tracing::info!(username = %credentials.value, "Login failed");
        return Err(DispatchError::Unauthenticated("Invalid credentials".into()));
    };
    tracing::info!(user_id = %identity.id, "Login succeeded");
    issue_tokens(&state, &args, &identity)
}

async fn refresh(args: Arguments, state: AuthState) -> Result<Reply, DispatchError> {
    let request = args.request()?;
    let invalid = || DispatchError::Unauthenticated("Invalid refresh token".into());

    let token = request.cookie(REFRESH_COOKIE).ok_or_else(invalid)?;
    let claims = state
        .tokens
        .validate(token, &request.client_ip, request.user_agent(), TokenKind::Refresh)
        .map_err(|err| {
            tracing::debug!(error = %err, "Refresh token rejected");
            invalid()
        })?;
    let identity = state.users.find_by_id(&claims.sub).ok_or_else(invalid)?;
    issue_tokens(&state, &args, &identity)
}

async fn logout(args: Arguments, state: AuthState) -> Result<Reply, DispatchError> {
    state.cookies.clear(&args.response()?);
    Ok(Reply::text("Logged out"))
}

async fn me(args: Arguments) -> Result<Reply, DispatchError> {
    Reply::json(args.identity()?)
}

async fn get_user(args: Arguments, users: Arc<UserDirectory>) -> Result<Reply, DispatchError> {
    let id = args.str("id")?;
    let user = users
        .find_by_id(id)
        .ok_or_else(|| DispatchError::not_found(format!("User not found: {}", id)))?;
    Reply::json(&user)
}

#[derive(Debug, Serialize)]
struct UserPage {
    page: i64,
    per_page: i64,
    total: usize,
    users: Vec<Identity>,
}

async fn list_users(args: Arguments, users: Arc<UserDirectory>) -> Result<Reply, DispatchError> {
    let page = args.i64("page")?;
    let per_page = args.i64("per_page")?;
    let all = users.list(args.opt_str("role")?);

    let skip = usize::try_from((page - 1).saturating_mul(per_page)).unwrap_or(usize::MAX);
    let take = usize::try_from(per_page).unwrap_or(0);
    Reply::json(&UserPage {
        page,
        per_page,
        total: all.len(),
        users: all.into_iter().skip(skip).take(take).collect(),
    })
}

async fn upload(mut args: Arguments) -> Result<Reply, DispatchError> {
    match args.upload("file")? {
        UploadOutcome::Complete(file) => Reply::json(&serde_json::json!({
            "file_name": file.file_name,
            "content_type": file.content_type,
            "size": file.data.len(),
            "upload_id": file.upload_id,
        })),
        UploadOutcome::Partial {
            upload_id,
            received,
            total,
        } => Ok(Reply::Entity(ResponseEntity::new(StatusCode::ACCEPTED).json(
            &serde_json::json!({
                "upload_id": upload_id,
                "received": received,
                "total": total,
            }),
        )?)),
    }
}

async fn health(_args: Arguments) -> Result<Reply, DispatchError> {
    Reply::json(&serde_json::json!({ "status": "ok" }))
}

const ASSETS: &[(&str, &str, &[u8])] = &[
    ("robots.txt", "text/plain; charset=utf-8", b"User-agent: *\nDisallow: /auth/\n"),
    (
        "logo.svg",
        "image/svg+xml",
        b"<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"16\" height=\"16\"><rect width=\"16\" height=\"16\"/></svg>",
    ),
];

async fn asset(args: Arguments) -> Result<Reply, DispatchError> {
    let name = args.opt_str("*")?.unwrap_or_default();
    let (_, content_type, body) = ASSETS
        .iter()
        .find(|(asset, _, _)| *asset == name)
        .ok_or_else(|| DispatchError::not_found(format!("Asset not found: {}", name)))?;
    Ok(Reply::Entity(
        ResponseEntity::ok().bytes(*body, HeaderValue::from_static(*content_type)),
    ))
}

/// Login attempts are counted per submitted username.
const LOGIN_KEY: RateKeySource = RateKeySource::Field("value");

/// Route declarations. `auth_path` prefixes the login endpoints.
pub fn routes(
    auth_path: &str,
    state: &AuthState,
    login_limit: RateLimitPolicy,
    refresh_limit: RateLimitPolicy,
) -> Vec<RouteSpec> {
    let base = auth_path.trim_end_matches('/');
    let users = Arc::clone(&state.users);

    let login_state = state.clone();
    let refresh_state = state.clone();
    let logout_state = state.clone();
    let lookup_users = Arc::clone(&users);
    let list_users_dir = users;

    vec![
        RouteSpec::post(format!("{}/login", base), move |args: Arguments| {
            login(args, login_state.clone())
        })
        .param(ParameterDescriptor::body::<LoginRequest>("credentials"))
        .param(ParameterDescriptor::request())
        .param(ParameterDescriptor::response())
        .rate_limit(login_limit.keyed_by(LOGIN_KEY))
        .audit("LOGIN_ATTEMPT"),
        RouteSpec::post(format!("{}/refresh", base), move |args: Arguments| {
            refresh(args, refresh_state.clone())
        })
        .param(ParameterDescriptor::request())
        .param(ParameterDescriptor::response())
        .rate_limit(refresh_limit)
        .audit("TOKEN_REFRESH"),
        RouteSpec::post(format!("{}/logout", base), move |args: Arguments| {
            logout(args, logout_state.clone())
        })
        .param(ParameterDescriptor::response())
        .audit(AuditPolicy::new("LOGOUT").without_parameters()),
        RouteSpec::get(format!("{}/me", base), me).param(ParameterDescriptor::identity("me")),
        RouteSpec::get("/users", move |args: Arguments| list_users(args, Arc::clone(&list_users_dir)))
            .param(ParameterDescriptor::query("page", ParamType::I64).default_value("1").with(Constraint::Min(1.0)))
            .param(
                ParameterDescriptor::query("per_page", ParamType::I64)
                    .default_value("20")
                    .with(Constraint::Min(1.0)),
            )
            .param(ParameterDescriptor::query("role", ParamType::Str).optional())
            .require_permission("users.read"),
        RouteSpec::get("/users/{id}", move |args: Arguments| get_user(args, Arc::clone(&lookup_users)))
            .param(ParameterDescriptor::path("id", ParamType::Str).with(Constraint::NotBlank))
            .require_permission("users.read"),
        RouteSpec::post("/files", upload)
            .param(ParameterDescriptor::file(
                "file",
                FileUploadSpec::new().max_size(UPLOAD_MAX_BYTES).chunked(),
            ))
            .require_permission("files.write"),
        RouteSpec::get("/health", health),
        RouteSpec::get("/assets/*", asset).param(ParameterDescriptor::path("*", ParamType::Str).optional()),
    ]
}
