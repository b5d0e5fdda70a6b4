use crate::auth::{LoginError, LoginOrchestrator, LoginRequest};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

pub const CHALLENGE_HEADER: &str = "cf-turnstile-response";
pub const CHALLENGE_HEADER_FALLBACK: &str = "cf-turnstile-token";

#[derive(ToSchema, Deserialize)]
pub struct UserLogin {
    #[serde(alias = "user")]
    username: String,
    password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    pub user_id: String,
    pub username: String,
    pub expires_in: i64,
}

#[utoipa::path(
    post,
    path= "/login",
    request_body = UserLogin,
    params(
        ("cf-turnstile-response" = String, Header, description = "Turnstile challenge token"),
    ),
    responses (
        (status = 200, description = "Login successful", body = LoginResponse, content_type = "application/json"),
        (status = 400, description = "Malformed or invalid request body"),
        (status = 401, description = "Challenge rejected or invalid credentials"),
        (status = 500, description = "Server misconfigured or internal error"),
    ),
    tag= "auth"
)]
// axum handler for login
#[instrument(skip(orchestrator, headers, payload))]
pub async fn login(
    orchestrator: Extension<Arc<LoginOrchestrator>>,
    headers: HeaderMap,
    payload: Option<Json<UserLogin>>,
) -> Response {
    let Some(Json(user)) = payload else {
        return no_store((StatusCode::BAD_REQUEST, "Missing payload".to_string()));
    };

    let request = match LoginRequest::new(user.username, user.password) {
        Ok(request) => request,
        Err(err) => {
            debug!("rejecting login request: {err}");
            return no_store((StatusCode::BAD_REQUEST, err.to_string()));
        }
    };

    let challenge_token = extract_challenge_token(&headers).unwrap_or_default();

    match orchestrator
        .login(request.username(), request.password(), &challenge_token)
        .await
    {
        Ok(success) => no_store((
            StatusCode::OK,
            Json(LoginResponse {
                access_token: success.access_token,
                token_type: "bearer".to_string(),
                user_id: success.user_id,
                username: success.username,
                expires_in: success.expires_in,
            }),
        )),
        Err(err) => no_store(login_error_response(err)),
    }
}

pub(crate) fn login_error_response(err: LoginError) -> (StatusCode, String) {
    let status = match err {
        LoginError::Config | LoginError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        LoginError::ChallengeRejected | LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
    };
    (status, err.to_string())
}

fn no_store(response: impl IntoResponse) -> Response {
    ([(CACHE_CONTROL, "no-store")], response).into_response()
}

fn extract_challenge_token(headers: &HeaderMap) -> Option<String> {
    [CHALLENGE_HEADER, CHALLENGE_HEADER_FALLBACK]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}
