//! Token extraction and the identity probe

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    Json,
};
use debatehub_core::models::IdentityClaims;
use serde::{Deserialize, Serialize};

use crate::http::{AppError, AppResult, AppState};

/// Query parameters carrying an access token
#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

/// Token from `?token=`, falling back to `Authorization: Bearer`
#[must_use]
pub fn extract_token(query: &TokenQuery, headers: &HeaderMap) -> Option<String> {
    query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
        .map(str::to_string)
}

/// Verify the request's token
pub async fn authenticate(
    state: &AppState,
    query: &TokenQuery,
    headers: &HeaderMap,
) -> AppResult<IdentityClaims> {
    let token = extract_token(query, headers)
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    Ok(state.authenticator.authenticate(&token).await?)
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
    pub user_name: String,
    pub subject: String,
}

/// Return the identity the server derives from the caller's token
pub async fn me(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
    headers: HeaderMap,
) -> AppResult<Json<MeResponse>> {
    let claims = authenticate(&state, &query, &headers).await?;
    Ok(Json(MeResponse {
        user_id: claims.identity,
        user_name: claims.name,
        subject: claims.subject,
    }))
}
