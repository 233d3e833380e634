//! Turn history of a debate room

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use debatehub_core::models::{RoomCode, Turn};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::identity::{authenticate, TokenQuery};
use crate::http::{AppError, AppResult, AppState};

const DEFAULT_TURN_LIMIT: usize = 50;
const MAX_TURN_LIMIT: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct TurnsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TurnsResponse {
    pub room_code: RoomCode,
    /// Oldest first
    pub turns: Vec<Turn>,
}

/// `GET /api/rooms/{room_code}/turns?limit=N`: latest turns of a room
pub async fn list_turns(
    State(state): State<AppState>,
    Path(room_code): Path<String>,
    Query(token): Query<TokenQuery>,
    Query(query): Query<TurnsQuery>,
    headers: HeaderMap,
) -> AppResult<Json<TurnsResponse>> {
    let room_code = RoomCode::parse(&room_code)?;
    let claims = authenticate(&state, &token, &headers).await?;

    if !state.store.room_exists(&room_code).await? {
        return Err(AppError::not_found(format!("Room {room_code} not found")));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_TURN_LIMIT)
        .clamp(1, MAX_TURN_LIMIT);
    let turns = state.store.list_turns(&room_code, limit).await?;
    debug!(
        room_code = %room_code,
        identity = %claims.identity,
        count = turns.len(),
        "Turns listed"
    );

    Ok(Json(TurnsResponse { room_code, turns }))
}

#[cfg(test)]
mod tests {
    use crate::http::{create_router, test_support, AppState};
    use axum::{body::Body, http::Request, http::StatusCode};
    use debatehub_core::models::{RoomCode, Role};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    fn token() -> String {
        encode(
            &Header::default(),
            &serde_json::json!({"sub": "kp_1", "email": "a@x.com", "exp": 4_102_444_800_i64}),
            &EncodingKey::from_secret(test_support::SECRET),
        )
        .unwrap()
    }

    async fn get(state: AppState, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = create_router(state)
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn seeded_state() -> AppState {
        let state = test_support::state();
        let code = RoomCode::parse("ABC123").unwrap();
        state.store.get_or_create_room(&code, "a@x.com").await.unwrap();
        for (identity, role, text) in [
            ("a@x.com", Role::Challenger, "Opening"),
            ("b@y.com", Role::Defender, "Rebuttal"),
            ("a@x.com", Role::Challenger, "Closing"),
        ] {
            state.store.append_turn(&code, identity, role, text).await.unwrap();
        }
        state
    }

    #[tokio::test]
    async fn test_latest_turns_oldest_first() {
        let uri = format!("/api/rooms/abc123/turns?limit=2&token={}", token());
        let (status, value) = get(seeded_state().await, &uri).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["room_code"], "ABC123");
        let turns = value["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["text"], "Rebuttal");
        assert_eq!(turns[0]["role"], "defender");
        assert_eq!(turns[1]["turn_number"], 3);
    }

    #[tokio::test]
    async fn test_default_limit_returns_everything() {
        let uri = format!("/api/rooms/ABC123/turns?token={}", token());
        let (status, value) = get(seeded_state().await, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["turns"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_turns_rejections() {
        let (status, _) = get(seeded_state().await, "/api/rooms/ABC123/turns").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let uri = format!("/api/rooms/ab!/turns?token={}", token());
        let (status, _) = get(seeded_state().await, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/rooms/ZZZ999/turns?token={}", token());
        let (status, _) = get(seeded_state().await, &uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
