use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::error;
use uuid::Uuid;

use roost_types::api::{Claims, StatusResponse};

use crate::auth::AppState;

/// Presence snapshot for one user: the in-memory registry decides whether
/// they are online; the store mirror supplies last-seen across restarts.
pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<StatusResponse>, StatusCode> {
    let snapshot = state.dispatcher.status(user_id).await;

    // Run the blocking DB read off the async runtime
    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.get_user_by_id(&user_id.to_string()))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let user = row
        .into_model()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(StatusResponse {
        user_id,
        online: snapshot.online,
        last_seen: snapshot.last_seen.or(user.last_seen),
    }))
}
