use crate::error::{AppError, Result};
use crate::model::PingResponse;
use crate::state::AppState;
use axum::extract::State;
use axum::Json;

pub async fn ping_handler(State(state): State<AppState>) -> Result<Json<PingResponse>> {
    let backend = state.shortener().backend();
    match state.shortener().ping().await {
        Some(Ok(())) => Ok(Json(PingResponse {
            status: "ok",
            backend,
        })),
        Some(Err(err)) => Err(err.into()),
        None => Err(AppError::PingUnsupported(backend)),
    }
}
