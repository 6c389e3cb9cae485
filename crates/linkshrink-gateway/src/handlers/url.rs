use crate::error::Result;
use crate::model::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Redirect;
use axum::Json;
use linkshrink_core::{BatchEntry, ShortenOutcome};

fn outcome_status(outcome: &ShortenOutcome) -> StatusCode {
    if outcome.is_created() {
        StatusCode::CREATED
    } else {
        StatusCode::CONFLICT
    }
}

/// `POST /` with the URL as the raw request body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, String)> {
    let outcome = state.shortener().shorten(&body).await?;
    Ok((outcome_status(&outcome), state.short_url(outcome.code())))
}

/// `POST /api/shorten` with `{"url": ...}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ShortenResponse>)> {
    let request: ShortenRequest = serde_json::from_slice(&body)?;
    let outcome = state.shortener().shorten(&request.url).await?;
    let response = ShortenResponse {
        result: state.short_url(outcome.code()),
    };
    Ok((outcome_status(&outcome), Json(response)))
}

/// `POST /api/shorten/batch` with an array of `{correlation_id, original_url}`.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<BatchResponseItem>>)> {
    let request: Vec<BatchRequestItem> = serde_json::from_slice(&body)?;
    let entries = request.into_iter().map(BatchEntry::from).collect();

    let items = state.shortener().shorten_batch(entries).await?;
    let response = items
        .into_iter()
        .map(|item| BatchResponseItem {
            short_url: state.short_url(&item.code),
            correlation_id: item.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /{id}` answers with a temporary redirect to the original URL.
pub async fn redirect_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect> {
    let original_url = state.shortener().resolve(&id).await?;
    Ok(Redirect::temporary(&original_url))
}
