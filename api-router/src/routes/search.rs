use axum::{extract::State, response::IntoResponse, Json};
use retrieval_pipeline::answer_question;
use serde::Deserialize;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

pub async fn search_documents(
    State(state): State<ApiState>,
    Json(params): Json<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    info!(query_chars = params.query.chars().count(), "Received search request");

    let answer = answer_question(
        &state.db,
        &state.registry,
        state.file_search.as_ref(),
        &params.query,
    )
    .await?;

    Ok(Json(answer))
}
