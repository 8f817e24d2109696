use std::collections::BTreeMap;

use common::{
    error::AppError,
    file_search::FileSearchService,
    storage::{db::SurrealDbClient, types::policy_document::PolicyDocument},
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    citations::{insert_citation_markers, resolve_citations, Citation},
    store_registry::StoreRegistry,
};

/// Answer text with inline `[n]` markers and the citations they point to.
#[derive(Debug, Clone, Serialize)]
pub struct SearchAnswer {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub fragment_map: BTreeMap<usize, usize>,
}

#[instrument(skip_all, fields(query_chars = query.chars().count()))]
pub async fn answer_question(
    db: &SurrealDbClient,
    registry: &StoreRegistry,
    service: &dyn FileSearchService,
    query: &str,
) -> Result<SearchAnswer, AppError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation("query must not be empty".into()));
    }

    let store_handle = registry.get_or_create_store().await?;
    let grounded = service
        .generate_answer(query, &store_handle)
        .await
        .map_err(|err| err.context("generate answer"))?;
    let documents = PolicyDocument::list_all(db).await?;

    let resolution = resolve_citations(&grounded.fragments, &documents);
    let answer = insert_citation_markers(&grounded.text, &grounded.supports, &resolution);

    info!(
        fragment_count = grounded.fragments.len(),
        citation_count = resolution.citations.len(),
        unresolved = resolution.citations.iter().filter(|c| !c.resolved).count(),
        "answered question"
    );

    Ok(SearchAnswer {
        answer,
        citations: resolution.citations,
        fragment_map: resolution.fragment_map,
    })
}
