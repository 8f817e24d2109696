use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    documents::{
        delete_document, document_url, download_document, get_document, list_documents,
        upload_document,
    },
    health::{live, ready},
    search::search_documents,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes for k8s/systemd
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let documents = Router::new()
        .route(
            "/documents",
            post(upload_document)
                .layer(DefaultBodyLimit::max(app_state.config.ingest_max_body_bytes))
                .get(list_documents),
        )
        .route("/documents/{id}", get(get_document).delete(delete_document))
        .route("/documents/{id}/url", get(document_url))
        .route("/documents/{id}/download", get(download_document))
        .route("/search", post(search_documents));

    probes.merge(documents)
}
