//! Route assembly.

use axum::{routing::get, Router};

use crate::handlers::{self, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/files/:id",
            get(handlers::get_file).delete(handlers::delete_file),
        )
        .route("/files/:id/content", get(handlers::download_file))
        .route(
            "/owners/:kind/:owner_id/files",
            get(handlers::list_files).post(handlers::upload_file),
        )
        .with_state(state)
}
