//! Axum router wiring.

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::api::{update, value};
use crate::snapshot::{schedule, Snapshotter};
use crate::{app_state::AppState, ops};

/// Build the HTTP surface. `sync_saver` is set in sync save mode: every
/// successful update is followed by a snapshot save.
pub fn build_router(state: AppState, sync_saver: Option<Arc<Snapshotter>>) -> Router {
    let router = Router::new()
        .route("/update/:kind/:name/:value", post(update::by_path))
        .route("/update", post(update::by_json))
        .route("/update/", post(update::by_json))
        .route("/updates", post(update::batch))
        .route("/updates/", post(update::batch))
        .route("/value/:kind/:name", get(value::by_path))
        .route("/value", post(value::by_json))
        .route("/value/", post(value::by_json))
        .route("/ping", get(ops::ping))
        .route("/healthz", get(ops::healthz))
        .with_state(state);

    match sync_saver {
        Some(snapshotter) => router.layer(middleware::from_fn_with_state(
            snapshotter,
            schedule::save_after_update,
        )),
        None => router,
    }
}
