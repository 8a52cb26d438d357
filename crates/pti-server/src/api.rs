use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::ImageDb;
use crate::storage::Storage;

mod docs;
mod error;
mod images;

pub use docs::ApiDoc;
pub use error::{ApiError, ErrorResponse};
pub use images::UploadResponse;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub db: Arc<Mutex<ImageDb>>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Lock the record store. Never hold the guard across an `.await`.
    fn db(&self) -> MutexGuard<'_, ImageDb> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build the HTTP router. Serve it with
/// `into_make_service_with_connect_info::<SocketAddr>()` so uploads can
/// record the peer address.
pub fn router<S: Storage>(storage: S, db: ImageDb, config: Config) -> Router {
    let body_limit = config.max_upload_size;
    let state = AppState {
        storage: Arc::new(storage),
        db: Arc::new(Mutex::new(db)),
        config: Arc::new(config),
    };

    Router::new()
        .merge(images::router())
        .with_state(state)
        .merge(docs::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
}
