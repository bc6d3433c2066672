pub mod models;
pub mod predict;

use crate::model::ModelState;
use axum::Router;
use axum::routing::{get, post};
use models::get_models;
use predict::post_predict;

pub fn router(model: ModelState) -> Router {
    Router::new()
        .route("/models", get(get_models))
        .route("/models/predict", post(post_predict))
        .with_state(model)
}
