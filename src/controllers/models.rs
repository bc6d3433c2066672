use crate::features::FEATURE_NAMES;
use crate::model::ModelState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ModelDescription {
    name: Option<String>,
    kind: String,
    features: Vec<String>,
}

impl ModelDescription {
    fn new(name: Option<&str>, kind: impl ToString) -> Self {
        Self {
            name: name.map(str::to_string),
            kind: kind.to_string(),
            features: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

pub async fn get_models(State(model): State<ModelState>) -> Json<ModelDescription> {
    Json(ModelDescription::new(model.name(), model.kind()))
}
