use crate::app_error::{AppError, ParseError};
use crate::features::PredictionRequest;
use crate::model::ModelState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResponse {
    prediction_outcome: i64,
    input_features: Value,
}

pub async fn post_predict(
    State(model): State<ModelState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PredictionResponse>, AppError> {
    let Json(payload) = payload.map_err(ParseError::from)?;
    let Value::Object(fields) = &payload else {
        return Err(ParseError::NotAnObject.into());
    };

    let request = PredictionRequest::try_from(fields)?;
    let prediction_outcome = model.predict(&request.to_array())?;
    debug!("Predicted {} for {:?}", prediction_outcome, request);

    Ok(Json(PredictionResponse {
        prediction_outcome,
        input_features: payload,
    }))
}

#[cfg(test)]
mod tests {
    use crate::controllers::router;
    use crate::model::{Classifier, InferenceError, Model, ModelState};
    use reqwest::StatusCode;
    use reqwest::header::CONTENT_TYPE;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    struct FixedClassifier {
        outcome: i64,
        calls: AtomicUsize,
    }

    impl FixedClassifier {
        fn new(outcome: i64) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Classifier for FixedClassifier {
        fn predict(&self, features: &[f64]) -> Result<i64, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(features.len(), 8);
            Ok(self.outcome)
        }

        fn kind(&self) -> &'static str {
            "fixed"
        }
    }

    async fn serve(model: ModelState) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(model)).await.unwrap();
        });
        format!("http://{}/models/predict", addr)
    }

    fn sample() -> Value {
        json!({
            "pregnancies": 2,
            "glucose": 120,
            "blood_pressure": 70,
            "skin_thickness": 20,
            "insulin": 85,
            "bmi": 25.5,
            "diabetes_pedigree_function": 0.5,
            "age": 33
        })
    }

    #[tokio::test]
    async fn returns_outcome_and_echoes_input() {
        let model = FixedClassifier::new(1);
        let url = serve(model.clone()).await;

        let response = reqwest::Client::new()
            .post(&url)
            .json(&sample())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(
            body,
            json!({"predictionOutcome": 1, "inputFeatures": sample()})
        );
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn echo_is_verbatim_including_extra_and_string_fields() {
        let url = serve(FixedClassifier::new(0)).await;
        let mut input = sample();
        input["glucose"] = json!("148");
        input["patient_id"] = json!("abc-123");

        let response = reqwest::Client::new()
            .post(&url)
            .json(&input)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["predictionOutcome"], json!(0));
        assert_eq!(body["inputFeatures"], input);
    }

    #[tokio::test]
    async fn missing_field_is_a_client_error_and_skips_the_model() {
        let model = FixedClassifier::new(1);
        let url = serve(model.clone()).await;
        let client = reqwest::Client::new();

        for name in crate::features::FEATURE_NAMES {
            let mut input = sample();
            input.as_object_mut().unwrap().remove(name);

            let response = client.post(&url).json(&input).send().await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            let body: Value = response.json().await.unwrap();
            assert_eq!(body["error"], json!("validation_error"));
            assert!(body["message"].as_str().unwrap().contains(name));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn non_numeric_field_is_a_client_error() {
        let model = FixedClassifier::new(1);
        let url = serve(model.clone()).await;
        let mut input = sample();
        input["bmi"] = json!("heavy");

        let response = reqwest::Client::new()
            .post(&url)
            .json(&input)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], json!("validation_error"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let model = FixedClassifier::new(1);
        let url = serve(model.clone()).await;
        let client = reqwest::Client::new();

        for body in [r#"{"glucose": 120,"#, "[1, 2, 3]", "42", ""] {
            let response = client
                .post(&url)
                .header(CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await
                .unwrap();
            assert!(
                response.status().is_client_error(),
                "{} for {:?}",
                response.status(),
                body
            );
            let error: Value = response.json().await.unwrap();
            assert_eq!(error["error"], json!("parse_error"));
        }
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn missing_content_type_is_a_client_error() {
        let url = serve(FixedClassifier::new(1)).await;

        let response = reqwest::Client::new()
            .post(&url)
            .body(sample().to_string())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_server_error() {
        let model = Model::from_json(
            r#"{"kind": "logistic_regression", "weights": [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7], "intercept": 0.0}"#,
        )
        .unwrap();
        let url = serve(Arc::new(model)).await;

        let response = reqwest::Client::new()
            .post(&url)
            .json(&sample())
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], json!("inference_error"));
    }

    #[tokio::test]
    async fn concurrent_identical_requests_get_identical_responses() {
        let model = FixedClassifier::new(1);
        let url = serve(model.clone()).await;
        let client = reqwest::Client::new();

        let requests = (0..32).map(|_| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response = client.post(&url).json(&sample()).send().await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                response.json::<Value>().await.unwrap()
            }
        });
        let bodies = futures::future::join_all(requests).await;

        let expected = json!({"predictionOutcome": 1, "inputFeatures": sample()});
        assert!(bodies.iter().all(|body| *body == expected));
        assert_eq!(model.calls(), 32);
    }
}
