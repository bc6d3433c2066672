use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Shared, read-only handle on the classifier loaded at startup.
pub type ModelState = Arc<dyn Classifier>;

/// The single capability a loaded model exposes.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<i64, InferenceError>;

    fn kind(&self) -> &'static str;

    fn name(&self) -> Option<&str> {
        None
    }
}

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("model expects {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("model produced a non-finite score")]
    NonFiniteScore,
    #[error("model produced no prediction")]
    NoPrediction,
}

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("cannot decode model artifact: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("cannot read model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot load model artifact {}: {source}", path.display())]
    Artifact {
        path: PathBuf,
        source: ArtifactError,
    },
}

#[derive(Deserialize, Debug)]
pub struct Model {
    #[serde(default)]
    name: Option<String>,
    #[serde(flatten)]
    estimator: Estimator,
}

#[derive(Deserialize, Debug)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Estimator {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
}

impl Model {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Model::from_json(&contents).map_err(|source| LoadError::Artifact {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, ArtifactError> {
        let model: Model = serde_json::from_str(contents)?;
        match &model.estimator {
            Estimator::LogisticRegression(lr) => lr.validate()?,
            Estimator::RandomForest(forest) => forest.validate()?,
        }
        Ok(model)
    }
}

impl Classifier for Model {
    fn predict(&self, features: &[f64]) -> Result<i64, InferenceError> {
        match &self.estimator {
            Estimator::LogisticRegression(lr) => lr.predict(features),
            Estimator::RandomForest(forest) => forest.predict(features),
        }
    }

    fn kind(&self) -> &'static str {
        match self.estimator {
            Estimator::LogisticRegression(_) => "logistic_regression",
            Estimator::RandomForest(_) => "random_forest",
        }
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn check_shape(expected: usize, features: &[f64]) -> Result<(), InferenceError> {
    if features.len() != expected {
        return Err(InferenceError::ShapeMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}

fn default_threshold() -> f64 {
    0.5
}

/// Binary classifier: predicts `1` when `sigmoid(w·x + b) >= threshold`.
#[derive(Deserialize, Debug)]
struct LogisticRegression {
    weights: Vec<f64>,
    intercept: f64,
    #[serde(default = "default_threshold")]
    threshold: f64,
}

impl LogisticRegression {
    fn validate(&self) -> Result<(), ArtifactError> {
        if self.weights.is_empty() {
            return Err(ArtifactError::Invalid("weights cannot be empty".to_string()));
        }
        if !self.weights.iter().all(|w| w.is_finite()) || !self.intercept.is_finite() {
            return Err(ArtifactError::Invalid(
                "weights and intercept must be finite".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ArtifactError::Invalid(format!(
                "threshold must be between 0 and 1 (got {})",
                self.threshold
            )));
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<i64, InferenceError> {
        check_shape(self.weights.len(), features)?;
        let z = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        let probability = 1.0 / (1.0 + (-z).exp());
        if !probability.is_finite() {
            return Err(InferenceError::NonFiniteScore);
        }
        Ok(i64::from(probability >= self.threshold))
    }
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Node {
    Leaf {
        leaf: i64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Majority vote over decision trees stored as flat node arrays.
///
/// Every tree is rooted at index 0 and each child index is strictly greater
/// than its parent's, so a walk always terminates on a leaf.
#[derive(Deserialize, Debug)]
struct RandomForest {
    n_features: usize,
    trees: Vec<Vec<Node>>,
}

impl RandomForest {
    fn validate(&self) -> Result<(), ArtifactError> {
        if self.n_features == 0 {
            return Err(ArtifactError::Invalid("n_features must be positive".to_string()));
        }
        if self.trees.is_empty() {
            return Err(ArtifactError::Invalid("forest has no trees".to_string()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.is_empty() {
                return Err(ArtifactError::Invalid(format!("tree {} is empty", t)));
            }
            for (i, node) in tree.iter().enumerate() {
                let Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } = node
                else {
                    continue;
                };
                if *feature >= self.n_features {
                    return Err(ArtifactError::Invalid(format!(
                        "tree {} node {} splits on feature {} but the forest has {} features",
                        t, i, feature, self.n_features
                    )));
                }
                if !threshold.is_finite() {
                    return Err(ArtifactError::Invalid(format!(
                        "tree {} node {} has a non-finite threshold",
                        t, i
                    )));
                }
                for child in [*left, *right] {
                    if child <= i || child >= tree.len() {
                        return Err(ArtifactError::Invalid(format!(
                            "tree {} node {} points to invalid child {}",
                            t, i, child
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict(&self, features: &[f64]) -> Result<i64, InferenceError> {
        check_shape(self.n_features, features)?;
        let mut votes: BTreeMap<i64, usize> = BTreeMap::new();
        for tree in &self.trees {
            *votes.entry(Self::walk(tree, features)).or_insert(0) += 1;
        }
        // Ascending iteration plus a strict comparison keeps the smallest label on ties.
        let mut winner = None;
        for (label, count) in votes {
            match winner {
                Some((_, best)) if count <= best => {}
                _ => winner = Some((label, count)),
            }
        }
        winner
            .map(|(label, _)| label)
            .ok_or(InferenceError::NoPrediction)
    }

    fn walk(tree: &[Node], features: &[f64]) -> i64 {
        let mut index = 0;
        loop {
            match &tree[index] {
                Node::Leaf { leaf } => return *leaf,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}
