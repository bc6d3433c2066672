use serde_json::{Map, Value};
use thiserror::Error;

/// Input attributes in the order the model was trained on.
pub const FEATURE_NAMES: [&str; 8] = [
    "pregnancies",
    "glucose",
    "blood_pressure",
    "skin_thickness",
    "insulin",
    "bmi",
    "diabetes_pedigree_function",
    "age",
];

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not a number")]
    NotNumeric(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub pregnancies: f64,
    pub glucose: f64,
    pub blood_pressure: f64,
    pub skin_thickness: f64,
    pub insulin: f64,
    pub bmi: f64,
    pub diabetes_pedigree_function: f64,
    pub age: f64,
}

impl PredictionRequest {
    pub fn to_array(&self) -> [f64; 8] {
        [
            self.pregnancies,
            self.glucose,
            self.blood_pressure,
            self.skin_thickness,
            self.insulin,
            self.bmi,
            self.diabetes_pedigree_function,
            self.age,
        ]
    }
}

impl TryFrom<&Map<String, Value>> for PredictionRequest {
    type Error = ValidationError;

    fn try_from(fields: &Map<String, Value>) -> Result<Self, Self::Error> {
        let [
            pregnancies,
            glucose,
            blood_pressure,
            skin_thickness,
            insulin,
            bmi,
            diabetes_pedigree_function,
            age,
        ] = FEATURE_NAMES;

        Ok(Self {
            pregnancies: numeric_field(fields, pregnancies)?,
            glucose: numeric_field(fields, glucose)?,
            blood_pressure: numeric_field(fields, blood_pressure)?,
            skin_thickness: numeric_field(fields, skin_thickness)?,
            insulin: numeric_field(fields, insulin)?,
            bmi: numeric_field(fields, bmi)?,
            diabetes_pedigree_function: numeric_field(fields, diabetes_pedigree_function)?,
            age: numeric_field(fields, age)?,
        })
    }
}

fn numeric_field(fields: &Map<String, Value>, name: &'static str) -> Result<f64, ValidationError> {
    let value = fields.get(name).ok_or(ValidationError::MissingField(name))?;
    coerce(value).ok_or(ValidationError::NotNumeric(name))
}

/// JSON numbers pass through; strings are accepted when they hold a finite float.
fn coerce(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}
