//! Declared, validated input fields for transitions.
//!
//! A transition names its inputs as [`FieldSpec`]s; [`FieldValues::validate`]
//! checks a flat JSON mapping against them and either fully succeeds or
//! fails with one [`TransitionDataError`] carrying *every* field problem at
//! once. Keys the specs don't declare are ignored — the declared values are
//! what a transition stores as context by default.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::TransitionDataError;

/// Value shape and constraints of one declared field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text { max_length: Option<usize> },
    Integer { min: Option<i64>, max: Option<i64> },
    Float { min: Option<f64>, max: Option<f64> },
    Boolean,
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } => "text",
            FieldKind::Integer { .. } => "an integer",
            FieldKind::Float { .. } => "a number",
            FieldKind::Boolean => "a boolean",
        }
    }
}

/// One declared transition input.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Text { max_length: None },
            required: false,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Integer {
                min: None,
                max: None,
            },
            required: false,
        }
    }

    pub const fn float(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Float {
                min: None,
                max: None,
            },
            required: false,
        }
    }

    pub const fn boolean(name: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::Boolean,
            required: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Validated values for a transition's declared fields.
///
/// Only declared, present, type-checked values live here; absent optional
/// fields are simply missing.
#[derive(Debug, Clone, Default)]
pub struct FieldValues {
    values: Map<String, Value>,
}

impl FieldValues {
    /// Check `data` against `specs`, collecting every problem.
    pub fn validate(
        transition: &str,
        specs: &[FieldSpec],
        data: &Map<String, Value>,
    ) -> Result<Self, TransitionDataError> {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut values = Map::new();

        for spec in specs {
            let raw = match data.get(spec.name) {
                None | Some(Value::Null) => {
                    if spec.required {
                        errors
                            .entry(spec.name.to_string())
                            .or_default()
                            .push("this field is required".to_string());
                    }
                    continue;
                }
                Some(v) => v,
            };

            let field_errors = errors.entry(spec.name.to_string()).or_default();
            match &spec.kind {
                FieldKind::Text { max_length } => match raw.as_str() {
                    Some(s) => {
                        if let Some(max) = max_length
                            && s.chars().count() > *max
                        {
                            field_errors.push(format!("must be at most {max} characters"));
                        }
                    }
                    None => field_errors.push(format!("expected {}", spec.kind.expected())),
                },
                FieldKind::Integer { min, max } => match raw.as_i64() {
                    Some(n) => {
                        if let Some(min) = min
                            && n < *min
                        {
                            field_errors.push(format!("must be at least {min}"));
                        }
                        if let Some(max) = max
                            && n > *max
                        {
                            field_errors.push(format!("must be at most {max}"));
                        }
                    }
                    None => field_errors.push(format!("expected {}", spec.kind.expected())),
                },
                FieldKind::Float { min, max } => match raw.as_f64() {
                    Some(x) => {
                        if let Some(min) = min
                            && x < *min
                        {
                            field_errors.push(format!("must be at least {min}"));
                        }
                        if let Some(max) = max
                            && x > *max
                        {
                            field_errors.push(format!("must be at most {max}"));
                        }
                    }
                    None => field_errors.push(format!("expected {}", spec.kind.expected())),
                },
                FieldKind::Boolean => {
                    if raw.as_bool().is_none() {
                        field_errors.push(format!("expected {}", spec.kind.expected()));
                    }
                }
            }

            if field_errors.is_empty() {
                values.insert(spec.name.to_string(), raw.clone());
            }
        }

        errors.retain(|_, problems| !problems.is_empty());
        if errors.is_empty() {
            Ok(Self { values })
        } else {
            Err(TransitionDataError::new(transition, errors))
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The validated values as a context mapping — the default
    /// `context_data` of a transition.
    pub fn to_context(&self) -> Map<String, Value> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    const SPECS: &[FieldSpec] = &[
        FieldSpec::text("note"),
        FieldSpec {
            name: "score",
            kind: FieldKind::Float {
                min: Some(0.0),
                max: Some(1.0),
            },
            required: false,
        },
        FieldSpec::integer("attempts").required(),
    ];

    #[test]
    fn test_valid_data_passes() {
        let values = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"note": "ok", "score": 0.5, "attempts": 2})),
        )
        .unwrap();
        assert_eq!(values.get_str("note"), Some("ok"));
        assert_eq!(values.get_f64("score"), Some(0.5));
        assert_eq!(values.get_i64("attempts"), Some(2));
    }

    #[test]
    fn test_every_problem_is_reported_at_once() {
        let err = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"note": 7, "score": 3.5})),
        )
        .unwrap_err();
        assert_eq!(err.transition, "complete");
        assert_eq!(err.errors.len(), 3);
        assert!(err.errors["note"][0].contains("expected text"));
        assert!(err.errors["score"][0].contains("at most 1"));
        assert!(err.errors["attempts"][0].contains("required"));
    }

    #[test]
    fn test_missing_optional_fields_are_fine() {
        let values =
            FieldValues::validate("complete", SPECS, &data(json!({"attempts": 0}))).unwrap();
        assert_eq!(values.get("note"), None);
        assert_eq!(values.get("score"), None);
    }

    #[test]
    fn test_null_counts_as_absent() {
        let err = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"attempts": null})),
        )
        .unwrap_err();
        assert!(err.errors["attempts"][0].contains("required"));
    }

    #[test]
    fn test_integer_rejects_fractional_numbers() {
        let err = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"attempts": 1.5})),
        )
        .unwrap_err();
        assert!(err.errors["attempts"][0].contains("expected an integer"));
    }

    #[test]
    fn test_undeclared_keys_are_ignored() {
        let values = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"attempts": 1, "mystery": true})),
        )
        .unwrap();
        assert_eq!(values.get("mystery"), None);
    }

    #[test]
    fn test_text_max_length() {
        let specs = &[FieldSpec {
            name: "note",
            kind: FieldKind::Text {
                max_length: Some(3),
            },
            required: false,
        }];
        let err =
            FieldValues::validate("discard", specs, &data(json!({"note": "toolong"}))).unwrap_err();
        assert!(err.errors["note"][0].contains("at most 3 characters"));
    }

    #[test]
    fn test_context_is_declared_values_only() {
        let values = FieldValues::validate(
            "complete",
            SPECS,
            &data(json!({"attempts": 1, "score": 0.25})),
        )
        .unwrap();
        let context = values.to_context();
        assert_eq!(context.len(), 2);
        assert_eq!(context["score"], json!(0.25));
    }
}
