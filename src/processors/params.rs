//! Typed processor parameters.
//!
//! # Responsibilities
//! - Describe each processor type's parameters (name, kind, required, default)
//! - Validate raw configuration values against that description
//! - Offer typed accessors to processor constructors
//!
//! # Design Decisions
//! - Validation happens once, when the processor is built, never per request
//! - A single string is accepted where a list of strings is expected
//! - Parameters outside the schema are kept aside as `extra` (e.g. response headers)

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::processors::error::ProcessorError;

/// A raw parameter value as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::String(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::String(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Number(value as f64)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::List(value)
    }
}

impl From<BTreeMap<String, String>> for ParamValue {
    fn from(value: BTreeMap<String, String>) -> Self {
        ParamValue::Map(value)
    }
}

/// Expected shape of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
    StringList,
    Map,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
            ParamKind::StringList => "list of strings",
            ParamKind::Map => "map",
        };
        f.write_str(name)
    }
}

/// Declaration of one parameter accepted by a processor type.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ParamValue>,
}

impl ParamSpec {
    pub fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Parameters of one processor instance, validated against its specs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    processor: String,
    values: BTreeMap<String, ParamValue>,
    extra: BTreeMap<String, ParamValue>,
}

impl Params {
    /// Validate `raw` against `specs`, applying defaults.
    pub fn resolve(
        processor: &str,
        specs: &[ParamSpec],
        raw: &BTreeMap<String, ParamValue>,
    ) -> Result<Self, ProcessorError> {
        let mut values = BTreeMap::new();

        for spec in specs {
            match raw.get(spec.name) {
                Some(value) => {
                    let value = coerce(processor, spec, value)?;
                    values.insert(spec.name.to_string(), value);
                }
                None if spec.required => {
                    return Err(ProcessorError::MissingParam {
                        param: spec.name.to_string(),
                        processor: processor.to_string(),
                    });
                }
                None => {
                    if let Some(default) = &spec.default {
                        values.insert(spec.name.to_string(), default.clone());
                    }
                }
            }
        }

        let extra = raw
            .iter()
            .filter(|(name, _)| !specs.iter().any(|s| s.name == name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            processor: processor.to_string(),
            values,
            extra,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn opt_string(&self, name: &str) -> Option<String> {
        match self.values.get(name) {
            Some(ParamValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn string(&self, name: &str) -> Result<String, ProcessorError> {
        self.opt_string(name).ok_or_else(|| self.missing(name))
    }

    pub fn number(&self, name: &str) -> Result<f64, ProcessorError> {
        match self.values.get(name) {
            Some(ParamValue::Number(n)) => Ok(*n),
            _ => Err(self.missing(name)),
        }
    }

    /// Numeric parameter that must be a whole number.
    pub fn integer(&self, name: &str) -> Result<i64, ProcessorError> {
        let n = self.number(name)?;
        if n.fract() != 0.0 {
            return Err(ProcessorError::InvalidParam {
                param: name.to_string(),
                processor: self.processor.clone(),
                expected: ParamKind::Number,
            });
        }
        Ok(n as i64)
    }

    pub fn boolean(&self, name: &str) -> Result<bool, ProcessorError> {
        match self.values.get(name) {
            Some(ParamValue::Bool(b)) => Ok(*b),
            _ => Err(self.missing(name)),
        }
    }

    /// List parameter; empty when the parameter is absent.
    pub fn string_list(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(ParamValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Map parameter; empty when the parameter is absent.
    pub fn map(&self, name: &str) -> BTreeMap<String, String> {
        match self.values.get(name) {
            Some(ParamValue::Map(entries)) => entries.clone(),
            _ => BTreeMap::new(),
        }
    }

    /// Parameters not declared by the processor type.
    pub fn extra(&self) -> &BTreeMap<String, ParamValue> {
        &self.extra
    }

    fn missing(&self, name: &str) -> ProcessorError {
        ProcessorError::MissingParam {
            param: name.to_string(),
            processor: self.processor.clone(),
        }
    }
}

fn coerce(processor: &str, spec: &ParamSpec, value: &ParamValue) -> Result<ParamValue, ProcessorError> {
    let coerced = match (spec.kind, value) {
        (ParamKind::String, ParamValue::String(_))
        | (ParamKind::Number, ParamValue::Number(_))
        | (ParamKind::Boolean, ParamValue::Bool(_))
        | (ParamKind::StringList, ParamValue::List(_))
        | (ParamKind::Map, ParamValue::Map(_)) => Some(value.clone()),
        (ParamKind::StringList, ParamValue::String(s)) => Some(ParamValue::List(vec![s.clone()])),
        (ParamKind::Number, ParamValue::String(s)) => s.trim().parse::<f64>().ok().map(ParamValue::Number),
        _ => None,
    };

    coerced.ok_or_else(|| ProcessorError::InvalidParam {
        param: spec.name.to_string(),
        processor: processor.to_string(),
        expected: spec.kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_missing_required_param() {
        let specs = [ParamSpec::required("attempts", ParamKind::Number)];
        let err = Params::resolve("retry1", &specs, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "param attempts is required in processor retry1");
    }

    #[test]
    fn test_default_applied() {
        let specs = [ParamSpec::optional("status", ParamKind::Number).with_default(200i64)];
        let params = Params::resolve("gen", &specs, &BTreeMap::new()).unwrap();
        assert_eq!(params.integer("status").unwrap(), 200);
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let specs = [ParamSpec::required("attempts", ParamKind::Number)];
        let err = Params::resolve("retry1", &specs, &raw(&[("attempts", ParamValue::Bool(true))])).unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidParam { expected: ParamKind::Number, .. }));
    }

    #[test]
    fn test_single_string_becomes_list() {
        let specs = [ParamSpec::optional("method", ParamKind::StringList)];
        let params = Params::resolve("f", &specs, &raw(&[("method", "GET".into())])).unwrap();
        assert_eq!(params.string_list("method"), vec!["GET".to_string()]);
    }

    #[test]
    fn test_numeric_string_is_parsed() {
        let specs = [ParamSpec::required("limit", ParamKind::Number)];
        let params = Params::resolve("l", &specs, &raw(&[("limit", " 5 ".into())])).unwrap();
        assert_eq!(params.number("limit").unwrap(), 5.0);
    }

    #[test]
    fn test_extra_params_kept_aside() {
        let specs = [ParamSpec::optional("body", ParamKind::String)];
        let params = Params::resolve(
            "gen",
            &specs,
            &raw(&[("body", "hi".into()), ("Content-Type", "text/plain".into())]),
        )
        .unwrap();
        assert_eq!(params.string("body").unwrap(), "hi");
        assert_eq!(params.extra().len(), 1);
        assert!(params.extra().contains_key("Content-Type"));
    }

    #[test]
    fn test_integer_rejects_fraction() {
        let specs = [ParamSpec::required("attempts", ParamKind::Number)];
        let params = Params::resolve("r", &specs, &raw(&[("attempts", 1.5.into())])).unwrap();
        assert!(params.integer("attempts").is_err());
    }
}
