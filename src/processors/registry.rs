//! Processor construction from configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::clock::Clock;
use crate::flow::ProcessorConfig;
use crate::processors::error::ProcessorError;
use crate::processors::params::{ParamSpec, Params};
use crate::processors::{filter, generate_response, limiter, retry, Processor, FAILURE_CONDITION};
use crate::resources::Resources;

/// Everything a processor constructor receives.
#[derive(Debug, Clone)]
pub struct ProcessorMetadata {
    /// Processor key in the flow.
    pub name: String,
    /// Registered type name.
    pub processor: String,
    pub params: Params,
    pub metrics_labels: Vec<String>,
    pub clock: Arc<dyn Clock>,
    pub resources: Arc<Resources>,
}

pub type ProcessorFactory =
    Arc<dyn Fn(ProcessorMetadata) -> Result<Arc<dyn Processor>, ProcessorError> + Send + Sync>;

/// A processor type: its parameter schema, the conditions it can emit and its
/// constructor.
///
/// `conditions` of `None` accepts any label. The default (`""`) and `failure`
/// conditions are always accepted.
#[derive(Clone)]
pub struct ProcessorDefinition {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub conditions: Option<Vec<String>>,
    pub factory: ProcessorFactory,
}

impl ProcessorDefinition {
    pub fn new<F>(name: impl Into<String>, params: Vec<ParamSpec>, factory: F) -> Self
    where
        F: Fn(ProcessorMetadata) -> Result<Arc<dyn Processor>, ProcessorError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params,
            conditions: None,
            factory: Arc::new(factory),
        }
    }

    pub fn with_conditions(mut self, conditions: &[&str]) -> Self {
        self.conditions = Some(conditions.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Whether an edge may be labelled `condition` for this processor type.
    pub fn check_condition(&self, condition: &str) -> bool {
        if condition.is_empty() || condition == FAILURE_CONDITION {
            return true;
        }
        match &self.conditions {
            Some(conditions) => conditions.iter().any(|c| c == condition),
            None => true,
        }
    }
}

impl fmt::Debug for ProcessorDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorDefinition")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

/// Known processor types, looked up by name.
#[derive(Debug, Clone)]
pub struct ProcessorRegistry {
    definitions: HashMap<String, ProcessorDefinition>,
    clock: Arc<dyn Clock>,
}

impl ProcessorRegistry {
    /// Empty registry; processors built from it use `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            definitions: HashMap::new(),
            clock,
        }
    }

    /// Registry with `GenerateResponse`, `Retry`, `Limiter` and `Filter`.
    pub fn with_builtins(clock: Arc<dyn Clock>) -> Self {
        let mut registry = Self::new(clock);
        registry.register(generate_response::definition());
        registry.register(retry::definition());
        registry.register(limiter::definition());
        registry.register(filter::definition());
        registry
    }

    /// Register a type; replaces an existing definition with the same name.
    pub fn register(&mut self, definition: ProcessorDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn definition(&self, name: &str) -> Option<&ProcessorDefinition> {
        self.definitions.get(name)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Build the processor `key` from its configuration.
    pub fn create(
        &self,
        key: &str,
        config: &ProcessorConfig,
        resources: &Arc<Resources>,
    ) -> Result<Arc<dyn Processor>, ProcessorError> {
        let definition = self
            .definitions
            .get(&config.processor)
            .ok_or_else(|| ProcessorError::UnknownType(config.processor.clone()))?;

        let params = Params::resolve(key, &definition.params, &config.parameters)?;
        let metadata = ProcessorMetadata {
            name: key.to_string(),
            processor: config.processor.clone(),
            params,
            metrics_labels: config.metrics_labels.clone(),
            clock: self.clock.clone(),
            resources: resources.clone(),
        };

        tracing::debug!(processor = %key, kind = %config.processor, "Creating processor");
        (definition.factory)(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;

    fn registry() -> ProcessorRegistry {
        ProcessorRegistry::with_builtins(Arc::new(SystemClock))
    }

    #[test]
    fn test_unknown_type() {
        let err = registry()
            .create("x", &ProcessorConfig::new("Nope"), &Arc::new(Resources::new()))
            .unwrap_err();
        assert_eq!(err, ProcessorError::UnknownType("Nope".into()));
    }

    #[test]
    fn test_missing_required_param_fails_at_construction() {
        let err = registry()
            .create("retry1", &ProcessorConfig::new("Retry"), &Arc::new(Resources::new()))
            .unwrap_err();
        assert!(matches!(err, ProcessorError::MissingParam { param, processor } if param == "attempts" && processor == "retry1"));
    }

    #[test]
    fn test_builtin_created_with_key_as_name() {
        let processor = registry()
            .create(
                "reject",
                &ProcessorConfig::new("GenerateResponse").with_param("status", 429i64),
                &Arc::new(Resources::new()),
            )
            .unwrap();
        assert_eq!(processor.name(), "reject");
    }

    #[test]
    fn test_declared_conditions() {
        let registry = registry();
        let filter = registry.definition("Filter").unwrap();
        assert!(filter.check_condition("hit"));
        assert!(filter.check_condition("miss"));
        assert!(filter.check_condition(""));
        assert!(filter.check_condition("failure"));
        assert!(!filter.check_condition("hti"));

        let generate = registry.definition("GenerateResponse").unwrap();
        assert!(generate.check_condition(""));
        assert!(!generate.check_condition("hit"));
    }

    #[test]
    fn test_undeclared_conditions_accept_any_label() {
        let definition = ProcessorDefinition::new("Custom", Vec::new(), |_| {
            Err(ProcessorError::UnknownType("Custom".into()))
        });
        assert!(definition.check_condition("anything"));
    }

    #[test]
    fn test_builtins_registered() {
        let registry = registry();
        for name in ["GenerateResponse", "Retry", "Limiter", "Filter"] {
            assert!(registry.definition(name).is_some(), "{} missing", name);
        }
    }
}
