//! Dependency and validation providers.
//!
//! The engine needs two capabilities from its host: resolving service instances
//! (for service-injected parameters and filter construction) and validating bound
//! values. Both are traits so hosts can plug in their own container or validator.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::schema::ParameterSpec;
use crate::value::Value;
use crate::State;

type Instance = Arc<dyn Any + Send + Sync>;

/// Resolves service instances by type, optionally keyed.
pub trait ServiceProvider: Send + Sync {
    fn resolve(&self, type_id: TypeId) -> Option<Instance>;

    fn resolve_keyed(&self, type_id: TypeId, key: &str) -> Option<Instance> {
        let _ = (type_id, key);
        None
    }
}

impl<'a> dyn ServiceProvider + 'a {
    /// Typed lookup.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<State<T>> {
        self.resolve(TypeId::of::<T>())
            .and_then(|instance| instance.downcast::<T>().ok())
            .map(State::from_arc)
    }

    /// Typed keyed lookup.
    pub fn get_keyed<T: Any + Send + Sync>(&self, key: &str) -> Option<State<T>> {
        self.resolve_keyed(TypeId::of::<T>(), key)
            .and_then(|instance| instance.downcast::<T>().ok())
            .map(State::from_arc)
    }
}

/// Simple type-indexed service map.
///
/// # Example
///
/// ```
/// use verbs::{ServiceProvider, Services};
///
/// struct Db { url: String }
///
/// let services = Services::new().insert(Db { url: "sqlite::memory:".into() });
/// let provider: &dyn ServiceProvider = &services;
/// assert_eq!(provider.get::<Db>().unwrap().get().url, "sqlite::memory:");
/// ```
#[derive(Clone, Default)]
pub struct Services {
    entries: HashMap<(TypeId, Option<String>), Instance>,
}

impl Services {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.entries
            .insert((TypeId::of::<T>(), None), Arc::new(value));
        self
    }

    pub fn insert_keyed<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.entries
            .insert((TypeId::of::<T>(), Some(key.into())), Arc::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ServiceProvider for Services {
    fn resolve(&self, type_id: TypeId) -> Option<Instance> {
        self.entries.get(&(type_id, None)).cloned()
    }

    fn resolve_keyed(&self, type_id: TypeId, key: &str) -> Option<Instance> {
        self.entries
            .get(&(type_id, Some(key.to_string())))
            .cloned()
    }
}

/// Validates one bound value; returns an empty list when the value is valid.
pub trait ValidationProvider: Send + Sync {
    fn validate(&self, parameter: &ParameterSpec, value: &Value) -> Vec<String>;
}

/// Runs the [`ValidationRule`](crate::ValidationRule)s attached to each parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleValidator;

impl ValidationProvider for RuleValidator {
    fn validate(&self, parameter: &ParameterSpec, value: &Value) -> Vec<String> {
        parameter
            .rules()
            .iter()
            .filter_map(|rule| rule.check(value).err())
            .map(|message| {
                format!(
                    "{} ({}): {}",
                    parameter.display_name(),
                    value,
                    message
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValidationRule;

    #[derive(Debug, PartialEq)]
    struct Config {
        name: &'static str,
    }

    #[test]
    fn test_services_resolve_by_type() {
        let services = Services::new().insert(Config { name: "main" });
        let provider: &dyn ServiceProvider = &services;

        let config = provider.get::<Config>().expect("registered");
        assert_eq!(config.get().name, "main");
        assert!(provider.get::<String>().is_none());
    }

    #[test]
    fn test_services_resolve_keyed() {
        let services = Services::new()
            .insert_keyed("primary", Config { name: "a" })
            .insert_keyed("replica", Config { name: "b" });
        let provider: &dyn ServiceProvider = &services;

        assert_eq!(provider.get_keyed::<Config>("replica").unwrap().get().name, "b");
        assert!(provider.get::<Config>().is_none());
        assert_eq!(services.len(), 2);
    }

    #[test]
    fn test_rule_validator_names_flag_and_value() {
        let param = ParameterSpec::of::<i32>("age").rule(ValidationRule::range(0.0, 150.0));
        let messages = RuleValidator.validate(&param, &Value::Int(200));
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("--age"));
        assert!(messages[0].contains("200"));

        assert!(RuleValidator.validate(&param, &Value::Int(20)).is_empty());
    }
}
