//! Command schema model.
//!
//! A [`CommandSchema`] describes one invocable command: its name (a sub-command path),
//! its parameters, its filters and its help text. Schemas are produced by the
//! [`Command`] builder, checked once when the registry is built, and never change
//! afterwards.
//!
//! # Example
//!
//! ```
//! use verbs::{Command, ParameterSpec};
//!
//! let cmd = Command::new("db migrate")
//!     .description("Apply pending migrations")
//!     .param(ParameterSpec::of::<String>("target").positional())
//!     .param(ParameterSpec::of::<bool>("dryRun").alias("n"))
//!     .handler_sync(|_inv| 0i32);
//!
//! assert_eq!(cmd.schema().name(), "db migrate");
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, SchemaError};
use crate::filter::{FilterSpec, Invocation};
use crate::response::{IntoResponse, Response};
use crate::value::{ArgValue, Value};

/// Option names the engine handles itself.
pub const RESERVED_FLAGS: &[&str] = &["-h", "--help", "--version"];

/// Command names the engine handles itself.
pub const RESERVED_COMMANDS: &[&str] = &["help", "version"];

// ============================================================================
// Parameter Types
// ============================================================================

/// Native numeric kinds a parameter can be parsed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl NumericKind {
    pub fn name(&self) -> &'static str {
        match self {
            NumericKind::I8 => "i8",
            NumericKind::I16 => "i16",
            NumericKind::I32 => "i32",
            NumericKind::I64 => "i64",
            NumericKind::U8 => "u8",
            NumericKind::U16 => "u16",
            NumericKind::U32 => "u32",
            NumericKind::U64 => "u64",
            NumericKind::F32 => "f32",
            NumericKind::F64 => "f64",
        }
    }
}

/// Named set of enum variants, matched case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: String,
    pub variants: Vec<String>,
}

impl EnumInfo {
    pub fn new(name: impl Into<String>, variants: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Find the declared spelling of `raw`.
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        self.variants
            .iter()
            .find(|v| v.eq_ignore_ascii_case(raw))
            .map(String::as_str)
    }
}

type ParseFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Parser attached to a custom-parsed parameter.
#[derive(Clone)]
pub struct CustomParser {
    type_name: String,
    parse: Arc<ParseFn>,
}

impl CustomParser {
    pub fn new<F>(type_name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.into(),
            parse: Arc::new(parse),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for CustomParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomParser")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Identifies a service in the dependency provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub key: Option<String>,
}

impl ServiceKey {
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            key: None,
        }
    }
}

/// Semantic type of a parameter.
#[derive(Debug, Clone)]
pub enum ParamType {
    String,
    Bool,
    Numeric(NumericKind),
    Char,
    DateTime,
    Enum(EnumInfo),
    Array(Box<ParamType>),
    Nullable(Box<ParamType>),
    Custom(CustomParser),
    /// Anything else: parsed as JSON. The string names the type for help output.
    Json(String),
    /// Receives the invocation context; never read from argv.
    Context,
    /// Resolved from the dependency provider; never read from argv.
    Service(ServiceKey),
    /// Receives the run's cancellation token; never read from argv.
    Cancellation,
}

impl ParamType {
    pub fn array(element: ParamType) -> Self {
        ParamType::Array(Box::new(element))
    }

    pub fn nullable(inner: ParamType) -> Self {
        ParamType::Nullable(Box::new(inner))
    }

    pub fn enumeration(
        name: impl Into<String>,
        variants: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        ParamType::Enum(EnumInfo::new(name, variants))
    }

    pub fn custom<F>(type_name: impl Into<String>, parse: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        ParamType::Custom(CustomParser::new(type_name, parse))
    }

    pub fn json(type_name: impl Into<String>) -> Self {
        ParamType::Json(type_name.into())
    }

    /// Context, service and cancellation parameters are filled by the dispatcher.
    pub fn is_injected(&self) -> bool {
        matches!(
            self,
            ParamType::Context | ParamType::Service(_) | ParamType::Cancellation
        )
    }

    /// Plain booleans are switches: present means true.
    pub fn is_switch(&self) -> bool {
        matches!(self, ParamType::Bool)
    }

    pub fn element(&self) -> Option<&ParamType> {
        match self {
            ParamType::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Name shown between angle brackets in help output.
    pub fn display_name(&self) -> String {
        match self {
            ParamType::String => "string".to_string(),
            ParamType::Bool => "bool".to_string(),
            ParamType::Numeric(kind) => kind.name().to_string(),
            ParamType::Char => "char".to_string(),
            ParamType::DateTime => "datetime".to_string(),
            ParamType::Enum(info) => info.name.clone(),
            ParamType::Array(elem) => format!("{}[]", elem.display_name()),
            ParamType::Nullable(inner) => format!("{}?", inner.display_name()),
            ParamType::Custom(parser) => parser.type_name().to_string(),
            ParamType::Json(name) => name.clone(),
            ParamType::Context => "context".to_string(),
            ParamType::Service(key) => key.type_name.to_string(),
            ParamType::Cancellation => "cancellation".to_string(),
        }
    }
}

// ============================================================================
// Validation Rules
// ============================================================================

type RuleFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// Predicate checked against a bound value before the command runs.
#[derive(Clone)]
pub struct ValidationRule {
    description: String,
    check: Arc<RuleFn>,
}

impl ValidationRule {
    pub fn custom<F>(description: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            check: Arc::new(check),
        }
    }

    /// Numeric value (or every numeric element) must lie in `min..=max`.
    pub fn range(min: f64, max: f64) -> Self {
        Self::custom(format!("range {}..={}", min, max), move |value| {
            check_each(value, &|v| match v.as_f64() {
                Some(n) if n >= min && n <= max => Ok(()),
                Some(_) => Err(format!("The field must be between {} and {}.", min, max)),
                None => Err("The field must be a number.".to_string()),
            })
        })
    }

    /// Strings count characters, arrays count elements.
    pub fn min_length(min: usize) -> Self {
        Self::custom(format!("min length {}", min), move |value| match value.length() {
            Some(len) if len < min => Err(format!("The field must have a minimum length of {}.", min)),
            _ => Ok(()),
        })
    }

    pub fn max_length(max: usize) -> Self {
        Self::custom(format!("max length {}", max), move |value| match value.length() {
            Some(len) if len > max => Err(format!("The field must have a maximum length of {}.", max)),
            _ => Ok(()),
        })
    }

    pub fn one_of(allowed: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let allowed: Vec<String> = allowed.into_iter().map(Into::into).collect();
        Self::custom(format!("one of {}", allowed.join("|")), move |value| {
            check_each(value, &|v| {
                let text = v.to_string();
                if allowed.iter().any(|a| a == &text) {
                    Ok(())
                } else {
                    Err(format!("The field must be one of: {}.", allowed.join(", ")))
                }
            })
        })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn check(&self, value: &Value) -> Result<(), String> {
        (self.check)(value)
    }
}

impl fmt::Debug for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ValidationRule")
            .field(&self.description)
            .finish()
    }
}

// Null (an unset nullable) always passes; arrays are checked element-wise.
fn check_each(value: &Value, check: &dyn Fn(&Value) -> Result<(), String>) -> Result<(), String> {
    match value {
        Value::Null => Ok(()),
        Value::Array(items) => items.iter().try_for_each(|item| check_each(item, check)),
        other => check(other),
    }
}

// ============================================================================
// Parameter Spec
// ============================================================================

/// One bindable parameter of a command.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    identifier: String,
    canonical_name: String,
    aliases: Vec<String>,
    ty: ParamType,
    default_value: Option<Value>,
    positional: bool,
    positional_index: i32,
    params_array: bool,
    description: String,
    hidden: bool,
    rules: Vec<ValidationRule>,
}

impl ParameterSpec {
    /// Create a named parameter. `identifier` is converted into the canonical
    /// option name when the registry is built (see [`NameConversion`]).
    pub fn new(identifier: impl Into<String>, ty: ParamType) -> Self {
        let identifier = identifier.into();
        Self {
            canonical_name: identifier.clone(),
            identifier,
            aliases: Vec::new(),
            ty,
            default_value: None,
            positional: false,
            positional_index: -1,
            params_array: false,
            description: String::new(),
            hidden: false,
            rules: Vec::new(),
        }
    }

    /// Create a parameter whose type follows the Rust type `T`.
    pub fn of<T: ArgValue>(identifier: impl Into<String>) -> Self {
        Self::new(identifier, T::param_type())
    }

    pub fn context(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ParamType::Context)
    }

    pub fn cancellation(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ParamType::Cancellation)
    }

    pub fn service<T: Any + Send + Sync>(identifier: impl Into<String>) -> Self {
        Self::new(identifier, ParamType::Service(ServiceKey::of::<T>()))
    }

    pub fn keyed_service<T: Any + Send + Sync>(
        identifier: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let mut service = ServiceKey::of::<T>();
        service.key = Some(key.into());
        Self::new(identifier, ParamType::Service(service))
    }

    /// Add an alternate flag. `"v"` becomes `-v`, `"verbose"` becomes `--verbose`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        let alias = if alias.starts_with('-') {
            alias
        } else if alias.chars().count() == 1 {
            format!("-{}", alias)
        } else {
            format!("--{}", alias)
        };
        self.aliases.push(alias);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Shorthand for a `null` default, typically on nullable parameters.
    pub fn optional(self) -> Self {
        self.default(Value::Null)
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    /// Variadic tail: consumes every remaining token of its occurrence.
    pub fn params(mut self) -> Self {
        self.params_array = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn param_type(&self) -> &ParamType {
        &self.ty
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_ref()
    }

    pub fn has_default_value(&self) -> bool {
        self.default_value.is_some()
    }

    pub fn is_positional(&self) -> bool {
        self.positional
    }

    /// Index among positional parameters, or -1.
    pub fn positional_index(&self) -> i32 {
        self.positional_index
    }

    pub fn is_params_array(&self) -> bool {
        self.params_array
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn doc(&self) -> &str {
        &self.description
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn has_validation(&self) -> bool {
        !self.rules.is_empty()
    }

    pub fn is_injected(&self) -> bool {
        self.ty.is_injected()
    }

    /// True unless the parameter has a default, is a params array or is a switch.
    pub fn requires_explicit_binding(&self) -> bool {
        !(self.is_injected()
            || self.has_default_value()
            || self.params_array
            || self.ty.is_switch())
    }

    /// Every spelling that selects this parameter on the command line.
    pub fn flag_names(&self) -> impl Iterator<Item = String> + '_ {
        let long = (!self.positional && !self.is_injected())
            .then(|| format!("--{}", self.canonical_name));
        let aliases = self
            .aliases
            .iter()
            .filter(move |_| !self.positional && !self.is_injected())
            .cloned();
        long.into_iter().chain(aliases)
    }

    /// Name used in error messages.
    pub fn display_name(&self) -> String {
        if self.positional {
            self.canonical_name.clone()
        } else {
            format!("--{}", self.canonical_name)
        }
    }

    pub(crate) fn matches_name(&self, name: &str) -> bool {
        self.canonical_name == name || self.identifier == name
    }
}

// ============================================================================
// Naming
// ============================================================================

/// How source identifiers become option names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NameConversion {
    /// `maxCount` and `max_count` become `max-count`.
    #[default]
    KebabCase,
    /// Identifiers are used verbatim.
    None,
}

impl NameConversion {
    pub fn apply(&self, identifier: &str) -> String {
        match self {
            NameConversion::KebabCase => to_kebab_case(identifier),
            NameConversion::None => identifier.to_string(),
        }
    }
}

pub fn to_kebab_case(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let mut out = String::with_capacity(identifier.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            continue;
        }

        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out.trim_end_matches('-').to_string()
}

// ============================================================================
// Command Schema
// ============================================================================

/// Immutable description of one command.
#[derive(Debug, Clone)]
pub struct CommandSchema {
    name: String,
    path: Vec<String>,
    parameters: Vec<ParameterSpec>,
    is_async: bool,
    is_void: bool,
    filters: Vec<FilterSpec>,
    description: String,
    hidden: bool,
}

impl CommandSchema {
    fn new(name: &str) -> Self {
        let path: Vec<String> = split_path(name);
        Self {
            name: path.join(" "),
            path,
            parameters: Vec::new(),
            is_async: false,
            is_void: false,
            filters: Vec::new(),
            description: String::new(),
            hidden: false,
        }
    }

    /// Space-separated command path; empty for the root command.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn parameters(&self) -> &[ParameterSpec] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.matches_name(name))
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn is_void(&self) -> bool {
        self.is_void
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn has_positional(&self) -> bool {
        self.parameters.iter().any(|p| p.positional)
    }

    pub fn has_named(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| !p.positional && !p.is_injected())
    }

    /// Apply naming, assign positional indices and check structural invariants.
    pub(crate) fn finalize(mut self, naming: NameConversion) -> Result<Self, SchemaError> {
        let command = self.name.clone();

        for segment in &self.path {
            if segment.starts_with('-') {
                return Err(SchemaError::InvalidCommandName {
                    name: command,
                    reason: format!("segment '{}' starts with '-'", segment),
                });
            }
        }

        let mut seen_named = false;
        let mut seen_params_positional = false;
        let mut next_index = 0;
        let mut names: Vec<String> = Vec::new();
        let mut flags: Vec<String> = Vec::new();

        for param in &mut self.parameters {
            param.canonical_name = naming.apply(&param.identifier);

            let lowered = param.canonical_name.to_lowercase();
            if names.contains(&lowered) {
                return Err(SchemaError::DuplicateParameter {
                    command,
                    parameter: param.canonical_name.clone(),
                });
            }
            names.push(lowered);

            if param.params_array && param.ty.element().is_none() {
                return Err(SchemaError::ParamsArrayNotArray {
                    command,
                    parameter: param.canonical_name.clone(),
                });
            }

            if param.is_injected() {
                if param.positional || param.params_array {
                    return Err(SchemaError::InjectedNotBindable {
                        command,
                        parameter: param.canonical_name.clone(),
                    });
                }
                continue;
            }

            if param.positional {
                if seen_named {
                    return Err(SchemaError::PositionalAfterNamed {
                        command,
                        parameter: param.canonical_name.clone(),
                    });
                }
                if seen_params_positional {
                    return Err(SchemaError::ParamsArrayNotLast {
                        command,
                        parameter: param.canonical_name.clone(),
                    });
                }
                seen_params_positional = param.params_array;
                param.positional_index = next_index;
                next_index += 1;
                continue;
            }

            seen_named = true;
            for flag in param.flag_names() {
                if RESERVED_FLAGS.contains(&flag.as_str()) {
                    return Err(SchemaError::ReservedFlag { command, flag });
                }
                if flags.contains(&flag) {
                    return Err(SchemaError::DuplicateFlag { command, flag });
                }
                flags.push(flag);
            }
        }

        Ok(self)
    }

    pub(crate) fn prefix(&mut self, prefix: &[String]) {
        let mut path = prefix.to_vec();
        path.append(&mut self.path);
        self.name = path.join(" ");
        self.path = path;
    }
}

fn split_path(name: &str) -> Vec<String> {
    name.split(|c: char| c.is_whitespace() || c == '/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Command Builder
// ============================================================================

/// Type-erased handler stored in the registry's function table.
pub(crate) type HandlerFn =
    Arc<dyn Fn(Invocation) -> BoxFuture<'static, Result<Response, CliError>> + Send + Sync>;

/// A command schema together with the handler it dispatches to.
pub struct Command {
    schema: CommandSchema,
    handler: Option<HandlerFn>,
}

impl Command {
    /// `name` may contain several segments separated by spaces or `/`.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            schema: CommandSchema::new(name.as_ref()),
            handler: None,
        }
    }

    /// The default command, run when no sub-command matches.
    pub fn root() -> Self {
        Self::new("")
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.schema.description = description.into();
        self
    }

    pub fn param(mut self, param: ParameterSpec) -> Self {
        self.schema.parameters.push(param);
        self
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.schema.filters.push(filter);
        self
    }

    /// Excluded from command lists but still runnable and help-able by exact name.
    pub fn hidden(mut self) -> Self {
        self.schema.hidden = true;
        self
    }

    /// Register an asynchronous handler.
    pub fn handler<F, Fut, R>(mut self, handler: F) -> Self
    where
        F: Fn(Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoResponse,
    {
        self.schema.is_async = true;
        self.schema.is_void = R::IS_VOID;
        self.handler = Some(Arc::new(move |inv| {
            handler(inv).map(IntoResponse::into_result).boxed()
        }));
        self
    }

    /// Register a synchronous handler.
    pub fn handler_sync<F, R>(mut self, handler: F) -> Self
    where
        F: Fn(Invocation) -> R + Send + Sync + 'static,
        R: IntoResponse,
    {
        self.schema.is_async = false;
        self.schema.is_void = R::IS_VOID;
        let handler = Arc::new(handler);
        self.handler = Some(Arc::new(move |inv| {
            let handler = Arc::clone(&handler);
            future::lazy(move |_| handler(inv).into_result()).boxed()
        }));
        self
    }

    pub fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    pub(crate) fn into_parts(self) -> (CommandSchema, Option<HandlerFn>) {
        (self.schema, self.handler)
    }
}

/// Commands sharing a path prefix and a set of group-level filters.
///
/// Group filters run before the filters declared on each command.
pub struct CommandGroup {
    prefix: Vec<String>,
    filters: Vec<FilterSpec>,
    commands: Vec<Command>,
}

impl CommandGroup {
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: split_path(prefix.as_ref()),
            filters: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn group(mut self, group: CommandGroup) -> Self {
        self.commands.extend(group.into_commands());
        self
    }

    pub fn into_commands(self) -> Vec<Command> {
        let CommandGroup {
            prefix,
            filters,
            commands,
        } = self;

        commands
            .into_iter()
            .map(|mut command| {
                command.schema.prefix(&prefix);
                let mut merged = filters.clone();
                merged.append(&mut command.schema.filters);
                command.schema.filters = merged;
                command
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalize(cmd: Command) -> Result<CommandSchema, SchemaError> {
        cmd.into_parts().0.finalize(NameConversion::KebabCase)
    }

    #[test]
    fn test_kebab_case_conversion() {
        assert_eq!(to_kebab_case("maxCount"), "max-count");
        assert_eq!(to_kebab_case("max_count"), "max-count");
        assert_eq!(to_kebab_case("HTTPServer"), "http-server");
        assert_eq!(to_kebab_case("Name"), "name");
        assert_eq!(to_kebab_case("already-kebab"), "already-kebab");
        assert_eq!(to_kebab_case("retry2Times"), "retry2-times");
    }

    #[test]
    fn test_name_split_on_space_and_slash() {
        let cmd = Command::new("a/b");
        assert_eq!(cmd.schema().path(), ["a", "b"]);
        assert_eq!(cmd.schema().name(), "a b");
        assert!(Command::root().schema().is_root());
    }

    #[test]
    fn test_alias_normalization() {
        let p = ParameterSpec::of::<bool>("verbose").alias("v").alias("loud");
        assert_eq!(p.aliases(), ["-v", "--loud"]);
    }

    #[test]
    fn test_requires_explicit_binding() {
        assert!(ParameterSpec::of::<i32>("age").requires_explicit_binding());
        assert!(!ParameterSpec::of::<bool>("force").requires_explicit_binding());
        assert!(!ParameterSpec::of::<i32>("age").default(3).requires_explicit_binding());
        assert!(!ParameterSpec::of::<Vec<i32>>("n").params().requires_explicit_binding());
        assert!(!ParameterSpec::cancellation("ct").requires_explicit_binding());
    }

    #[test]
    fn test_finalize_assigns_positional_indices_and_names() {
        let schema = finalize(
            Command::new("copy")
                .param(ParameterSpec::of::<String>("sourcePath").positional())
                .param(ParameterSpec::cancellation("ct"))
                .param(ParameterSpec::of::<String>("destPath").positional())
                .param(ParameterSpec::of::<bool>("dryRun")),
        )
        .unwrap();

        let params = schema.parameters();
        assert_eq!(params[0].canonical_name(), "source-path");
        assert_eq!(params[0].positional_index(), 0);
        assert_eq!(params[2].positional_index(), 1);
        assert_eq!(params[3].positional_index(), -1);
        assert_eq!(params[3].flag_names().collect::<Vec<_>>(), ["--dry-run"]);
    }

    #[test]
    fn test_positional_after_named_is_rejected() {
        let err = finalize(
            Command::new("x")
                .param(ParameterSpec::of::<i32>("count"))
                .param(ParameterSpec::of::<String>("path").positional()),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::PositionalAfterNamed { .. }));
    }

    #[test]
    fn test_params_array_must_be_last_positional() {
        let err = finalize(
            Command::new("x")
                .param(ParameterSpec::of::<Vec<i32>>("nums").positional().params())
                .param(ParameterSpec::of::<String>("tail").positional()),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::ParamsArrayNotLast { .. }));

        let err = finalize(Command::new("x").param(ParameterSpec::of::<i32>("n").params()))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ParamsArrayNotArray { .. }));
    }

    #[test]
    fn test_duplicate_and_reserved_flags_are_rejected() {
        let err = finalize(
            Command::new("x")
                .param(ParameterSpec::of::<bool>("verbose").alias("v"))
                .param(ParameterSpec::of::<bool>("vendor").alias("v")),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateFlag { .. }));

        let err = finalize(Command::new("x").param(ParameterSpec::of::<bool>("helpMe").alias("h")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ReservedFlag { .. }));

        let err = finalize(
            Command::new("x")
                .param(ParameterSpec::of::<i32>("maxCount"))
                .param(ParameterSpec::of::<i32>("max_count")),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateParameter { .. }));
    }

    #[test]
    fn test_group_prefixes_names_and_orders_filters() {
        use crate::filter::{filter_fn, FilterSpec};

        let group_filter = FilterSpec::new(filter_fn(|ctx, next| next.run(ctx))).named("group");
        let cmd_filter = FilterSpec::new(filter_fn(|ctx, next| next.run(ctx))).named("cmd");

        let commands = CommandGroup::new("db")
            .filter(group_filter)
            .command(Command::new("migrate").filter(cmd_filter))
            .into_commands();

        let schema = commands[0].schema();
        assert_eq!(schema.name(), "db migrate");
        let names: Vec<&str> = schema.filters().iter().map(FilterSpec::name).collect();
        assert_eq!(names, ["group", "cmd"]);
    }

    #[test]
    fn test_validation_rules() {
        let range = ValidationRule::range(0.0, 150.0);
        assert!(range.check(&Value::Int(42)).is_ok());
        assert!(range.check(&Value::Int(200)).is_err());
        assert!(range.check(&Value::Null).is_ok());

        let len = ValidationRule::min_length(3);
        assert!(len.check(&Value::String("ab".into())).is_err());
        assert!(len.check(&Value::Array(vec![Value::Int(1); 3])).is_ok());

        let one_of = ValidationRule::one_of(["dev", "prod"]);
        assert!(one_of.check(&Value::String("prod".into())).is_ok());
        assert!(one_of.check(&Value::String("qa".into())).is_err());
    }

    #[test]
    fn test_handler_shape_is_recorded() {
        let cmd = Command::new("x").handler_sync(|_| ());
        assert!(!cmd.schema().is_async());
        assert!(cmd.schema().is_void());

        let cmd = Command::new("x").handler(|_| async { 3i32 });
        assert!(cmd.schema().is_async());
        assert!(!cmd.schema().is_void());
    }
}
