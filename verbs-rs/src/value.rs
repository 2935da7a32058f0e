//! Runtime values produced by the binder.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};

use crate::cancel::CancellationToken;
use crate::error::DispatchError;
use crate::provider::ServiceProvider;
use crate::schema::{CommandSchema, NumericKind, ParamType, ParameterSpec};

// ============================================================================
// Value
// ============================================================================

/// A coerced argument value.
#[derive(Clone)]
pub enum Value {
    Null,
    String(String),
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    DateTime(DateTime<FixedOffset>),
    /// Declared spelling of the matched enum variant.
    Enum(String),
    Array(Vec<Value>),
    Json(serde_json::Value),
    /// Object produced by a custom parser.
    Opaque(Arc<dyn Any + Send + Sync>),
}

impl Value {
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::UInt(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Character count for strings, element count for arrays.
    pub fn length(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// JSON form of the value, used for serde-based extraction.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null | Value::Opaque(_) => Json::Null,
            Value::String(s) | Value::Enum(s) => Json::String(s.clone()),
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(n) => Json::from(*n),
            Value::UInt(n) => Json::from(*n),
            Value::Float(n) => Json::from(*n),
            Value::Char(c) => Json::String(c.to_string()),
            Value::DateTime(dt) => Json::String(dt.to_rfc3339()),
            Value::Array(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Json(json) => json.clone(),
        }
    }

    /// Zero value bound to an optional parameter that was never matched.
    pub(crate) fn zero(ty: &ParamType) -> Value {
        match ty {
            ParamType::Bool => Value::Bool(false),
            ParamType::Array(_) => Value::Array(Vec::new()),
            ParamType::Numeric(NumericKind::F32 | NumericKind::F64) => Value::Float(0.0),
            ParamType::Numeric(NumericKind::U8 | NumericKind::U16)
            | ParamType::Numeric(NumericKind::U32 | NumericKind::U64) => Value::UInt(0),
            ParamType::Numeric(_) => Value::Int(0),
            _ => Value::Null,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Value::UInt(n) => f.debug_tuple("UInt").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::Char(c) => f.debug_tuple("Char").field(c).finish(),
            Value::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
            Value::Enum(s) => f.debug_tuple("Enum").field(s).finish(),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Value::Opaque(_) => write!(f, "Opaque(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) | (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Command-line spelling of the value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::String(s) | Value::Enum(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Char(c) => write!(f, "{}", c),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Json(json) => write!(f, "{}", json),
            Value::Opaque(_) => write!(f, "<opaque>"),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v as $cast)
                }
            }
        )*
    };
}

value_from! {
    i8 => Int as i64, i16 => Int as i64, i32 => Int as i64, i64 => Int as i64,
    u8 => UInt as u64, u16 => UInt as u64, u32 => UInt as u64, u64 => UInt as u64,
    f64 => Float as f64,
}

/// Widen an `f32` through its shortest decimal form, so `1.1f32` becomes `1.1`.
pub(crate) fn widen_f32(n: f32) -> f64 {
    n.to_string().parse().unwrap_or(n as f64)
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(widen_f32(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Typed Extraction
// ============================================================================

/// Rust types that map onto a [`ParamType`] and can be read back from a [`Value`].
pub trait ArgValue: Sized {
    fn param_type() -> ParamType;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! arg_value_int {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl ArgValue for $ty {
                fn param_type() -> ParamType {
                    ParamType::Numeric(NumericKind::$kind)
                }

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::Int(n) => <$ty>::try_from(*n).ok(),
                        Value::UInt(n) => <$ty>::try_from(*n).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

arg_value_int! {
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
}

impl ArgValue for f64 {
    fn param_type() -> ParamType {
        ParamType::Numeric(NumericKind::F64)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64()
    }
}

impl ArgValue for f32 {
    fn param_type() -> ParamType {
        ParamType::Numeric(NumericKind::F32)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_f64().map(|n| n as f32)
    }
}

impl ArgValue for String {
    fn param_type() -> ParamType {
        ParamType::String
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) | Value::Enum(s) => Some(s.clone()),
            Value::Char(c) => Some(c.to_string()),
            _ => None,
        }
    }
}

impl ArgValue for bool {
    fn param_type() -> ParamType {
        ParamType::Bool
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl ArgValue for char {
    fn param_type() -> ParamType {
        ParamType::Char
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(*c),
            _ => None,
        }
    }
}

impl ArgValue for DateTime<FixedOffset> {
    fn param_type() -> ParamType {
        ParamType::DateTime
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl ArgValue for serde_json::Value {
    fn param_type() -> ParamType {
        ParamType::Json("json".to_string())
    }

    fn from_value(value: &Value) -> Option<Self> {
        Some(value.to_json())
    }
}

impl<T: ArgValue> ArgValue for Vec<T> {
    fn param_type() -> ParamType {
        ParamType::array(T::param_type())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: ArgValue> ArgValue for Option<T> {
    fn param_type() -> ParamType {
        ParamType::nullable(T::param_type())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

// ============================================================================
// Bound Invocation
// ============================================================================

/// One slot of a bound invocation, matching a parameter 1:1.
#[derive(Clone)]
pub enum Argument {
    Value(Value),
    /// Filled with the invocation context when the handler runs.
    Context,
    Cancellation(CancellationToken),
    Service(Arc<dyn Any + Send + Sync>),
    /// Injected parameter the dispatcher has not resolved yet.
    Unresolved,
}

impl Argument {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Argument::Context => write!(f, "Context"),
            Argument::Cancellation(_) => write!(f, "Cancellation"),
            Argument::Service(_) => write!(f, "Service(..)"),
            Argument::Unresolved => write!(f, "Unresolved"),
        }
    }
}

/// Result of binding one command line against one schema.
#[derive(Debug, Clone)]
pub struct BoundInvocation {
    schema: Arc<CommandSchema>,
    arguments: Vec<Argument>,
}

impl BoundInvocation {
    pub(crate) fn new(schema: Arc<CommandSchema>, arguments: Vec<Argument>) -> Self {
        debug_assert_eq!(schema.parameters().len(), arguments.len());
        Self { schema, arguments }
    }

    pub fn schema(&self) -> &Arc<CommandSchema> {
        &self.schema
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    /// Parameters paired with their bound arguments, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&ParameterSpec, &Argument)> {
        self.schema.parameters().iter().zip(self.arguments.iter())
    }

    /// Look up an argument by canonical name or source identifier.
    pub fn argument(&self, name: &str) -> Option<&Argument> {
        self.schema
            .parameters()
            .iter()
            .position(|p| p.matches_name(name))
            .map(|i| &self.arguments[i])
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.argument(name).and_then(Argument::as_value)
    }

    pub fn get<T: ArgValue>(&self, name: &str) -> Option<T> {
        self.value(name).and_then(T::from_value)
    }

    /// Fill injected slots from ambient state.
    pub(crate) fn resolve_injections(
        &mut self,
        services: &dyn ServiceProvider,
        token: &CancellationToken,
    ) -> Result<(), DispatchError> {
        for (param, slot) in self.schema.parameters().iter().zip(self.arguments.iter_mut()) {
            if !matches!(slot, Argument::Unresolved) {
                continue;
            }
            *slot = match param.param_type() {
                ParamType::Context => Argument::Context,
                ParamType::Cancellation => Argument::Cancellation(token.clone()),
                ParamType::Service(key) => {
                    let service = match &key.key {
                        Some(k) => services.resolve_keyed(key.type_id, k),
                        None => services.resolve(key.type_id),
                    };
                    let service = service.ok_or_else(|| DispatchError::ServiceUnavailable {
                        parameter: param.canonical_name().to_string(),
                        type_name: key.type_name.to_string(),
                    })?;
                    Argument::Service(service)
                }
                _ => continue,
            };
        }
        Ok(())
    }
}
