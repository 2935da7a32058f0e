//! # verbs: typed command dispatch for CLI applications
//!
//! Declare commands and their parameters once; `verbs` routes an argument
//! vector to one command, binds the tokens to typed values, runs a filter
//! (middleware) chain around the handler and maps the outcome to an exit code.
//! Help, usage and version output come for free.
//!
//! ## Core Principles
//!
//! - **Declarative schemas**: commands are plain values built with [`Command`] and
//!   [`ParameterSpec`], validated once at startup by [`App::build`]
//! - **Typed access**: handlers read arguments through [`ArgValue`] types, serde
//!   types or custom parsers
//! - **Onion filters**: cross-cutting logic wraps the handler; lowest `order` runs outermost
//! - **Predictable exits**: `0` success, `1` usage or handler failure, `130` cancelled
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use verbs::{App, CliResult, Command, Invocation, ParameterSpec};
//!
//! async fn greet(inv: Invocation) -> CliResult<String> {
//!     let name: String = inv.get("name")?;
//!     let times: u32 = inv.get("times")?;
//!     Ok(vec![format!("Hello, {}!", name); times as usize].join("\n"))
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = App::new("hello")
//!         .version("1.0.0")
//!         .command(
//!             Command::new("greet")
//!                 .description("Print a greeting")
//!                 .param(ParameterSpec::of::<String>("name").positional())
//!                 .param(ParameterSpec::of::<u32>("times").alias("t").default(1u32))
//!                 .handler(greet),
//!         )
//!         .build()
//!         .expect("invalid command schema");
//!
//!     std::process::exit(dispatcher.run().await);
//! }
//! ```

use std::ops::Deref;
use std::sync::Arc;

pub mod binder;
pub mod build_info;
pub mod cancel;
pub mod coerce;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod help;
pub mod provider;
pub mod response;
pub mod router;
pub mod schema;
pub mod tracing_support;
pub mod value;

// Re-export tracing itself (required for #[instrument] macro)
#[cfg(feature = "tracing")]
pub use tracing_support::tracing;

#[cfg(feature = "tracing")]
pub use tracing_support::{
    debug, error, info, init_subscriber, init_subscriber_with_config, instrument, trace, warn,
    TracingConfig, TracingFormat,
};

pub use build_info::{version_info, version_short};

pub use binder::{bind, validate};
pub use cancel::{listen_for_interrupt, CancellationToken};
pub use coerce::{coerce, coerce_collection};
pub use config::{AppConfig, CommandOrder};
pub use dispatcher::{App, Dispatcher};
pub use error::{CliError, DispatchError, ErrorKind, SchemaError, SystemError, UserError};
pub use filter::{filter_fn, Filter, FilterSpec, FnFilter, Invocation, InvocationContext, Next};
pub use help::HelpBuilder;
pub use provider::{RuleValidator, ServiceProvider, Services, ValidationProvider};
pub use response::{IntoResponse, Output, Response};
pub use router::{CommandId, CommandRegistry, Route};
pub use schema::{
    to_kebab_case, Command, CommandGroup, CommandSchema, CustomParser, EnumInfo, NameConversion,
    NumericKind, ParamType, ParameterSpec, ServiceKey, ValidationRule,
};
pub use value::{ArgValue, Argument, BoundInvocation, Value};

// ============================================================================
// Core Types
// ============================================================================

/// Shared handle to a service or filter state.
///
/// Cloning only bumps a reference count.
///
/// # Example
///
/// ```
/// use verbs::State;
///
/// struct Config {
///     endpoint: String,
/// }
///
/// let state = State::new(Config {
///     endpoint: "https://example.test".to_string(),
/// });
/// let copy = state.clone();
///
/// assert_eq!(copy.get().endpoint, "https://example.test");
/// assert_eq!(state.endpoint, "https://example.test");
/// ```
pub struct State<T: ?Sized>(Arc<T>);

impl<T> State<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(inner))
    }
}

impl<T: ?Sized> State<T> {
    pub fn from_arc(inner: Arc<T>) -> Self {
        Self(inner)
    }

    pub fn get(&self) -> &T {
        &self.0
    }

    pub fn into_arc(self) -> Arc<T> {
        self.0
    }
}

impl<T: ?Sized> Clone for State<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for State<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized + std::fmt::Debug> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("State").field(&&*self.0).finish()
    }
}

/// Result type for handlers and filters.
///
/// The `Ok` value is anything implementing [`IntoResponse`].
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_creation_and_access() {
        let state = State::new(42);
        assert_eq!(*state.get(), 42);

        let cloned = state.clone();
        assert_eq!(*cloned, 42);
        assert!(Arc::ptr_eq(&state.into_arc(), &cloned.into_arc()));
    }

    #[test]
    fn test_state_from_shared_arc() {
        let shared = Arc::new(String::from("db"));
        let state = State::from_arc(Arc::clone(&shared));
        assert_eq!(state.len(), 2);
        assert_eq!(Arc::strong_count(&shared), 2);
    }
}
