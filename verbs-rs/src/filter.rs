//! Filter pipeline.
//!
//! Filters wrap the handler call onion-style: each one may run code before and after
//! calling [`Next::run`], or short-circuit by returning without calling it. `Next` is
//! consumed by `run`, so a filter can call it at most once.
//!
//! Ordering: global filters, then group filters, then command filters, then any
//! per-invocation filters are concatenated and stably sorted by `order`. The lowest
//! order ends up outermost: it runs first on the way in and last on the way out.
//!
//! # Example
//!
//! ```
//! use verbs::{filter_fn, FilterSpec};
//!
//! let timing = FilterSpec::new(filter_fn(|ctx, next| async move {
//!     let started = std::time::Instant::now();
//!     let response = next.run(ctx).await;
//!     eprintln!("took {:?}", started.elapsed());
//!     response
//! }))
//! .order(-10)
//! .named("timing");
//! # let _ = timing;
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;

use crate::cancel::CancellationToken;
use crate::error::{CliError, UserError};
use crate::provider::ServiceProvider;
use crate::response::Response;
use crate::schema::HandlerFn;
use crate::value::{ArgValue, Argument, BoundInvocation, Value};
use crate::{CliResult, State};

// ============================================================================
// Invocation Context
// ============================================================================

/// Read-only view of one invocation, threaded through the filter chain.
///
/// The `state` slot is the one thing filters may change: [`with_state`](Self::with_state)
/// returns a modified copy to hand to `next`.
#[derive(Clone)]
pub struct InvocationContext {
    command_name: Arc<str>,
    raw_args: Arc<[String]>,
    arguments: Arc<BoundInvocation>,
    cancellation: CancellationToken,
    state: Option<Arc<dyn Any + Send + Sync>>,
    services: Arc<dyn ServiceProvider>,
}

impl InvocationContext {
    pub(crate) fn new(
        raw_args: &[String],
        arguments: BoundInvocation,
        cancellation: CancellationToken,
        services: Arc<dyn ServiceProvider>,
    ) -> Self {
        Self {
            command_name: Arc::from(arguments.schema().name()),
            raw_args: Arc::from(raw_args),
            arguments: Arc::new(arguments),
            cancellation,
            state: None,
            services,
        }
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// The argument vector as dispatched, command path included.
    pub fn raw_args(&self) -> &[String] {
        &self.raw_args
    }

    pub fn arguments(&self) -> &BoundInvocation {
        &self.arguments
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn services(&self) -> &dyn ServiceProvider {
        self.services.as_ref()
    }

    pub fn state<T: Any + Send + Sync>(&self) -> Option<State<T>> {
        self.state
            .clone()
            .and_then(|s| s.downcast::<T>().ok())
            .map(State::from_arc)
    }

    /// Copy of this context carrying `state` for downstream links.
    pub fn with_state<T: Any + Send + Sync>(mut self, state: T) -> Self {
        self.state = Some(Arc::new(state));
        self
    }
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("command_name", &self.command_name)
            .field("raw_args", &self.raw_args)
            .field("has_state", &self.state.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Invocation (handler input)
// ============================================================================

/// What a handler receives: the bound arguments plus the final context.
#[derive(Debug, Clone)]
pub struct Invocation {
    context: InvocationContext,
}

impl Invocation {
    pub(crate) fn new(context: InvocationContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &InvocationContext {
        &self.context
    }

    pub fn arguments(&self) -> &BoundInvocation {
        self.context.arguments()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        self.context.cancellation()
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.arguments().value(name)
    }

    /// Typed argument. Fails with a user error if the parameter doesn't exist or
    /// holds a value of another type.
    pub fn get<T: ArgValue>(&self, name: &str) -> CliResult<T> {
        let value = self.value(name).ok_or_else(|| unknown_parameter(name))?;
        T::from_value(value).ok_or_else(|| {
            CliError::User(UserError::InvalidArgument {
                arg: name.to_string(),
                reason: format!("value {:?} has an unexpected type", value),
            })
        })
    }

    /// Deserialize an argument (enum names, JSON objects, arrays) into any serde type.
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> CliResult<T> {
        let value = self.value(name).ok_or_else(|| unknown_parameter(name))?;
        serde_json::from_value(value.to_json()).map_err(|e| {
            CliError::User(UserError::InvalidArgument {
                arg: name.to_string(),
                reason: e.to_string(),
            })
        })
    }

    /// Object produced by a custom parser.
    pub fn get_opaque<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        match self.value(name)? {
            Value::Opaque(obj) => obj.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    /// Service bound to a service-injected parameter.
    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Option<State<T>> {
        match self.arguments().argument(name)? {
            Argument::Service(obj) => obj.clone().downcast::<T>().ok().map(State::from_arc),
            _ => None,
        }
    }
}

fn unknown_parameter(name: &str) -> CliError {
    CliError::User(UserError::InvalidArgument {
        arg: name.to_string(),
        reason: "no such parameter".to_string(),
    })
}

// ============================================================================
// Filter & Next
// ============================================================================

/// One middleware link.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn invoke(&self, ctx: InvocationContext, next: Next) -> CliResult<Response>;
}

type Link = Box<dyn FnOnce(InvocationContext) -> BoxFuture<'static, CliResult<Response>> + Send>;

/// Continuation to the rest of the chain.
pub struct Next {
    link: Link,
}

impl Next {
    fn new(link: Link) -> Self {
        Self { link }
    }

    /// Run the remaining links. Consumes `self`: a filter calls it at most once.
    pub async fn run(self, ctx: InvocationContext) -> CliResult<Response> {
        (self.link)(ctx).await
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// Filter backed by a closure.
pub struct FnFilter<F>(F);

/// Build a filter from `|ctx, next| async move { ... }`.
pub fn filter_fn<F, Fut>(f: F) -> FnFilter<F>
where
    F: Fn(InvocationContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CliResult<Response>> + Send + 'static,
{
    FnFilter(f)
}

#[async_trait]
impl<F, Fut> Filter for FnFilter<F>
where
    F: Fn(InvocationContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = CliResult<Response>> + Send + 'static,
{
    async fn invoke(&self, ctx: InvocationContext, next: Next) -> CliResult<Response> {
        (self.0)(ctx, next).await
    }
}

// ============================================================================
// Filter Spec
// ============================================================================

type FilterFactory = dyn Fn(&dyn ServiceProvider) -> CliResult<Arc<dyn Filter>> + Send + Sync;

/// How to obtain a filter instance, plus its position in the pipeline.
#[derive(Clone)]
pub struct FilterSpec {
    name: String,
    order: i32,
    factory: Arc<FilterFactory>,
}

impl FilterSpec {
    /// Share one filter instance across invocations.
    pub fn new<F: Filter + 'static>(filter: F) -> Self {
        let filter: Arc<dyn Filter> = Arc::new(filter);
        Self {
            name: std::any::type_name::<F>().to_string(),
            order: 0,
            factory: Arc::new(move |_| Ok(Arc::clone(&filter))),
        }
    }

    /// Build a fresh filter per invocation, resolving its dependencies from the provider.
    pub fn from_factory<F, T>(factory: F) -> Self
    where
        F: Fn(&dyn ServiceProvider) -> CliResult<T> + Send + Sync + 'static,
        T: Filter + 'static,
    {
        Self {
            name: std::any::type_name::<T>().to_string(),
            order: 0,
            factory: Arc::new(move |services| {
                factory(services).map(|f| Arc::new(f) as Arc<dyn Filter>)
            }),
        }
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order_value(&self) -> i32 {
        self.order
    }

    pub(crate) fn instantiate(&self, services: &dyn ServiceProvider) -> CliResult<Arc<dyn Filter>> {
        (self.factory)(services)
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterSpec")
            .field("name", &self.name)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Concatenate filter sources and sort them by order (stable).
pub(crate) fn collect<'a>(
    global: &'a [FilterSpec],
    command: &'a [FilterSpec],
    invocation: &'a [FilterSpec],
) -> Vec<&'a FilterSpec> {
    let mut specs: Vec<&FilterSpec> = global
        .iter()
        .chain(command.iter())
        .chain(invocation.iter())
        .collect();
    specs.sort_by_key(|spec| spec.order);
    specs
}

/// Instantiate the sorted specs and fold them around the handler.
pub(crate) fn compose(
    specs: &[&FilterSpec],
    services: &dyn ServiceProvider,
    handler: HandlerFn,
) -> CliResult<Next> {
    let filters = specs
        .iter()
        .map(|spec| spec.instantiate(services))
        .collect::<CliResult<Vec<_>>>()?;

    let mut next = Next::new(Box::new(move |ctx| {
        async move { handler(Invocation::new(ctx)).await }.boxed()
    }));

    // Highest order is wrapped first, so the lowest order ends up outermost.
    for filter in filters.into_iter().rev() {
        let inner = next;
        next = Next::new(Box::new(move |ctx| {
            async move { filter.invoke(ctx, inner).await }.boxed()
        }));
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Services;
    use crate::schema::{Command, NameConversion};
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recording(order: i32, log: &Log) -> FilterSpec {
        let log = Arc::clone(log);
        FilterSpec::new(filter_fn(move |ctx, next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("before {}", order));
                let response = next.run(ctx).await;
                log.lock().unwrap().push(format!("after {}", order));
                response
            }
        }))
        .order(order)
    }

    fn context(command: Command) -> (InvocationContext, HandlerFn) {
        let (schema, handler) = command.into_parts();
        let schema = Arc::new(schema.finalize(NameConversion::KebabCase).unwrap());
        let bound = BoundInvocation::new(schema, Vec::new());
        let ctx = InvocationContext::new(
            &[],
            bound,
            CancellationToken::new(),
            Arc::new(Services::new()),
        );
        (ctx, handler.unwrap())
    }

    #[tokio::test]
    async fn test_lowest_order_is_outermost() {
        let log: Log = Arc::default();
        let global = vec![recording(3, &log)];
        let command = vec![recording(1, &log)];
        let invocation = vec![recording(2, &log)];

        let handler_log = Arc::clone(&log);
        let (ctx, handler) = context(Command::new("x").handler_sync(move |_| {
            handler_log.lock().unwrap().push("handler".to_string());
        }));

        let specs = collect(&global, &command, &invocation);
        let next = compose(&specs, &Services::new(), handler).unwrap();
        next.run(ctx).await.unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            [
                "before 1", "before 2", "before 3", "handler", "after 3", "after 2", "after 1"
            ]
        );
    }

    #[tokio::test]
    async fn test_equal_orders_keep_registration_order() {
        let log: Log = Arc::default();
        let first = {
            let log = Arc::clone(&log);
            FilterSpec::new(filter_fn(move |ctx, next| {
                log.lock().unwrap().push("first".into());
                next.run(ctx)
            }))
        };
        let second = {
            let log = Arc::clone(&log);
            FilterSpec::new(filter_fn(move |ctx, next| {
                log.lock().unwrap().push("second".into());
                next.run(ctx)
            }))
        };

        let (ctx, handler) = context(Command::new("x").handler_sync(|_| ()));
        let global = [first];
        let command = [second];
        let specs = collect(&global, &command, &[]);
        compose(&specs, &Services::new(), handler)
            .unwrap()
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn test_filter_can_short_circuit() {
        let called = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&called);
        let (ctx, handler) = context(Command::new("x").handler_sync(move |_| {
            *flag.lock().unwrap() = true;
        }));

        let gate = [FilterSpec::new(filter_fn(|_ctx, _next| async {
            Ok(Response::error(3, "blocked"))
        }))];
        let specs = collect(&gate, &[], &[]);
        let response = compose(&specs, &Services::new(), handler)
            .unwrap()
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(response.exit_code, 3);
        assert!(!*called.lock().unwrap());
    }

    #[tokio::test]
    async fn test_state_flows_downstream() {
        let (ctx, handler) = context(Command::new("x").handler_sync(|inv: Invocation| {
            inv.context()
                .state::<String>()
                .map(|s| s.get().clone())
                .unwrap_or_default()
        }));

        let tagger = [FilterSpec::new(filter_fn(|ctx: InvocationContext, next: Next| {
            next.run(ctx.with_state("tagged".to_string()))
        }))];
        let specs = collect(&tagger, &[], &[]);
        let response = compose(&specs, &Services::new(), handler)
            .unwrap()
            .run(ctx)
            .await
            .unwrap();

        assert_eq!(response.output.to_string(), "tagged");
    }

    #[tokio::test]
    async fn test_factory_resolves_dependencies() {
        struct Prefix(&'static str);
        struct Prefixed(State<Prefix>);

        #[async_trait]
        impl Filter for Prefixed {
            async fn invoke(&self, ctx: InvocationContext, next: Next) -> CliResult<Response> {
                let prefix = self.0.get().0;
                next.run(ctx.with_state(prefix.to_string())).await
            }
        }

        let services = Services::new().insert(Prefix(">>"));
        let spec = FilterSpec::from_factory(|sp: &dyn ServiceProvider| {
            sp.get::<Prefix>()
                .map(Prefixed)
                .ok_or_else(|| CliError::system("Prefix not registered"))
        });

        let (ctx, handler) = context(Command::new("x").handler_sync(|inv: Invocation| {
            inv.context().state::<String>().map(|s| s.get().clone()).unwrap_or_default()
        }));
        let specs = [spec];
        let sorted = collect(&specs, &[], &[]);
        let response = compose(&sorted, &services, handler)
            .unwrap()
            .run(ctx)
            .await
            .unwrap();
        assert_eq!(response.output.to_string(), ">>");

        let noop: HandlerFn =
            Arc::new(|_: Invocation| async { Ok::<_, CliError>(Response::silent()) }.boxed());
        assert!(compose(&sorted, &Services::new(), noop).is_err());
    }
}
