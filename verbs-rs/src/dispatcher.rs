//! Top-level orchestration: route, bind, validate, filter, invoke.
//!
//! Each dispatch walks `Routing → Binding → Validating → Filtering → Invoking →
//! Complete` once, dropping into `Error` from any of the first five. Failures are
//! turned into a [`Response`] here; nothing escapes as a panic or an `Err`.

use std::any::Any;
use std::ffi::OsString;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::FutureExt;
use tracing::Instrument;

use crate::binder;
use crate::build_info;
use crate::cancel::{listen_for_interrupt, CancellationToken};
use crate::config::{AppConfig, CommandOrder};
use crate::error::{CliError, DispatchError, SchemaError};
use crate::filter::{self, FilterSpec, InvocationContext, Next};
use crate::help::HelpBuilder;
use crate::provider::{RuleValidator, ServiceProvider, Services, ValidationProvider};
use crate::response::Response;
use crate::router::CommandRegistry;
use crate::schema::{Command, CommandGroup, NameConversion};

// ============================================================================
// App Builder
// ============================================================================

/// Collects commands, global filters and providers, then validates them into a
/// [`Dispatcher`].
///
/// # Example
///
/// ```
/// use verbs::{App, Command, ParameterSpec};
///
/// let dispatcher = App::new("calc")
///     .command(
///         Command::new("add")
///             .param(ParameterSpec::of::<i64>("a").positional())
///             .param(ParameterSpec::of::<i64>("b").positional())
///             .handler_sync(|inv| {
///                 let a: i64 = inv.get("a")?;
///                 let b: i64 = inv.get("b")?;
///                 Ok::<_, verbs::CliError>((a + b).to_string())
///             }),
///     )
///     .build()
///     .unwrap();
///
/// let runtime = tokio::runtime::Runtime::new().unwrap();
/// let args = vec!["add".to_string(), "2".to_string(), "3".to_string()];
/// let response = runtime.block_on(dispatcher.dispatch(&args));
/// assert_eq!(response.exit_code, 0);
/// assert_eq!(response.output.to_string(), "5");
/// ```
pub struct App {
    config: AppConfig,
    commands: Vec<Command>,
    filters: Vec<FilterSpec>,
    services: Arc<dyn ServiceProvider>,
    validator: Arc<dyn ValidationProvider>,
}

impl App {
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            config: AppConfig::new(program_name),
            commands: Vec::new(),
            filters: Vec::new(),
            services: Arc::new(Services::new()),
            validator: Arc::new(RuleValidator),
        }
    }

    /// Replace every setting at once.
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    pub fn naming(mut self, naming: NameConversion) -> Self {
        self.config.name_conversion = naming;
        self
    }

    pub fn command_order(mut self, order: CommandOrder) -> Self {
        self.config.command_order = order;
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

    /// Global filter; runs for every command.
    pub fn filter(mut self, filter: FilterSpec) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn services(mut self, services: impl ServiceProvider + 'static) -> Self {
        self.services = Arc::new(services);
        self
    }

    pub fn validator(mut self, validator: impl ValidationProvider + 'static) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    /// Validate every command. Any error here should abort startup.
    pub fn build(self) -> Result<Dispatcher, SchemaError> {
        let registry = CommandRegistry::build(self.commands, self.config.name_conversion)?;
        let program = self.config.resolved_program_name();
        let help = HelpBuilder::new(program.clone())
            .description(self.config.description.clone())
            .order(self.config.command_order)
            .color(self.config.color);

        tracing::debug!(program = %program, commands = registry.len(), "Dispatcher built");

        Ok(Dispatcher {
            config: self.config,
            program,
            registry,
            filters: self.filters,
            services: self.services,
            validator: self.validator,
            help,
        })
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("config", &self.config)
            .field("commands", &self.commands.len())
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Routing,
    Binding,
    Validating,
    Filtering,
    Invoking,
    Complete,
    Error,
}

impl Phase {
    fn advance(&mut self, next: Phase) {
        debug_assert!(
            !matches!(self, Phase::Complete | Phase::Error),
            "terminal phase re-entered"
        );
        tracing::trace!(from = ?*self, to = ?next, "Dispatch phase");
        *self = next;
    }
}

/// Immutable, validated command table ready to run argument vectors.
pub struct Dispatcher {
    config: AppConfig,
    program: String,
    registry: CommandRegistry,
    filters: Vec<FilterSpec>,
    services: Arc<dyn ServiceProvider>,
    validator: Arc<dyn ValidationProvider>,
    help: HelpBuilder,
}

impl Dispatcher {
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Overview text: root help (if any) plus the command list.
    pub fn help(&self) -> String {
        self.help.overview(&self.registry)
    }

    /// Help for the command at `path`, hidden commands included.
    pub fn command_help<S: AsRef<str>>(&self, path: &[S]) -> Option<String> {
        self.registry
            .find(path)
            .map(|id| self.help.command_help(self.registry.schema(id)))
    }

    pub fn version(&self) -> &str {
        build_info::resolve_version(self.config.version.as_deref())
    }

    /// Dispatch the process arguments, print the response and return its exit code.
    pub async fn run(&self) -> i32 {
        let args = process_args(std::env::args_os());
        let response = self.dispatch(&args).await;
        response.print();
        response.exit_code
    }

    /// Dispatch one argument vector (program name excluded).
    ///
    /// Installs an interrupt listener for the duration of the call when
    /// `handle_signals` is enabled.
    pub async fn dispatch(&self, args: &[String]) -> Response {
        let token = CancellationToken::new();
        let listener = self
            .config
            .handle_signals
            .then(|| listen_for_interrupt(token.clone()));

        let response = self.dispatch_with(args, token, &[]).await;

        if let Some(listener) = listener {
            listener.abort();
        }
        response
    }

    /// Dispatch with a caller-owned cancellation token and extra per-invocation filters.
    pub async fn dispatch_with(
        &self,
        args: &[String],
        token: CancellationToken,
        extra_filters: &[FilterSpec],
    ) -> Response {
        let span = tracing::debug_span!("dispatch", program = %self.program, argc = args.len());
        self.execute(args, token, extra_filters)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        args: &[String],
        token: CancellationToken,
        extra_filters: &[FilterSpec],
    ) -> Response {
        if let Some(response) = self.builtin(args) {
            return response;
        }

        let mut phase = Phase::Routing;
        let route = match self.registry.resolve(args) {
            Ok(route) => route,
            Err(e) => {
                phase.advance(Phase::Error);
                tracing::debug!(error = %e, "No command matched");
                return self.listing(&e);
            }
        };

        let schema = Arc::clone(self.registry.schema(route.command));
        let rest = &args[route.offset..];
        tracing::debug!(command = %schema.name(), offset = route.offset, "Routed");

        if rest.iter().any(|a| a == "-h" || a == "--help") {
            phase.advance(Phase::Complete);
            return Response::text(self.help.command_help(&schema));
        }

        phase.advance(Phase::Binding);
        let mut bound = match binder::bind(&schema, rest) {
            Ok(bound) => bound,
            Err(e) => return self.fail(&mut phase, e),
        };

        phase.advance(Phase::Validating);
        if let Err(e) = binder::validate(&bound, self.validator.as_ref()) {
            return self.fail(&mut phase, e);
        }
        if let Err(e) = bound.resolve_injections(self.services.as_ref(), &token) {
            return self.fail(&mut phase, e);
        }

        phase.advance(Phase::Filtering);
        let specs = filter::collect(&self.filters, schema.filters(), extra_filters);
        let handler = Arc::clone(self.registry.handler(route.command));
        let next = match filter::compose(&specs, self.services.as_ref(), handler) {
            Ok(next) => next,
            Err(e) => return self.fail(&mut phase, DispatchError::Handler(e)),
        };
        let ctx = InvocationContext::new(args, bound, token.clone(), Arc::clone(&self.services));

        phase.advance(Phase::Invoking);
        match self.invoke(next, ctx, &token).await {
            Ok(response) => {
                phase.advance(Phase::Complete);
                tracing::debug!(exit_code = response.exit_code, "Command completed");
                response
            }
            Err(e) => self.fail(&mut phase, e),
        }
    }

    /// `--help`, `--version`, `help [path]`, `version` and the empty command line.
    fn builtin(&self, args: &[String]) -> Option<Response> {
        let Some(first) = args.first() else {
            return self
                .registry
                .root()
                .is_none()
                .then(|| Response::text(self.help()));
        };

        match first.as_str() {
            "-h" | "--help" => Some(Response::text(self.help())),
            "--version" => Some(Response::text(self.version())),
            s if s.eq_ignore_ascii_case("version") => Some(Response::text(self.version())),
            s if s.eq_ignore_ascii_case("help") => {
                let path = &args[1..];
                if path.is_empty() {
                    return Some(Response::text(self.help()));
                }
                Some(match self.command_help(path) {
                    Some(text) => Response::text(text),
                    None => self.listing(&DispatchError::UnknownCommand(path.join(" "))),
                })
            }
            _ => None,
        }
    }

    fn listing(&self, error: &DispatchError) -> Response {
        Response {
            exit_code: error.exit_code(),
            output: crate::response::Output::Text(format!("{}\n\n{}", error, self.help())),
        }
    }

    async fn invoke(
        &self,
        next: Next,
        ctx: InvocationContext,
        token: &CancellationToken,
    ) -> Result<Response, DispatchError> {
        let mut run = AssertUnwindSafe(next.run(ctx)).catch_unwind().boxed();

        let finished = tokio::select! {
            biased;
            outcome = &mut run => Some(outcome),
            _ = token.cancelled() => None,
        };

        let outcome = match finished {
            Some(outcome) => outcome,
            None => {
                let grace = self.config.grace_period();
                tracing::debug!(grace_ms = grace.as_millis() as u64, "Cancellation requested");
                match tokio::time::timeout(grace, run).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(
                            grace_ms = grace.as_millis() as u64,
                            "Command did not stop within the grace period; abandoning it"
                        );
                        return Err(DispatchError::Cancelled);
                    }
                }
            }
        };

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(CliError::Cancelled)) if token.is_cancelled() => Err(DispatchError::Cancelled),
            Ok(Err(e)) => Err(DispatchError::Handler(e)),
            Err(payload) => Err(DispatchError::Panicked(panic_message(payload.as_ref()))),
        }
    }

    fn fail(&self, phase: &mut Phase, error: DispatchError) -> Response {
        let failed_in = *phase;
        phase.advance(Phase::Error);

        match &error {
            DispatchError::Cancelled => {
                tracing::info!("Command interrupted");
            }
            DispatchError::Handler(e) => {
                tracing::error!(phase = ?failed_in, error = %e, detail = ?e, "Command failed");
            }
            DispatchError::Panicked(_) | DispatchError::ServiceUnavailable { .. } => {
                tracing::error!(phase = ?failed_in, error = %error, "Command failed");
            }
            _ => {
                tracing::debug!(phase = ?failed_in, kind = ?error.kind(), error = %error, "Dispatch rejected");
            }
        }

        Response::error(error.exit_code(), error.to_string())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("program", &self.program)
            .field("registry", &self.registry)
            .field("filters", &self.filters)
            .finish_non_exhaustive()
    }
}

/// Drop the program name and convert the rest, replacing invalid UTF-8 with U+FFFD.
fn process_args(argv: impl IntoIterator<Item = OsString>) -> Vec<String> {
    argv.into_iter()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
