//! Error types.
//!
//! Three families live here:
//!
//! - [`SchemaError`]: raised while building the command registry. Always fatal at startup.
//! - [`DispatchError`]: raised while routing, binding, validating or invoking one command line.
//!   The dispatcher recovers from these locally and turns them into an exit code.
//! - [`CliError`]: what handlers and filters return when they fail.

use thiserror::Error;

/// Taxonomy code shared by every error the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownCommand,
    UnknownOption,
    ArgumentParseFailed,
    RequiredArgumentMissing,
    ValidationFailed,
    HandlerException,
    Cancelled,
    SchemaBuildError,
}

// ============================================================================
// Schema Errors
// ============================================================================

/// Structural problems found while building command schemas.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Command '{0}' is registered more than once (names are case-insensitive)")]
    DuplicateCommand(String),

    #[error("Command name '{0}' is reserved")]
    ReservedName(String),

    #[error("Invalid command name '{name}': {reason}")]
    InvalidCommandName { name: String, reason: String },

    #[error("Command '{0}' has no handler")]
    MissingHandler(String),

    #[error("Command '{command}': parameter '{parameter}' is declared more than once")]
    DuplicateParameter { command: String, parameter: String },

    #[error("Command '{command}': option name '{flag}' is used by more than one parameter")]
    DuplicateFlag { command: String, flag: String },

    #[error("Command '{command}': option name '{flag}' is reserved")]
    ReservedFlag { command: String, flag: String },

    #[error(
        "Command '{command}': positional parameter '{parameter}' must be declared before all named parameters"
    )]
    PositionalAfterNamed { command: String, parameter: String },

    #[error("Command '{command}': params array '{parameter}' must be the last positional parameter")]
    ParamsArrayNotLast { command: String, parameter: String },

    #[error("Command '{command}': params parameter '{parameter}' must have an array type")]
    ParamsArrayNotArray { command: String, parameter: String },

    #[error("Command '{command}': parameter '{parameter}' cannot be bound from the command line")]
    InjectedNotBindable { command: String, parameter: String },
}

impl SchemaError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SchemaBuildError
    }
}

// ============================================================================
// Dispatch Errors
// ============================================================================

/// Errors produced while handling one command line.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Command '{0}' is not found.")]
    UnknownCommand(String),

    #[error("Argument '{0}' is not recognized.")]
    UnknownOption(String),

    #[error("Argument '{name}' failed to parse, provided value: {raw}. {reason}")]
    ArgumentParseFailed {
        name: String,
        raw: String,
        reason: String,
    },

    #[error("Required argument '{0}' was not specified.")]
    RequiredArgumentMissing(String),

    #[error("Validation failed:\n{}", .0.join("\n"))]
    ValidationFailed(Vec<String>),

    #[error("{0}")]
    Handler(#[source] CliError),

    #[error("Service for parameter '{parameter}' ({type_name}) is not registered")]
    ServiceUnavailable {
        parameter: String,
        type_name: String,
    },

    #[error("Command execution panicked: {0}")]
    Panicked(String),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl DispatchError {
    /// Shorthand for a coercion or tokenization failure.
    pub fn parse_failed(
        name: impl Into<String>,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DispatchError::ArgumentParseFailed {
            name: name.into(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }

    /// Process exit code reported for this error.
    ///
    /// Unknown commands only print the command list, so they exit 0.
    pub fn exit_code(&self) -> i32 {
        match self {
            DispatchError::UnknownCommand(_) => 0,
            DispatchError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Taxonomy code of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::UnknownCommand(_) => ErrorKind::UnknownCommand,
            DispatchError::UnknownOption(_) => ErrorKind::UnknownOption,
            DispatchError::ArgumentParseFailed { .. } => ErrorKind::ArgumentParseFailed,
            DispatchError::RequiredArgumentMissing(_) => ErrorKind::RequiredArgumentMissing,
            DispatchError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            DispatchError::Cancelled => ErrorKind::Cancelled,
            DispatchError::Handler(_)
            | DispatchError::ServiceUnavailable { .. }
            | DispatchError::Panicked(_) => ErrorKind::HandlerException,
        }
    }
}

// ============================================================================
// Handler Errors
// ============================================================================

/// Error returned by handlers and filters.
#[derive(Debug, Error)]
pub enum CliError {
    /// User-fixable errors. These should include actionable hints for users.
    #[error(transparent)]
    User(#[from] UserError),

    /// Failures users can't fix: bugs or environmental issues.
    #[error(transparent)]
    System(#[from] SystemError),

    /// The handler observed the cancellation token and gave up.
    #[error("Operation was cancelled")]
    Cancelled,
}

impl CliError {
    /// Convenience constructor for user errors.
    pub fn user(message: impl Into<String>) -> Self {
        CliError::User(UserError::Generic(message.into()))
    }

    /// Convenience constructor for system errors.
    pub fn system(message: impl Into<String>) -> Self {
        CliError::System(SystemError::Internal(message.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CliError::Cancelled)
    }
}

/// User-fixable errors.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Error: {0}")]
    Generic(String),

    #[error("Error: Invalid argument '{arg}'\n\n{reason}")]
    InvalidArgument { arg: String, reason: String },

    #[error("Error: Prerequisite not met: {check}\n\nHint: {fix_hint}")]
    PrerequisiteNotMet { check: String, fix_hint: String },
}

/// System-level failures.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("Internal Error: {0}\n\nThis is likely a bug.")]
    Internal(String),

    #[error("Internal Error: I/O operation failed\n\n{0:?}\n\nThis is likely a bug.")]
    Io(#[from] std::io::Error),

    #[error("Internal Error: {0:#}")]
    Other(#[from] anyhow::Error),
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::System(SystemError::Io(e))
    }
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::System(SystemError::Other(e))
    }
}
