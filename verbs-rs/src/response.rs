//! What handlers return and what the dispatcher reports.

use std::io::Write;

use crate::error::CliError;
use crate::CliResult;

/// Outcome of one dispatch: exit code plus what to print.
#[derive(Debug)]
pub struct Response {
    /// Process exit code (0 = success).
    pub exit_code: i32,

    pub output: Output,
}

impl Response {
    /// Successful response with text for stdout.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: Output::Text(content.into()),
        }
    }

    /// Successful response with no output.
    pub fn silent() -> Self {
        Self {
            exit_code: 0,
            output: Output::Silent,
        }
    }

    /// Response with only an exit code.
    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            output: Output::Silent,
        }
    }

    /// Failed response with a message for stderr.
    pub fn error(exit_code: i32, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: Output::Error(message.into()),
        }
    }

    /// Write the output to stdout or stderr.
    pub fn print(&self) {
        match &self.output {
            Output::Silent => {}
            Output::Text(s) | Output::Json(s) => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", s);
                let _ = out.flush();
            }
            Output::Error(s) => {
                let _ = writeln!(std::io::stderr().lock(), "{}", s);
            }
        }
    }
}

/// Output carried by a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// No output.
    Silent,

    /// Text for stdout.
    Text(String),

    /// Machine-readable JSON for stdout.
    Json(String),

    /// Error message for stderr.
    Error(String),
}

impl Output {
    pub fn is_empty(&self) -> bool {
        matches!(self, Output::Silent)
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Silent => Ok(()),
            Output::Text(s) | Output::Json(s) | Output::Error(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// Response Conversion Trait
// ============================================================================

/// Conversion from handler return values into responses.
///
/// Implemented for `()` (void), `i32` (exit code), text, JSON, `Response` and
/// `CliResult<T>`.
pub trait IntoResponse: Send + 'static {
    /// Whether this return shape carries no value.
    const IS_VOID: bool = false;

    fn into_response(self) -> Response;

    /// Split failures out so the dispatcher can log them and map the exit code.
    fn into_result(self) -> CliResult<Response>
    where
        Self: Sized,
    {
        Ok(self.into_response())
    }
}

impl IntoResponse for () {
    const IS_VOID: bool = true;

    fn into_response(self) -> Response {
        Response::silent()
    }
}

impl IntoResponse for i32 {
    fn into_response(self) -> Response {
        Response::exit(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response {
        Response::text(self)
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Response {
        Response {
            exit_code: 0,
            output: Output::Json(self.to_string()),
        }
    }
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl<T: IntoResponse> IntoResponse for CliResult<T> {
    const IS_VOID: bool = T::IS_VOID;

    fn into_response(self) -> Response {
        match self {
            Ok(value) => value.into_response(),
            Err(CliError::Cancelled) => Response::error(130, CliError::Cancelled.to_string()),
            Err(e) => Response::error(1, e.to_string()),
        }
    }

    fn into_result(self) -> CliResult<Response> {
        self.map(IntoResponse::into_response)
    }
}
