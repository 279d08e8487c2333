//! # Error Handling
//!
//! Error types for the capture orchestration pipeline, organized around how
//! each failure class is allowed to propagate:
//!
//! - **Setup / Render** errors terminate the owning capture session (the
//!   render context is restored first, then the error is reported).
//! - **Readback** errors are recoverable per frame: the pipeline falls back
//!   to the synchronous capture path and the session continues.
//! - **Stitch / Encode** errors are reported and skipped; nothing is
//!   published for that cycle and the session continues.
//!
//! Classification lives on the error itself (`HasSeverity`, `Recoverable`) so
//! the schedulers can decide between aborting a session and riding through a
//! single bad frame without matching on variants at every call site.
//!
//! ## Usage
//!
//! ```rust
//! use cubemap_capture::error::{CaptureError, Recoverable};
//!
//! let error = CaptureError::readback("map", "transfer buffer mapping failed");
//! assert!(error.is_recoverable());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational conditions reported for visibility only
    Info,
    /// Conditions that degrade a single frame or cycle
    Warning,
    /// Errors that affect operation but leave the session alive
    Error,
    /// Errors that terminate the owning capture session
    Fatal,
}

/// Metadata attached to every error: when it happened, what was being done,
/// and how the caller is allowed to react.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional detail beyond the variant fields
    pub detail: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Whether the session may continue after this error
    pub recoverable: bool,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            detail: None,
            severity: ErrorSeverity::Error,
            recoverable: false,
        }
    }
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn recoverable(mut self) -> Self {
        self.recoverable = true;
        self
    }
}

/// Base error type for the capture pipeline
#[derive(Debug)]
pub enum CaptureError {
    /// No renderable scene/context exists to capture from
    Setup {
        reason: String,
        context: ErrorContext,
    },
    /// Failure inside a guarded render scope
    Render {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// GPU readback failure (copy, map, convert, or unmap phase)
    Readback {
        phase: String,
        reason: String,
        context: ErrorContext,
    },
    /// Cube-map assembly failure
    Stitch {
        reason: String,
        context: ErrorContext,
    },
    /// Image encoding failure
    Encode {
        kind: String,
        reason: String,
        context: ErrorContext,
    },
    /// A host capability call failed
    Host {
        call: String,
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// Invalid state transitions
    State {
        current_state: String,
        attempted_operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors (export writes, preview sockets)
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// Codec errors from the image crate
    Image {
        operation: String,
        source: image::ImageError,
        context: ErrorContext,
    },
    /// Resampling errors from the scale engine
    Scale {
        source: pano_scale::ScaleError,
        context: ErrorContext,
    },
}

impl CaptureError {
    /// Create a setup error (session never starts)
    pub fn setup(reason: impl Into<String>) -> Self {
        Self::Setup {
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a render error (session aborts, context restored)
    pub fn render(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Render {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new().with_severity(ErrorSeverity::Fatal),
        }
    }

    /// Create a readback error (recoverable, slow-path fallback)
    pub fn readback(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Readback {
            phase: phase.into(),
            reason: reason.into(),
            context: ErrorContext::new()
                .with_severity(ErrorSeverity::Warning)
                .recoverable(),
        }
    }

    /// Create a stitch error (recoverable, cycle skipped)
    pub fn stitch(reason: impl Into<String>) -> Self {
        Self::Stitch {
            reason: reason.into(),
            context: ErrorContext::new().recoverable(),
        }
    }

    /// Create an encode error (recoverable, nothing published)
    pub fn encode(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Encode {
            kind: kind.into(),
            reason: reason.into(),
            context: ErrorContext::new().recoverable(),
        }
    }

    /// Create a host capability error
    pub fn host(call: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Host {
            call: call.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a state error
    pub fn state(
        current_state: impl Into<String>,
        attempted_operation: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::State {
            current_state: current_state.into(),
            attempted_operation: attempted_operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error with the path that was being touched
    pub fn io_at(
        operation: impl Into<String>,
        path: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.into()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Add free-form detail to the error
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.context_mut().detail = Some(detail.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Override the severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Mark as recoverable
    pub fn recoverable(mut self) -> Self {
        self.context_mut().recoverable = true;
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::Setup { context, .. } => context,
            Self::Render { context, .. } => context,
            Self::Readback { context, .. } => context,
            Self::Stitch { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Host { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Image { context, .. } => context,
            Self::Scale { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::Setup { context, .. } => context,
            Self::Render { context, .. } => context,
            Self::Readback { context, .. } => context,
            Self::Stitch { context, .. } => context,
            Self::Encode { context, .. } => context,
            Self::Host { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::State { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::Image { context, .. } => context,
            Self::Scale { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::Render { .. } => "render",
            Self::Readback { .. } => "readback",
            Self::Stitch { .. } => "stitch",
            Self::Encode { .. } => "encode",
            Self::Host { .. } => "host",
            Self::Config { .. } => "config",
            Self::State { .. } => "state",
            Self::Io { .. } => "io",
            Self::Image { .. } => "image",
            Self::Scale { .. } => "scale",
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup { reason, .. } => {
                write!(f, "Capture setup failed: {}", reason)
            }
            Self::Render { operation, reason, .. } => {
                write!(f, "Render failed during {}: {}", operation, reason)
            }
            Self::Readback { phase, reason, .. } => {
                write!(f, "Readback {} failed: {}", phase, reason)
            }
            Self::Stitch { reason, .. } => {
                write!(f, "Panorama stitch failed: {}", reason)
            }
            Self::Encode { kind, reason, .. } => {
                write!(f, "Encoding {} capture failed: {}", kind, reason)
            }
            Self::Host { call, reason, .. } => {
                write!(f, "Host call {} failed: {}", call, reason)
            }
            Self::Config { field, value, reason, .. } => {
                write!(f, "Invalid config {}={}: {}", field, value, reason)
            }
            Self::State {
                current_state,
                attempted_operation,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Cannot {} while {}: {}",
                    attempted_operation, current_state, reason
                )
            }
            Self::Io { operation, path, source, .. } => match path {
                Some(p) => write!(f, "I/O error during {} at {}: {}", operation, p, source),
                None => write!(f, "I/O error during {}: {}", operation, source),
            },
            Self::Image { operation, source, .. } => {
                write!(f, "Image codec error during {}: {}", operation, source)
            }
            Self::Scale { source, .. } => {
                write!(f, "Resample failed: {}", source)
            }
        }
    }
}

impl StdError for CaptureError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Image { source, .. } => Some(source),
            Self::Scale { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(source: std::io::Error) -> Self {
        Self::io("io operation", source)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(source: image::ImageError) -> Self {
        Self::Image {
            operation: "encode".to_string(),
            source,
            context: ErrorContext::new().recoverable(),
        }
    }
}

impl From<pano_scale::ScaleError> for CaptureError {
    fn from(source: pano_scale::ScaleError) -> Self {
        Self::Scale {
            source,
            context: ErrorContext::new().recoverable(),
        }
    }
}

/// Result alias for the capture pipeline
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Errors the session can survive, by falling back or skipping a cycle
pub trait Recoverable {
    fn is_recoverable(&self) -> bool;
}

impl Recoverable for CaptureError {
    fn is_recoverable(&self) -> bool {
        self.context().recoverable
    }
}

/// Severity classification for routing to the notifier vs the log
pub trait HasSeverity {
    fn severity(&self) -> ErrorSeverity;

    fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Fatal
    }
}

impl HasSeverity for CaptureError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_errors_are_fatal() {
        let err = CaptureError::setup("no scene loaded");
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
        assert_eq!(err.category(), "setup");
    }

    #[test]
    fn test_readback_errors_are_recoverable() {
        let err = CaptureError::readback("unmap", "device lost");
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
        assert_eq!(err.severity(), ErrorSeverity::Warning);
    }

    #[test]
    fn test_worker_errors_keep_session_alive() {
        assert!(CaptureError::stitch("missing face").is_recoverable());
        assert!(CaptureError::encode("panorama", "png writer").is_recoverable());
    }

    #[test]
    fn test_display_includes_variant_fields() {
        let err = CaptureError::render("face 3", "target lost");
        let text = format!("{}", err);
        assert!(text.contains("face 3"));
        assert!(text.contains("target lost"));

        let err = CaptureError::io_at(
            "export",
            "/tmp/out.png",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(format!("{}", err).contains("/tmp/out.png"));
    }

    #[test]
    fn test_scale_error_converts() {
        let scale_err = pano_scale::ScaleError::ZeroDimension;
        let err: CaptureError = scale_err.into();
        assert_eq!(err.category(), "scale");
        assert!(err.is_recoverable());
        assert!(err.source().is_some());
    }

    #[test]
    fn test_detail_builder_attaches() {
        let err = CaptureError::host("alloc_target", "out of memory").with_detail("1024x1024");
        assert_eq!(err.context().detail.as_deref(), Some("1024x1024"));
    }
}
