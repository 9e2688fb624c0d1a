use std::borrow::Cow;

/// Stable, string-matchable tag for a [`ConnectorError`], independent of the
/// human-readable message. Mirrors the `short_msg`/`ErrorCode` split in the
/// teacher crate's error taxonomy, trimmed of the HTTP/gRPC/Sentry wire
/// mapping that isn't part of this core (§7). `Serialize` lets a caller log
/// or surface this tag as structured data rather than parsing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ServiceTypeNotSupported,
    ServiceTypeNotConfigured,
    DataSourceError,
    ConnectorUpdateError,
    InvalidFiltering,
    Transport,
    ConflictExhausted,
    Cancelled,
    AdapterError,
    NotFound,
    InvalidQuery,
}

impl ErrorCode {
    /// Whether retrying the operation that produced this error is plausible.
    ///
    /// Only Gateway writes (`ConflictExhausted`) and adapter transport calls
    /// (`Transport`) are retried anywhere in this crate (§7); every other
    /// kind is terminal for the operation that raised it.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorCode::Transport | ErrorCode::ConflictExhausted)
    }
}

/// The error taxonomy surfaced by the core (§7). Every fallible operation in
/// this workspace returns `anyhow::Result`, with the leaf error attached via
/// `.context(ConnectorError { .. })` so call sites can match on `code()`
/// without parsing message text, attaching a structured `ErrorMetadata`-like
/// value to an `anyhow::Error` chain rather than a bare string.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[error("{message}")]
pub struct ConnectorError {
    pub code: ErrorCode,
    pub message: Cow<'static, str>,
}

impl ConnectorError {
    pub fn new(code: ErrorCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn service_type_not_supported(service_type: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::ServiceTypeNotSupported,
            format!("Service type `{service_type}` is not supported"),
        )
    }

    pub fn service_type_not_configured() -> Self {
        Self::new(
            ErrorCode::ServiceTypeNotConfigured,
            "Service type is not configured.",
        )
    }

    pub fn data_source_error(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::DataSourceError, format!("{detail}"))
    }

    pub fn connector_update_error(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::ConnectorUpdateError, format!("{detail}"))
    }

    pub fn invalid_filtering(state: impl std::fmt::Display, errors: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::InvalidFiltering,
            format!("Filtering in state {state}, errors: {errors}."),
        )
    }

    pub fn conflict_exhausted(id: impl std::fmt::Display, attempts: u32) -> Self {
        Self::new(
            ErrorCode::ConflictExhausted,
            format!("Gave up updating `{id}` after {attempts} conflicting writes"),
        )
    }

    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("No document with id `{id}`"))
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorCode::Cancelled, "Operation was cancelled")
    }

    pub fn adapter_error(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::AdapterError, format!("{detail}"))
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}
