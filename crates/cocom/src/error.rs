//! Error types raised by the Rust-side API.
//!
//! Nothing here crosses the binary interface; vtable slots only ever report
//! [`HResult`](crate::HResult) codes.

use backtrace::Backtrace as CallStack;
use thiserror::Error;

/// Failure to parse the canonical GUID text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuidParseError {
    #[error("expected 36 characters, found {found}")]
    InvalidLength { found: usize },

    #[error("expected '-' at position {position}")]
    MissingDash { position: usize },

    #[error("invalid hex digit 0x{found:02x} at position {position}")]
    InvalidDigit { position: usize, found: u8 },
}

/// Raised when a null [`StrongRef`](crate::StrongRef) is dereferenced.
///
/// Captures the call stack at the point of failure.
#[derive(Debug, Error)]
#[error("dereferenced a null reference to {interface}\n{trace:?}")]
pub struct NullPointerError {
    interface: &'static str,
    trace: CallStack,
}

impl NullPointerError {
    #[cold]
    pub fn new(interface: &'static str) -> Self {
        Self {
            interface,
            trace: CallStack::new(),
        }
    }

    /// Name of the interface the null reference was typed as.
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn backtrace(&self) -> &CallStack {
        &self.trace
    }
}
