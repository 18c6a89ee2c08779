//! Error types for the signal proxy.

use compact_str::CompactString;

/// Errors surfaced by subscription and dispatch operations.
///
/// Unsubscribing never produces an error; unknown events and unknown
/// listeners are treated as no-ops there.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// The event name was empty
    #[error("Invalid event name: event names must be non-empty")]
    InvalidEventName,
    /// The native source does not declare this signal
    #[error("Unknown event '{event}' on object '{object}'")]
    UnknownEvent {
        object: CompactString,
        event: CompactString,
    },
    /// The native source refused the connection for another reason
    #[error("Native registration of '{event}' failed: {reason}")]
    RegistrationFailed { event: CompactString, reason: String },
    /// A subscription list for this event already exists with another payload shape
    #[error("Payload mismatch on '{event}': subscribed as {existing}, requested {requested}")]
    PayloadMismatch {
        event: CompactString,
        existing: &'static str,
        requested: &'static str,
    },
    /// Native arguments did not match the payload arity
    #[error("Argument count mismatch on '{event}': expected {expected}, got {got}")]
    ArgumentCount {
        event: CompactString,
        expected: usize,
        got: usize,
    },
    /// A native argument could not be converted to the parameter type
    #[error("Argument {index} of '{event}' could not be decoded: {source}")]
    ArgumentDecode {
        event: CompactString,
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    /// A typed payload could not be converted to native arguments
    #[error("Payload encoding failed: {0}")]
    PayloadEncode(#[from] serde_json::Error),
}

impl SignalError {
    /// Returns true for errors raised by the native registration step.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            SignalError::UnknownEvent { .. } | SignalError::RegistrationFailed { .. }
        )
    }
}
