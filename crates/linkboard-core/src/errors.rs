//! Protocol and parse errors.
//!
//! These never escape a dispatch loop: callers log them and drop the
//! offending input.

use thiserror::Error;

/// A push-channel payload that failed validation.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload was not a JSON object.
    #[error("{event} payload is not an object")]
    NotAnObject {
        /// Event name.
        event: String,
    },

    /// A field had the wrong type or a required field was missing.
    #[error("{event} payload failed to decode: {source}")]
    Decode {
        /// Event name.
        event: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },

    /// A connection field carried a value other than `Connected` / `Disconnected`.
    #[error("unknown state {value:?} in field {field}")]
    UnknownState {
        /// Wire field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// The balance was NaN or infinite.
    #[error("balance is not a finite number")]
    NonFiniteBalance,
}

/// A cross-tab relay envelope that failed validation.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The raw value was not valid envelope JSON.
    #[error("malformed relay envelope: {0}")]
    Decode(#[from] serde_json::Error),

    /// The origin session ID was empty.
    #[error("relay envelope has an empty sessionId")]
    MissingOrigin,

    /// A connection field carried an unusable value.
    #[error("relay envelope payload invalid: {0}")]
    Payload(#[from] PayloadError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_an_object_display() {
        let err = PayloadError::NotAnObject {
            event: "status_update".into(),
        };
        assert_eq!(err.to_string(), "status_update payload is not an object");
    }

    #[test]
    fn unknown_state_display() {
        let err = PayloadError::UnknownState {
            field: "mqtt_status",
            value: "Maybe".into(),
        };
        assert!(err.to_string().contains("mqtt_status"));
        assert!(err.to_string().contains("Maybe"));
    }

    #[test]
    fn envelope_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: EnvelopeError = json_err.into();
        assert!(matches!(err, EnvelopeError::Decode(_)));
    }

    #[test]
    fn envelope_from_payload_error() {
        let err: EnvelopeError = PayloadError::NonFiniteBalance.into();
        assert!(err.to_string().contains("finite"));
    }
}
