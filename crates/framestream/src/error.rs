// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by framestream operations.

/// Errors returned by framestream operations.
///
/// Runtime anomalies on the worker loops (transport read errors, short ack
/// packets, efficiency overflow) are logged and recovered from; they never
/// surface through this enum. Only API misuse and backpressure do.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Parameter errors
    // ========================================================================
    /// Invalid argument (empty frame, zero queue capacity, unknown channel).
    BadParameters(String),
    /// Frame exceeds `MAX_FRAME_SIZE` and cannot be fragmented.
    FrameTooLarge(usize),

    // ========================================================================
    // Backpressure / lifecycle
    // ========================================================================
    /// Pending-frame queue is full; the producer keeps ownership of the
    /// frame and may retry.
    QueueFull,
    /// Lifecycle misuse: worker loops are still running (join before stop,
    /// or double start).
    Busy,

    // ========================================================================
    // Resources / transport
    // ========================================================================
    /// Resource exhaustion during construction or thread spawn.
    ResourceExhausted(String),
    /// I/O error from the underlying transport.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::BadParameters(msg) => write!(f, "Bad parameters: {}", msg),
            Error::FrameTooLarge(size) => write!(
                f,
                "Frame of {} bytes exceeds maximum frame size of {} bytes",
                size,
                crate::wire::MAX_FRAME_SIZE
            ),
            Error::QueueFull => write!(f, "Pending-frame queue is full"),
            Error::Busy => write!(f, "Worker loops are still running"),
            Error::ResourceExhausted(msg) => write!(f, "Resource exhausted: {}", msg),
            Error::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(Error::QueueFull.to_string(), "Pending-frame queue is full");
        assert_eq!(
            Error::Busy.to_string(),
            "Worker loops are still running"
        );
        assert!(Error::BadParameters("empty frame".into())
            .to_string()
            .contains("empty frame"));
        assert!(Error::FrameTooLarge(200_000).to_string().contains("200000"));
    }

    #[test]
    fn test_io_source_chain() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        let source = std::error::Error::source(&err);
        assert!(source.is_some());
    }
}
