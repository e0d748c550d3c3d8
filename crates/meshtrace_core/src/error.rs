//! Error taxonomy for trace indexing and replay.
//!
//! Almost nothing here is fatal: malformed lines are skipped during the scan,
//! out-of-range seeks are clamped, empty range requests return empty results,
//! and stale prefetch results are discarded by generation check. What remains
//! is I/O failure, which is always retryable.

/// Result type for trace operations.
pub type TraceResult<T> = Result<T, TraceError>;

/// Error type for trace operations.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Reading the backing source failed. The scheduler treats a failed
    /// prefetch as "still missing" and retries on the next tick.
    #[error("trace I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let err = TraceError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(err.to_string().contains("gone"));
    }
}
