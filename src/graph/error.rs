use thiserror::Error;

/// Failures of the graph-retrieval collaborator, surfaced after bounded retries.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The backend does not offer this operation (e.g. no native search).
    #[error("operation unavailable: {0}")]
    Unavailable(String),

    #[error("graph API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected graph payload: {0}")]
    Decode(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display() {
        let err = RetrievalError::Api {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(err.to_string(), "graph API error (status 503): maintenance");
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RetrievalError>();
    }
}
