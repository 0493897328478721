use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApifyError>;

#[derive(Debug, Error)]
pub enum ApifyError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Apify API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unreadable Apify response: {0}")]
    Parse(String),

    #[error("Apify response is missing {0}")]
    MissingField(&'static str),
}

impl ApifyError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApifyError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Apify answers an abort of a run that already finished (or no longer
    /// exists) with 400 or 404.
    pub fn is_stale_abort(&self) -> bool {
        matches!(self.status(), Some(400 | 404))
    }
}

impl From<reqwest::Error> for ApifyError {
    fn from(err: reqwest::Error) -> Self {
        ApifyError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApifyError {
    fn from(err: serde_json::Error) -> Self {
        ApifyError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_abort_statuses() {
        let api = |status| ApifyError::Api {
            status,
            message: String::new(),
        };
        assert!(api(400).is_stale_abort());
        assert!(api(404).is_stale_abort());
        assert!(!api(500).is_stale_abort());
        assert!(!ApifyError::Network("reset".into()).is_stale_abort());
        assert_eq!(api(401).status(), Some(401));
    }
}
