use thiserror::Error;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Dataverse authentication failed with status {status}: {message}")]
    UpstreamAuth { status: u16, message: String },

    #[error(
        "Dataverse request failed with status {status}: {message}{}",
        .query.as_ref().map(|q| format!(" [query: {q}]")).unwrap_or_default()
    )]
    UpstreamQuery {
        status: u16,
        message: String,
        query: Option<String>,
    },

    #[error("Export error: {0}")]
    Export(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

}

impl Error {
    /// Attaches the compiled OData query to an upstream query failure.
    /// Other variants pass through untouched.
    pub fn with_query(self, compiled: &str) -> Self {
        match self {
            Error::UpstreamQuery {
                status,
                message,
                query: None,
            } => Error::UpstreamQuery {
                status,
                message,
                query: Some(compiled.to_string()),
            },
            other => other,
        }
    }

    /// True for failures that originate on the Dataverse side of the wire.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::UpstreamAuth { .. } | Error::UpstreamQuery { .. } | Error::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_query_display_includes_query() {
        let err = Error::UpstreamQuery {
            status: 400,
            message: "Could not find a property named 'nme'".to_string(),
            query: None,
        }
        .with_query("?$count=true&$filter=nme eq 'x'");

        assert_eq!(
            err.to_string(),
            "Dataverse request failed with status 400: Could not find a property named 'nme' [query: ?$count=true&$filter=nme eq 'x']"
        );
    }

    #[test]
    fn test_with_query_leaves_other_variants() {
        let err = Error::NotFound("environment".into()).with_query("?$top=1");
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!err.is_upstream());
    }
}
