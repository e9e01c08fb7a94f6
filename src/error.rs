use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status, or no response at all (connect failure or
    /// timeout, `status` is `None`), from either the catalog or the store API
    #[error("{context} failed{}: {body}", status_suffix(.status))]
    Network {
        context: String,
        status: Option<u16>,
        body: String,
    },

    #[error("API authentication failed (HTTP {status}): {body}\n\n\
             Hint: The store API rejected the token.\n\
             Pass a valid token as the first argument, set ALTPUB_TOKEN,\n\
             or run: altpub config set auth.token <token>")]
    Auth { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Ledger file is corrupt: {0}")]
    LedgerCorrupt(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// HTTP status code carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Network { status, .. } => *status,
            Error::Auth { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_display() {
        let rejected = Error::Network {
            context: "Create app".to_string(),
            status: Some(422),
            body: "bundle_id taken".to_string(),
        };
        assert_eq!(rejected.to_string(), "Create app failed (HTTP 422): bundle_id taken");
        assert_eq!(rejected.status(), Some(422));

        let unreachable = Error::Network {
            context: "Download".to_string(),
            status: None,
            body: "request timed out".to_string(),
        };
        assert_eq!(unreachable.to_string(), "Download failed: request timed out");
        assert_eq!(unreachable.status(), None);
    }
}
