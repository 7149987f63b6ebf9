use crate::api;

/// Every fallible client operation returns this
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Api(#[from] api::Error),

    #[error("authentication required")]
    AuthenticationRequired,

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    /// The write went through; only fetching the result again failed
    #[error("posted, but reloading the replies failed: {0}")]
    RefreshFailed(#[source] Box<Error>),

    #[error("session storage: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(what: String) -> Error {
        Error::Api(api::Error::NotFound(what))
    }

    /// Whether the server refused the session token
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, Error::Api(e) if e.is_auth_rejection())
    }
}
