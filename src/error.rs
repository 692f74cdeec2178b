/// Sol-Ark Cloud client errors.
///
/// Both variants carry an [`anyhow::Error`] chain, so render them with `{:#}`
/// to see the underlying cause.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credentials were rejected, or the client gave up on authenticating.
    ///
    /// Not retried automatically: the user has to fix the credentials.
    #[error("Sol-Ark Cloud authentication failed: {0:#}")]
    Auth(anyhow::Error),

    /// Network failure, unexpected status, or an unsupported response shape.
    #[error("Sol-Ark Cloud API call failed: {0:#}")]
    Api(anyhow::Error),
}

impl Error {
    #[must_use]
    pub const fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Anything not explicitly classified as an authentication failure is an API failure.
impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::Api(error)
    }
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
