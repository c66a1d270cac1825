use thiserror::Error;

/// Crate-wide error type.
///
/// Authentication failures are typed so callers can distinguish "ask the user
/// again" from "the server is broken": a declined prompt, a rejected retry, a
/// digest response-validation mismatch and an exhausted attempt bound are all
/// distinct variants, never a generic failure. The original HTTP status and
/// the last challenge line are preserved on the variants where a caller may
/// want to surface them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetError {
    // Connection errors, raised by Transport implementations.
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Name not resolved")]
    NameNotResolved,

    // HTTP errors.
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("Invalid redirect")]
    InvalidRedirect,
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response")]
    InvalidResponse,
    #[error("Empty response")]
    EmptyResponse,

    // Authentication errors.
    /// The interactive prompt was declined or yielded no credentials.
    #[error("Authentication declined by user (HTTP {status})")]
    AuthenticationDeclined { status: u16, challenge: String },

    /// The server rejected a freshly acquired credential with an identical
    /// challenge; retrying again cannot make progress.
    #[error("Authentication rejected by server (HTTP {status})")]
    AuthenticationRejected { status: u16, challenge: String },

    /// A multi-round negotiated handshake failed mid-exchange.
    #[error("Negotiated authentication failed: {detail}")]
    NegotiationFailed { detail: String },

    /// `Authentication-Info`/`Proxy-Authentication-Info` carried an `rspauth`
    /// that does not match the expected digest. Always fatal.
    #[error("Digest response authentication mismatch")]
    ResponseAuthMismatch,

    #[error("Unsupported auth scheme")]
    UnsupportedAuthScheme,
    #[error("Missing auth credentials")]
    MissingAuthCredentials,

    /// The combined redirect/auth-retry bound was exhausted.
    #[error("Too many retries")]
    TooManyRetries,

    /// CONNECT did not yield success. The proxy's status line is kept for
    /// diagnostics.
    #[error("Unable to tunnel through proxy. Proxy returns {status_line:?}")]
    TunnelConnectionFailed { status_line: String },
}

impl NetError {
    /// True for errors that terminate an authentication sequence: the caller
    /// should surface these rather than re-drive the request.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            NetError::AuthenticationDeclined { .. }
                | NetError::AuthenticationRejected { .. }
                | NetError::NegotiationFailed { .. }
                | NetError::ResponseAuthMismatch
        )
    }
}
