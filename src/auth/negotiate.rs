//! Negotiated authentication boundary (Negotiate/Kerberos/NTLM).
//!
//! The engine does not implement any negotiated mechanism's cryptography.
//! An externally supplied [`NegotiatedSchemeProvider`] produces per-exchange
//! [`NegotiateSession`]s; the engine only frames their opaque tokens as
//! base64 header values and feeds continuation blobs back in. Absence of a
//! provider simply removes these schemes from selection.

use crate::auth::credential::ProtectionSpace;
use crate::auth::scheme::AuthScheme;
use crate::base::neterror::NetError;
use base64::{engine::general_purpose, Engine as _};
use dashmap::DashMap;
use std::sync::{Arc, Mutex};

/// Externally supplied implementation of the negotiated scheme family.
pub trait NegotiatedSchemeProvider: Send + Sync {
    /// Whether the mechanism can authenticate against `host`. Consulted once
    /// per (scheme, host) and memoized by [`NegotiateSupportCache`].
    fn supports(&self, scheme: AuthScheme, host: &str) -> bool;

    /// Open a fresh handshake context against `host`.
    fn start(&self, scheme: AuthScheme, host: &str)
        -> Result<Box<dyn NegotiateSession>, NetError>;

    /// Whether credentials of this scheme may be replayed preemptively.
    /// Multi-round handshakes generally cannot.
    fn supports_preemptive(&self, _scheme: AuthScheme) -> bool {
        false
    }
}

/// One in-flight multi-round handshake.
pub trait NegotiateSession: Send {
    /// Produce the next client token. `input` is `None` for the first round
    /// and the server's decoded challenge blob afterwards.
    fn next_token(&mut self, input: Option<&[u8]>) -> Result<Vec<u8>, NetError>;

    /// True once the context is fully established.
    fn is_established(&self) -> bool;
}

/// Memoizes provider support queries per (scheme, host) for the process
/// lifetime. Deliberately independent of round-failure tracking: a host that
/// supports Negotiate but fails a round is still queried as "supported" and
/// handled by the selector's fallback flag instead.
#[derive(Default)]
pub struct NegotiateSupportCache {
    map: DashMap<(AuthScheme, String), bool>,
}

impl NegotiateSupportCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn supported(
        &self,
        provider: &dyn NegotiatedSchemeProvider,
        scheme: AuthScheme,
        host: &str,
    ) -> bool {
        *self
            .map
            .entry((scheme, host.to_lowercase()))
            .or_insert_with(|| provider.supports(scheme, host))
    }
}

/// A credential wrapping an in-flight negotiated handshake.
///
/// Clones share the session, so the retry loop and the cache observe the
/// same handshake state.
#[derive(Clone)]
pub struct NegotiateCredential {
    space: ProtectionSpace,
    path: String,
    scheme: AuthScheme,
    preemptive: bool,
    session: Arc<Mutex<Box<dyn NegotiateSession>>>,
}

impl std::fmt::Debug for NegotiateCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NegotiateCredential")
            .field("scheme", &self.scheme)
            .field("host", &self.space.host)
            .field("path", &self.path)
            .finish()
    }
}

impl NegotiateCredential {
    pub fn new(
        space: ProtectionSpace,
        path: String,
        scheme: AuthScheme,
        session: Box<dyn NegotiateSession>,
        preemptive: bool,
    ) -> Self {
        Self {
            space,
            path,
            scheme,
            preemptive,
            session: Arc::new(Mutex::new(session)),
        }
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    pub fn space(&self) -> &ProtectionSpace {
        &self.space
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn with_path(&self, path: String) -> Self {
        let mut clone = self.clone();
        clone.path = path;
        clone
    }

    pub fn supports_preemptive(&self) -> bool {
        self.preemptive
    }

    /// First-round header value: `<Scheme> <base64 token>`.
    pub fn first_header_value(&self) -> Result<String, NetError> {
        self.round(None)
    }

    /// Continuation header value from the server's raw challenge blob.
    pub fn continue_header_value(&self, input: &[u8]) -> Result<String, NetError> {
        self.round(Some(input))
    }

    pub fn is_established(&self) -> bool {
        self.session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_established()
    }

    fn round(&self, input: Option<&[u8]>) -> Result<String, NetError> {
        let token = self
            .session
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_token(input)?;
        Ok(format!(
            "{} {}",
            self.scheme.as_str(),
            general_purpose::STANDARD.encode(token)
        ))
    }
}
