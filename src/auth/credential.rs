//! Protection spaces and the credential dispatch type.
//!
//! A protection space is the (scheme, host, port, realm) tuple identifying
//! resources that share one credential. Every credential is keyed under two
//! renderings of its space: realm-qualified (used after a challenge named the
//! realm) and realm-less (used for preemptive lookups before any challenge
//! has been seen).

use crate::auth::basic::BasicCredential;
use crate::auth::challenge::Challenge;
use crate::auth::digest::DigestCredential;
use crate::auth::negotiate::NegotiateCredential;
use crate::auth::scheme::AuthScheme;
use crate::base::neterror::NetError;
use url::Url;
use zeroize::Zeroizing;

/// A username/password pair from the interactive prompt. The password is
/// zeroized on drop.
#[derive(Debug, Clone)]
pub struct PasswordCredentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl PasswordCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

/// Identifies the set of resources sharing one authentication credential.
///
/// Invariants: `host` is lower-cased, `port` is resolved to the protocol
/// default when the URL leaves it unspecified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionSpace {
    pub is_proxy: bool,
    pub scheme: AuthScheme,
    /// URL scheme for server spaces; empty for proxy spaces.
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub realm: Option<String>,
    pub authenticator_id: String,
}

impl ProtectionSpace {
    /// Protection space for an origin-server challenge.
    pub fn for_server(
        url: &Url,
        scheme: AuthScheme,
        realm: Option<String>,
        authenticator_id: &str,
    ) -> Result<Self, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?.to_lowercase();
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        Ok(Self {
            is_proxy: false,
            scheme,
            protocol: url.scheme().to_string(),
            host,
            port,
            realm,
            authenticator_id: authenticator_id.to_string(),
        })
    }

    /// Protection space for a proxy challenge. Proxies are not qualified by
    /// the target protocol.
    pub fn for_proxy(
        host: &str,
        port: u16,
        scheme: AuthScheme,
        realm: Option<String>,
        authenticator_id: &str,
    ) -> Self {
        Self {
            is_proxy: true,
            scheme,
            protocol: String::new(),
            host: host.to_lowercase(),
            port,
            realm,
            authenticator_id: authenticator_id.to_string(),
        }
    }

    /// Render the cache key. The realm-qualified rendering is used after a
    /// challenge; the realm-less one for preemptive lookups.
    pub fn cache_key(&self, include_realm: bool) -> String {
        let kind = if self.is_proxy { "p" } else { "s" };
        let mut key = format!(
            "{}:{}:{}:{}:{}:{}",
            kind,
            self.scheme.as_str(),
            self.authenticator_id,
            self.protocol,
            self.host,
            self.port
        );
        if include_realm {
            if let Some(realm) = &self.realm {
                key.push(':');
                key.push_str(realm);
            }
        }
        key
    }

    /// The realm-less rendering, independent of scheme: used to find *any*
    /// preemptively usable credential for a host before a challenge names
    /// the scheme.
    pub fn location_key(&self) -> String {
        let kind = if self.is_proxy { "p" } else { "s" };
        format!(
            "{}:{}:{}:{}:{}",
            kind, self.authenticator_id, self.protocol, self.host, self.port
        )
    }
}

/// Trim a URL path to its containing "directory": the last segment is
/// dropped only when it looks like a file (carries a `.` after the last
/// `/`). An empty path becomes `/`.
pub fn reduce_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let sep = path.rfind('/');
    let dot = path.rfind('.');
    match (sep, dot) {
        (Some(s), Some(d)) if s < d => path[..s + 1].to_string(),
        _ => path.to_string(),
    }
}

/// Walk two normalized paths segment-wise from the left and truncate at the
/// first divergence, keeping the trailing `/`. `/a/b/` and `/a/c/` share the
/// root `/a/`.
pub fn common_root_path(a: &str, b: &str) -> String {
    let mut index = 0;
    let abytes = a.as_bytes();
    let bbytes = b.as_bytes();
    while index < abytes.len() && index < bbytes.len() && abytes[index] == bbytes[index] {
        index += 1;
    }
    match a[..index].rfind('/') {
        Some(slash) => a[..slash + 1].to_string(),
        None => "/".to_string(),
    }
}

/// A cached credential, polymorphic over the scheme families.
///
/// Credentials are never mutated structurally: path widening and realm
/// changes clone into a replacement (see [`Credential::with_path`]). Digest
/// credentials share their [`crate::auth::digest::DigestParameters`] across
/// clones, so nonce counts stay strictly increasing across paths.
#[derive(Debug, Clone)]
pub enum Credential {
    Basic(BasicCredential),
    Digest(DigestCredential),
    Negotiate(NegotiateCredential),
}

impl Credential {
    pub fn scheme(&self) -> AuthScheme {
        match self {
            Credential::Basic(_) => AuthScheme::Basic,
            Credential::Digest(_) => AuthScheme::Digest,
            Credential::Negotiate(c) => c.scheme(),
        }
    }

    pub fn space(&self) -> &ProtectionSpace {
        match self {
            Credential::Basic(c) => c.space(),
            Credential::Digest(c) => c.space(),
            Credential::Negotiate(c) => c.space(),
        }
    }

    /// The narrowest URL path prefix this credential is known valid for.
    pub fn path(&self) -> &str {
        match self {
            Credential::Basic(c) => c.path(),
            Credential::Digest(c) => c.path(),
            Credential::Negotiate(c) => c.path(),
        }
    }

    /// Replacement clone with a different path.
    pub fn with_path(&self, path: String) -> Credential {
        match self {
            Credential::Basic(c) => Credential::Basic(c.with_path(path)),
            Credential::Digest(c) => Credential::Digest(c.with_path(path)),
            Credential::Negotiate(c) => Credential::Negotiate(c.with_path(path)),
        }
    }

    /// The request header this credential answers.
    pub fn header_name(&self) -> &'static str {
        if self.space().is_proxy {
            "proxy-authorization"
        } else {
            "authorization"
        }
    }

    /// Compute the header value for a request. Digest credentials consume a
    /// nonce count per call.
    pub fn header_value(&self, uri: &str, method: &str) -> Result<String, NetError> {
        match self {
            Credential::Basic(c) => Ok(c.header_value().to_string()),
            Credential::Digest(c) => Ok(c.header_value(uri, method)),
            Credential::Negotiate(c) => c.first_header_value(),
        }
    }

    /// Whether the scheme may be sent before any challenge is seen.
    pub fn supports_preemptive(&self) -> bool {
        match self {
            Credential::Basic(_) => true,
            Credential::Digest(_) => true,
            Credential::Negotiate(c) => c.supports_preemptive(),
        }
    }

    /// Stale-but-revivable check. A Digest challenge with `stale=true` and a
    /// fresh nonce updates the shared parameters and reports `true`: retry
    /// with the same identity, no re-prompt. Everything else is `false` —
    /// for Basic a 401 against existing credentials always means drop and
    /// re-prompt.
    pub fn try_revive(&self, challenge: &Challenge) -> bool {
        match self {
            Credential::Digest(c) => c.try_revive(challenge),
            _ => false,
        }
    }

    /// Path-prefix match: a stored path matches any request path it
    /// prefixes.
    pub fn matches_path(&self, request_path: &str) -> bool {
        request_path.starts_with(self.path())
    }
}
