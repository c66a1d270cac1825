//! Collaborator seams: the wire transport and the interactive prompt.
//!
//! The engine never touches sockets. A [`Transport`] owns connections,
//! proxies, TLS and body streams; the authenticator only sees status lines
//! and headers, and hands back header mutations and CONNECT requests.

use crate::auth::credential::{PasswordCredentials, ProtectionSpace};
use crate::base::neterror::NetError;
use http::{HeaderMap, Method, StatusCode};
use url::Url;

/// The request as the authenticator sees it: method, target, headers. The
/// body (if any) stays with the transport and must be replayable across
/// retries.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
}

impl AuthRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// The origin-form request target (`/path?query`) used as the digest
    /// URI.
    pub fn request_uri(&self) -> String {
        let mut uri = self.url.path().to_string();
        if uri.is_empty() {
            uri.push('/');
        }
        if let Some(q) = self.url.query() {
            uri.push('?');
            uri.push_str(q);
        }
        uri
    }

    /// The `host:port` target of a CONNECT request for this URL.
    pub fn connect_uri(&self) -> Result<String, NetError> {
        let host = self.url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = self.url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        Ok(format!("{}:{}", host, port))
    }
}

/// The response as the authenticator sees it. The body stream stays with the
/// transport; `status_line` is kept verbatim for tunnel diagnostics.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub status: StatusCode,
    pub status_line: String,
    pub headers: HeaderMap,
}

impl AuthResponse {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        let status_line = format!(
            "HTTP/1.1 {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        );
        Self {
            status,
            status_line,
            headers,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn is_proxy_auth_required(&self) -> bool {
        self.status == StatusCode::PROXY_AUTHENTICATION_REQUIRED
    }
}

/// Blocking wire transport. Implementations own connection reuse; the
/// authenticator tells them when a connection must be dropped so the next
/// round trip reconnects.
pub trait Transport {
    /// Send the request (via the configured proxy if any) and read status
    /// plus headers.
    fn round_trip(&mut self, request: &AuthRequest) -> Result<AuthResponse, NetError>;

    /// Whether reaching `url` needs a CONNECT tunnel through the proxy.
    fn requires_tunnel(&self, url: &Url) -> bool;

    /// Issue a CONNECT for `host:port` with the given headers. A success
    /// response means the tunnel is up and subsequent round trips use it.
    fn connect_tunnel(
        &mut self,
        host: &str,
        port: u16,
        headers: &HeaderMap,
    ) -> Result<AuthResponse, NetError>;

    /// The proxy endpoint in use, if any.
    fn proxy_address(&self) -> Option<(String, u16)>;

    /// Drop the current connection; the next round trip reconnects.
    fn disconnect(&mut self);
}

/// Interactive credential acquisition. Implementations may pop a dialog,
/// read a keyring, or consult configuration; returning `None` means the
/// prompt was declined.
pub trait CredentialPrompt: Send + Sync {
    fn request_credentials(&self, space: &ProtectionSpace) -> Option<PasswordCredentials>;
}
