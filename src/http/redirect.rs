//! Redirect classification and the follow/stop policy seam.

use crate::http::transport::AuthResponse;
use http::StatusCode;
use url::Url;

/// True for the status codes that trigger redirect handling: 300–307 except
/// 304 (not modified) and 306 (unused).
pub fn is_redirect(status: StatusCode) -> bool {
    let code = status.as_u16();
    (300..=307).contains(&code) && code != 304 && code != 306
}

/// Resolve the `Location` header against the current URL. Returns `None`
/// when the header is absent or unparsable.
pub fn redirect_target(response: &AuthResponse, base: &Url) -> Option<Url> {
    let location = response.headers.get(http::header::LOCATION)?.to_str().ok()?;
    base.join(location).ok()
}

/// Same-origin, hop-count and header-stripping rules live outside this core;
/// the state machine only asks "should this redirect be followed".
pub trait RedirectPolicy: Send + Sync {
    fn should_follow(&self, from: &Url, to: &Url, status: StatusCode) -> bool;
}

/// The conservative default when no policy is injected: follow only within
/// the same scheme, host and port.
pub struct SameOriginPolicy;

impl RedirectPolicy for SameOriginPolicy {
    fn should_follow(&self, from: &Url, to: &Url, _status: StatusCode) -> bool {
        from.scheme() == to.scheme()
            && from.host_str() == to.host_str()
            && from.port_or_known_default() == to.port_or_known_default()
    }
}
