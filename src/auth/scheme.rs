//! Authentication scheme model, engine configuration and scheme selection.

use crate::auth::challenge::ChallengeSet;
use crate::auth::negotiate::{NegotiateSupportCache, NegotiatedSchemeProvider};
use std::collections::HashSet;

/// Authentication scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScheme {
    /// Basic authentication (base64 encoded)
    Basic,
    /// Digest authentication (challenge-response)
    Digest,
    /// NTLM (opaque multi-round handshake)
    Ntlm,
    /// SPNEGO Negotiate (Kerberos/NTLM via external provider)
    Negotiate,
    /// Raw Kerberos
    Kerberos,
    /// Anything else offered by the server
    Unknown,
}

impl AuthScheme {
    /// The canonical wire spelling of the scheme name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthScheme::Basic => "Basic",
            AuthScheme::Digest => "Digest",
            AuthScheme::Ntlm => "NTLM",
            AuthScheme::Negotiate => "Negotiate",
            AuthScheme::Kerberos => "Kerberos",
            AuthScheme::Unknown => "Unknown",
        }
    }

    /// Parse a scheme name, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else if name.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else if name.eq_ignore_ascii_case("ntlm") {
            AuthScheme::Ntlm
        } else if name.eq_ignore_ascii_case("negotiate") {
            AuthScheme::Negotiate
        } else if name.eq_ignore_ascii_case("kerberos") {
            AuthScheme::Kerberos
        } else {
            AuthScheme::Unknown
        }
    }

    /// True for schemes delegated to the external provider.
    pub fn is_negotiated(&self) -> bool {
        matches!(
            self,
            AuthScheme::Ntlm | AuthScheme::Negotiate | AuthScheme::Kerberos
        )
    }
}

/// Which challenge direction/context is being answered. Plain proxying and
/// CONNECT tunneling carry different disabled-scheme sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeContext {
    /// 401 from the origin server.
    Server,
    /// 407 from a forwarding proxy.
    Proxy,
    /// 407 while setting up a CONNECT tunnel.
    Tunnel,
}

/// Engine configuration. Passed explicitly into the selector and the
/// authenticator; there is no package-level mutable state.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Scheme to honor above the built-in priority when the server offers it.
    pub preferred_scheme: Option<AuthScheme>,
    /// Schemes never used to answer a plain-proxy 407.
    pub disabled_proxy_schemes: HashSet<AuthScheme>,
    /// Schemes never used to answer a 407 during CONNECT setup. Basic is
    /// disabled here by default: tunnel credentials would otherwise travel in
    /// the clear before TLS is up.
    pub disabled_tunnel_schemes: HashSet<AuthScheme>,
    /// Combined bound on redirects plus auth retries.
    pub max_attempts: usize,
    /// Validate `Authentication-Info` rspauth on Digest-authenticated
    /// responses.
    pub validate_server: bool,
    /// Validate `Proxy-Authentication-Info` likewise.
    pub validate_proxy: bool,
    /// Quote `algorithm`/`qop` in Digest authorization headers, for servers
    /// that reject the unquoted (conformant) form.
    pub quote_digest_params: bool,
    /// Follow 3xx redirects.
    pub follow_redirects: bool,
    /// Distinguishes credentials acquired through different prompt
    /// identities sharing one store.
    pub authenticator_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        let mut disabled_tunnel_schemes = HashSet::new();
        disabled_tunnel_schemes.insert(AuthScheme::Basic);
        Self {
            preferred_scheme: None,
            disabled_proxy_schemes: HashSet::new(),
            disabled_tunnel_schemes,
            max_attempts: 20,
            validate_server: false,
            validate_proxy: false,
            quote_digest_params: false,
            follow_redirects: true,
            authenticator_id: "default".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred scheme.
    pub fn with_preference(mut self, scheme: AuthScheme) -> Self {
        self.preferred_scheme = Some(scheme);
        self
    }

    /// Replace the attempt bound.
    pub fn with_max_attempts(mut self, bound: usize) -> Self {
        self.max_attempts = bound;
        self
    }

    /// Disable a scheme for plain proxying.
    pub fn disable_proxy_scheme(mut self, scheme: AuthScheme) -> Self {
        self.disabled_proxy_schemes.insert(scheme);
        self
    }

    /// Disable a scheme for CONNECT tunneling.
    pub fn disable_tunnel_scheme(mut self, scheme: AuthScheme) -> Self {
        self.disabled_tunnel_schemes.insert(scheme);
        self
    }

    /// The disabled-scheme set for a challenge context. Server challenges
    /// have none.
    pub fn disabled_schemes(&self, context: ChallengeContext) -> Option<&HashSet<AuthScheme>> {
        match context {
            ChallengeContext::Server => None,
            ChallengeContext::Proxy => Some(&self.disabled_proxy_schemes),
            ChallengeContext::Tunnel => Some(&self.disabled_tunnel_schemes),
        }
    }
}

/// Strict fallback priority: negotiated schemes first, Basic last.
const PRIORITY: [AuthScheme; 5] = [
    AuthScheme::Negotiate,
    AuthScheme::Kerberos,
    AuthScheme::Digest,
    AuthScheme::Ntlm,
    AuthScheme::Basic,
];

/// Picks exactly one scheme to pursue out of a parsed challenge set.
pub struct SchemeSelector<'a> {
    config: &'a AuthConfig,
    provider: Option<&'a dyn NegotiatedSchemeProvider>,
    support: &'a NegotiateSupportCache,
}

impl<'a> SchemeSelector<'a> {
    pub fn new(
        config: &'a AuthConfig,
        provider: Option<&'a dyn NegotiatedSchemeProvider>,
        support: &'a NegotiateSupportCache,
    ) -> Self {
        Self {
            config,
            provider,
            support,
        }
    }

    /// Select a scheme for `challenges` against `host`.
    ///
    /// `dont_use_negotiate` is set when a prior Negotiate/Kerberos round in
    /// this authentication sequence already failed; it forces fallback for
    /// this selection only. Support-query results are memoized per host for
    /// the process lifetime, independent of round failures.
    pub fn select(
        &self,
        challenges: &ChallengeSet,
        host: &str,
        context: ChallengeContext,
        dont_use_negotiate: bool,
    ) -> Option<AuthScheme> {
        if let Some(pref) = self.config.preferred_scheme {
            if self.usable(pref, challenges, host, context, dont_use_negotiate) {
                tracing::debug!(scheme = pref.as_str(), "honoring configured auth preference");
                return Some(pref);
            }
        }

        for scheme in PRIORITY {
            if self.usable(scheme, challenges, host, context, dont_use_negotiate) {
                tracing::debug!(scheme = scheme.as_str(), host, "selected auth scheme");
                return Some(scheme);
            }
        }
        tracing::debug!(host, "no usable auth scheme among challenges");
        None
    }

    fn usable(
        &self,
        scheme: AuthScheme,
        challenges: &ChallengeSet,
        host: &str,
        context: ChallengeContext,
        dont_use_negotiate: bool,
    ) -> bool {
        if !challenges.contains(scheme.as_str()) {
            return false;
        }
        if let Some(disabled) = self.config.disabled_schemes(context) {
            if disabled.contains(&scheme) {
                return false;
            }
        }
        if scheme.is_negotiated() {
            if dont_use_negotiate && scheme != AuthScheme::Ntlm {
                return false;
            }
            let provider = match self.provider {
                Some(p) => p,
                None => return false,
            };
            return self.support.supported(provider, scheme, host);
        }
        true
    }
}
