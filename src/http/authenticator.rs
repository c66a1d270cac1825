//! The per-connection authentication state machine.
//!
//! Drives one logical request through proxy tunnel setup, preemptive
//! authorization, 401/407 challenge rounds and redirects, bounded by a
//! combined attempt count. Scheme selection, credential acquisition and
//! header computation are delegated to the `auth` modules; the wire itself
//! to the [`Transport`] collaborator.
//!
//! Exclusive access to the transport for the whole request/response cycle is
//! required by construction (`&mut`): a connection's state is single-writer.

use crate::auth::cache::CredentialStore;
use crate::auth::challenge::ChallengeSet;
use crate::auth::credential::{
    common_root_path, reduce_path, Credential, ProtectionSpace,
};
use crate::auth::digest::DigestCredential;
use crate::auth::negotiate::{NegotiateCredential, NegotiateSupportCache, NegotiatedSchemeProvider};
use crate::auth::scheme::{AuthConfig, AuthScheme, ChallengeContext, SchemeSelector};
use crate::auth::basic::BasicCredential;
use crate::base::neterror::NetError;
use crate::http::redirect::{is_redirect, redirect_target, RedirectPolicy, SameOriginPolicy};
use crate::http::transport::{AuthRequest, AuthResponse, CredentialPrompt, Transport};
use http::header::{
    HeaderName, AUTHORIZATION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, WWW_AUTHENTICATE,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::sync::Arc;

const AUTHENTICATION_INFO: HeaderName = HeaderName::from_static("authentication-info");
const PROXY_AUTHENTICATION_INFO: HeaderName = HeaderName::from_static("proxy-authentication-info");

/// Internal state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Connecting,
    AwaitingResponse,
    AuthChallenge,
    Redirect,
    Done,
}

/// Per-authentication-sequence bookkeeping, one instance per
/// [`RequestAuthenticator::authenticate`] call.
#[derive(Default)]
struct Sequence {
    /// A Negotiate/Kerberos server challenge was already seen once in this
    /// sequence without succeeding. A second bare occurrence forces fallback.
    in_negotiate: bool,
    in_negotiate_proxy: bool,
    /// A multi-round handshake is in flight; challenges are continuations.
    server_handshake: bool,
    proxy_handshake: bool,
    server_cred: Option<Credential>,
    proxy_cred: Option<Credential>,
    /// Verbatim challenge text of the previous round, for detecting a server
    /// that rejects a fresh credential with identical challenge state.
    last_server_challenge: Option<String>,
    last_proxy_challenge: Option<String>,
    /// The `domain` parameter of the answered Digest challenge, if any.
    server_domain: Option<String>,
    /// The request travels through a CONNECT tunnel. Proxy credentials then
    /// belong on the tunnel's header set only, never on the request itself.
    tunneling: bool,
    /// Headers set by the caller are never stripped or replaced.
    user_server_auth: bool,
    user_proxy_auth: bool,
}

/// Outcome of one challenge-handling pass.
enum Handled {
    /// A credential was applied; resend the request.
    Retry,
    /// Nothing can answer this challenge; surface the response as final.
    Surface,
}

/// Drives the retry/redirect/tunnel loop for requests against one transport.
pub struct RequestAuthenticator<'t, T: Transport> {
    transport: &'t mut T,
    store: Arc<CredentialStore>,
    config: AuthConfig,
    prompt: Option<Arc<dyn CredentialPrompt>>,
    provider: Option<Arc<dyn NegotiatedSchemeProvider>>,
    support: Arc<NegotiateSupportCache>,
    redirect_policy: Arc<dyn RedirectPolicy>,
}

impl<'t, T: Transport> RequestAuthenticator<'t, T> {
    pub fn new(transport: &'t mut T, store: Arc<CredentialStore>, config: AuthConfig) -> Self {
        Self {
            transport,
            store,
            config,
            prompt: None,
            provider: None,
            support: Arc::new(NegotiateSupportCache::new()),
            redirect_policy: Arc::new(SameOriginPolicy),
        }
    }

    /// Attach the interactive credential prompt.
    pub fn with_prompt(mut self, prompt: Arc<dyn CredentialPrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Attach the negotiated-scheme provider. Without one, Negotiate,
    /// Kerberos and NTLM never enter scheme selection.
    pub fn with_negotiate_provider(mut self, provider: Arc<dyn NegotiatedSchemeProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Share a support-query cache across authenticators, so each
    /// (scheme, host) pair is probed at most once per process.
    pub fn with_support_cache(mut self, support: Arc<NegotiateSupportCache>) -> Self {
        self.support = support;
        self
    }

    /// Replace the default same-origin redirect policy.
    pub fn with_redirect_policy(mut self, policy: Arc<dyn RedirectPolicy>) -> Self {
        self.redirect_policy = policy;
        self
    }

    /// Drive `request` to a final response, transparently answering 401/407
    /// challenges, establishing CONNECT tunnels and following redirects.
    ///
    /// Terminal authentication failures are surfaced as typed errors; a
    /// challenge nothing can answer surfaces the 401/407 response itself.
    pub fn authenticate(&mut self, request: AuthRequest) -> Result<AuthResponse, NetError> {
        let mut request = request;
        let mut seq = Sequence {
            user_server_auth: request.headers.contains_key(AUTHORIZATION),
            user_proxy_auth: request.headers.contains_key(PROXY_AUTHORIZATION),
            ..Sequence::default()
        };

        let mut state = State::Idle;
        let mut attempts = 0usize;
        let mut response: Option<AuthResponse> = None;

        loop {
            match state {
                State::Idle => {
                    state = State::Connecting;
                }
                State::Connecting => {
                    if self.transport.requires_tunnel(&request.url) {
                        seq.tunneling = true;
                        self.do_tunneling(&request, &mut seq)?;
                    }
                    self.set_preemptive_headers(&mut request, &mut seq)?;
                    state = State::AwaitingResponse;
                }
                State::AwaitingResponse => {
                    let resp = self.transport.round_trip(&request)?;
                    tracing::debug!(status = resp.status.as_u16(), url = %request.url, "response received");
                    state = self.classify(&resp, &mut request, &mut seq)?;
                    response = Some(resp);
                }
                State::AuthChallenge => {
                    let resp = response.take().ok_or(NetError::EmptyResponse)?;
                    attempts += 1;
                    if attempts >= self.config.max_attempts {
                        return Err(NetError::TooManyRetries);
                    }
                    let handled = if resp.is_proxy_auth_required() {
                        self.handle_proxy_challenge(
                            &mut request,
                            &mut seq,
                            &resp,
                            ChallengeContext::Proxy,
                        )?
                    } else {
                        self.handle_server_challenge(&mut request, &mut seq, &resp)?
                    };
                    match handled {
                        Handled::Retry => {
                            self.transport.disconnect();
                            state = State::Connecting;
                        }
                        Handled::Surface => {
                            response = Some(resp);
                            state = State::Done;
                        }
                    }
                }
                State::Redirect => {
                    let resp = response.take().ok_or(NetError::EmptyResponse)?;
                    attempts += 1;
                    if attempts >= self.config.max_attempts {
                        return Err(NetError::TooManyRedirects);
                    }
                    if self.follow_redirect(&mut request, &mut seq, &resp)? {
                        state = State::Connecting;
                    } else {
                        response = Some(resp);
                        state = State::Done;
                    }
                }
                State::Done => {
                    return response.ok_or(NetError::EmptyResponse);
                }
            }
        }
    }

    /// Process a response's status: commit credentials that just proved
    /// themselves, clear per-direction flags, and pick the next state.
    fn classify(
        &mut self,
        response: &AuthResponse,
        request: &mut AuthRequest,
        seq: &mut Sequence,
    ) -> Result<State, NetError> {
        let via_proxy = self.transport.proxy_address().is_some();

        if response.is_proxy_auth_required() && via_proxy {
            return Ok(State::AuthChallenge);
        }

        // Anything but a 407 means the proxy accepted our credentials.
        seq.in_negotiate_proxy = false;
        seq.proxy_handshake = false;
        if let Some(cred) = &seq.proxy_cred {
            self.store.put(cred);
        }
        if !seq.user_proxy_auth {
            request.headers.remove(PROXY_AUTHORIZATION);
        }

        if response.is_unauthorized() {
            return Ok(State::AuthChallenge);
        }

        // Anything but a 401/407 means the server accepted ours.
        self.commit_server(seq, request);
        seq.in_negotiate = false;
        seq.server_handshake = false;
        if !seq.user_server_auth {
            request.headers.remove(AUTHORIZATION);
        }

        if response.is_success() {
            self.validate_response_auth(seq, request, response)?;
        }

        if self.config.follow_redirects && is_redirect(response.status) {
            return Ok(State::Redirect);
        }
        Ok(State::Done)
    }

    /// Handle a 401. Returns whether to resend or surface.
    fn handle_server_challenge(
        &mut self,
        request: &mut AuthRequest,
        seq: &mut Sequence,
        response: &AuthResponse,
    ) -> Result<Handled, NetError> {
        let challenges = ChallengeSet::from_headers(&response.headers, &WWW_AUTHENTICATE);
        let raw = challenges.raw();

        // Failed Negotiate: the scheme is supported but the round failed
        // (e.g. delegation breaks on a backend). A second bare challenge in
        // one sequence is the only signal; skip the scheme and fall back.
        let mut dont_use_negotiate = false;
        if challenges.has_bare_negotiate() {
            if !seq.in_negotiate {
                seq.in_negotiate = true;
            } else {
                dont_use_negotiate = true;
                seq.server_handshake = false;
                seq.server_cred = None;
            }
        }

        if seq.server_handshake {
            return self.continue_handshake(
                &mut request.headers,
                AUTHORIZATION,
                seq.server_cred.as_ref(),
                &challenges,
            );
        }

        // A fresh credential answered with the very same challenge state
        // cannot make progress; fail deterministically instead of looping.
        if seq.server_cred.is_some() && seq.last_server_challenge.as_deref() == Some(raw.as_str()) {
            return Err(NetError::AuthenticationRejected {
                status: response.status.as_u16(),
                challenge: raw,
            });
        }

        if let Some(cred) = seq.server_cred.take() {
            if !cred.scheme().is_negotiated() {
                let revived = challenges
                    .get(cred.scheme().as_str())
                    .map(|ch| cred.try_revive(ch))
                    .unwrap_or(false);
                if revived {
                    let value =
                        cred.header_value(&request.request_uri(), request.method.as_str())?;
                    set_header(&mut request.headers, AUTHORIZATION, &value)?;
                    seq.last_server_challenge = Some(raw);
                    seq.server_cred = Some(cred);
                    return Ok(Handled::Retry);
                }
                self.store.remove_credential(&cred);
            }
        }

        let host = request.url.host_str().ok_or(NetError::InvalidUrl)?.to_string();
        let selector = SchemeSelector::new(&self.config, self.provider.as_deref(), &self.support);
        let scheme = match selector.select(
            &challenges,
            &host,
            ChallengeContext::Server,
            dont_use_negotiate,
        ) {
            Some(s) => s,
            None => {
                seq.last_server_challenge = Some(raw);
                return Ok(Handled::Surface);
            }
        };
        let challenge = challenges
            .get(scheme.as_str())
            .ok_or(NetError::InvalidResponse)?;

        let realm = challenge.find_param("realm");
        let space = ProtectionSpace::for_server(
            &request.url,
            scheme,
            realm,
            &self.config.authenticator_id,
        )?;
        let path = reduce_path(request.url.path());
        seq.server_domain = if scheme == AuthScheme::Digest {
            challenge.find_param("domain")
        } else {
            None
        };

        let cred = match self.obtain_credential(
            scheme,
            challenge,
            space,
            path,
            &host,
            response.status,
            &raw,
        )? {
            Some(c) => c,
            None => {
                seq.last_server_challenge = Some(raw);
                return Ok(Handled::Surface);
            }
        };

        let value = cred.header_value(&request.request_uri(), request.method.as_str())?;
        set_header(&mut request.headers, AUTHORIZATION, &value)?;
        seq.server_handshake = cred.scheme().is_negotiated();
        seq.server_cred = Some(cred);
        seq.last_server_challenge = Some(raw);
        Ok(Handled::Retry)
    }

    /// Handle a 407, either for plain proxying (request headers) or during
    /// CONNECT setup (the tunnel's separate header set).
    fn handle_proxy_challenge_in(
        &mut self,
        headers: &mut HeaderMap,
        digest_uri: &str,
        method: &str,
        seq: &mut Sequence,
        response: &AuthResponse,
        context: ChallengeContext,
    ) -> Result<Handled, NetError> {
        let (proxy_host, proxy_port) = self
            .transport
            .proxy_address()
            .ok_or(NetError::InvalidResponse)?;
        let challenges = ChallengeSet::from_headers(&response.headers, &PROXY_AUTHENTICATE);
        let raw = challenges.raw();

        let mut dont_use_negotiate = false;
        if challenges.has_bare_negotiate() {
            if !seq.in_negotiate_proxy {
                seq.in_negotiate_proxy = true;
            } else {
                dont_use_negotiate = true;
                seq.proxy_handshake = false;
                seq.proxy_cred = None;
            }
        }

        if seq.proxy_handshake {
            return self.continue_handshake(
                headers,
                PROXY_AUTHORIZATION,
                seq.proxy_cred.as_ref(),
                &challenges,
            );
        }

        if seq.proxy_cred.is_some() && seq.last_proxy_challenge.as_deref() == Some(raw.as_str()) {
            return Err(NetError::AuthenticationRejected {
                status: response.status.as_u16(),
                challenge: raw,
            });
        }

        if let Some(cred) = seq.proxy_cred.take() {
            if !cred.scheme().is_negotiated() {
                let revived = challenges
                    .get(cred.scheme().as_str())
                    .map(|ch| cred.try_revive(ch))
                    .unwrap_or(false);
                if revived {
                    let value = cred.header_value(digest_uri, method)?;
                    set_header(headers, PROXY_AUTHORIZATION, &value)?;
                    seq.last_proxy_challenge = Some(raw);
                    seq.proxy_cred = Some(cred);
                    return Ok(Handled::Retry);
                }
                self.store.remove_credential(&cred);
            }
        }

        let selector = SchemeSelector::new(&self.config, self.provider.as_deref(), &self.support);
        let scheme = match selector.select(&challenges, &proxy_host, context, dont_use_negotiate) {
            Some(s) => s,
            None => {
                seq.last_proxy_challenge = Some(raw);
                return Ok(Handled::Surface);
            }
        };
        let challenge = challenges
            .get(scheme.as_str())
            .ok_or(NetError::InvalidResponse)?;

        let realm = challenge.find_param("realm");
        let space = ProtectionSpace::for_proxy(
            &proxy_host,
            proxy_port,
            scheme,
            realm,
            &self.config.authenticator_id,
        );

        let cred = match self.obtain_credential(
            scheme,
            challenge,
            space,
            "/".to_string(),
            &proxy_host,
            response.status,
            &raw,
        )? {
            Some(c) => c,
            None => {
                seq.last_proxy_challenge = Some(raw);
                return Ok(Handled::Surface);
            }
        };

        let value = cred.header_value(digest_uri, method)?;
        set_header(headers, PROXY_AUTHORIZATION, &value)?;
        seq.proxy_handshake = cred.scheme().is_negotiated();
        seq.proxy_cred = Some(cred);
        seq.last_proxy_challenge = Some(raw);
        Ok(Handled::Retry)
    }

    fn handle_proxy_challenge(
        &mut self,
        request: &mut AuthRequest,
        seq: &mut Sequence,
        response: &AuthResponse,
        context: ChallengeContext,
    ) -> Result<Handled, NetError> {
        let digest_uri = request.request_uri();
        let method = request.method.as_str().to_string();
        let mut headers = std::mem::take(&mut request.headers);
        let handled = self.handle_proxy_challenge_in(
            &mut headers,
            &digest_uri,
            &method,
            seq,
            response,
            context,
        );
        request.headers = headers;
        handled
    }

    /// Feed a continuation token into the in-flight handshake. Any failure
    /// here aborts the sequence; multi-round schemes are not retried.
    fn continue_handshake(
        &self,
        headers: &mut HeaderMap,
        header: HeaderName,
        cred: Option<&Credential>,
        challenges: &ChallengeSet,
    ) -> Result<Handled, NetError> {
        let cred = cred.ok_or_else(|| NetError::NegotiationFailed {
            detail: "no handshake in progress".into(),
        })?;
        let Credential::Negotiate(nc) = cred else {
            return Err(NetError::NegotiationFailed {
                detail: "handshake flagged on a non-negotiated credential".into(),
            });
        };
        let token = challenges
            .handshake_token(nc.scheme().as_str())
            .ok_or_else(|| NetError::NegotiationFailed {
                detail: "server sent no continuation token".into(),
            })?;
        let value = nc.continue_header_value(&token)?;
        set_header(headers, header, &value)?;
        Ok(Handled::Retry)
    }

    /// Look up or interactively acquire a credential for a protection
    /// space, serialized per key so concurrent requests to one realm share a
    /// single prompt. `Ok(None)` means nothing can answer (no prompt wired
    /// up, or the challenge is unusable); a declined prompt is an error.
    #[allow(clippy::too_many_arguments)]
    fn obtain_credential(
        &self,
        scheme: AuthScheme,
        challenge: &crate::auth::challenge::Challenge,
        space: ProtectionSpace,
        path: String,
        host: &str,
        status: StatusCode,
        raw: &str,
    ) -> Result<Option<Credential>, NetError> {
        // The realm-qualified key is exact; any cached path entry answers.
        let key = space.cache_key(true);
        if let Some(found) = self.store.acquire_or_wait(&key, None) {
            tracing::debug!(key = %key, "using cached credential");
            return Ok(Some(found));
        }
        // We won the in-flight claim; the guard releases it even if the
        // prompt below panics or is abandoned.
        let _guard = self.store.release_guard(&key);

        if scheme.is_negotiated() {
            let provider = match &self.provider {
                Some(p) => p,
                None => return Ok(None),
            };
            let session = provider.start(scheme, host)?;
            let cred = Credential::Negotiate(NegotiateCredential::new(
                space,
                path,
                scheme,
                session,
                provider.supports_preemptive(scheme),
            ));
            self.store.put(&cred);
            return Ok(Some(cred));
        }

        let prompt = match &self.prompt {
            Some(p) => p,
            None => return Ok(None),
        };
        let creds = match prompt.request_credentials(&space) {
            Some(c) => c,
            None => {
                tracing::debug!(host, "credential prompt declined");
                return Err(NetError::AuthenticationDeclined {
                    status: status.as_u16(),
                    challenge: raw.to_string(),
                });
            }
        };

        let cred = match scheme {
            AuthScheme::Basic => {
                let utf8 = challenge.param_equals("charset", "UTF-8");
                Credential::Basic(BasicCredential::new(space, path, &creds, utf8))
            }
            AuthScheme::Digest => {
                match DigestCredential::from_challenge(
                    space,
                    path,
                    &creds,
                    challenge,
                    self.config.quote_digest_params,
                ) {
                    Ok(d) => Credential::Digest(d),
                    // Unusable challenge (unknown algorithm, missing nonce):
                    // surface the response rather than fail the request.
                    Err(_) => return Ok(None),
                }
            }
            _ => return Ok(None),
        };
        self.store.put(&cred);
        Ok(Some(cred))
    }

    /// Apply cached preemptive credentials before sending, never touching
    /// caller-supplied authorization headers.
    fn set_preemptive_headers(
        &self,
        request: &mut AuthRequest,
        seq: &mut Sequence,
    ) -> Result<(), NetError> {
        if !seq.user_server_auth && !request.headers.contains_key(AUTHORIZATION) {
            let space = ProtectionSpace::for_server(
                &request.url,
                AuthScheme::Unknown,
                None,
                &self.config.authenticator_id,
            )?;
            if let Some(cred) = self.store.get(&space.location_key(), Some(request.url.path())) {
                if cred.supports_preemptive() {
                    let value =
                        cred.header_value(&request.request_uri(), request.method.as_str())?;
                    set_header(&mut request.headers, AUTHORIZATION, &value)?;
                    seq.server_cred = Some(cred);
                }
            }
        }

        if !seq.tunneling
            && !seq.user_proxy_auth
            && !request.headers.contains_key(PROXY_AUTHORIZATION)
        {
            if let Some((proxy_host, proxy_port)) = self.transport.proxy_address() {
                let space = ProtectionSpace::for_proxy(
                    &proxy_host,
                    proxy_port,
                    AuthScheme::Unknown,
                    None,
                    &self.config.authenticator_id,
                );
                if let Some(cred) = self.store.get(&space.location_key(), Some("/")) {
                    if cred.supports_preemptive() {
                        let value =
                            cred.header_value(&request.request_uri(), request.method.as_str())?;
                        set_header(&mut request.headers, PROXY_AUTHORIZATION, &value)?;
                        seq.proxy_cred = Some(cred);
                    }
                }
            }
        }
        Ok(())
    }

    /// Establish a CONNECT tunnel, answering 407s against a header set that
    /// is separate from the real request's. Anything but eventual success is
    /// a hard failure carrying the proxy's status line.
    fn do_tunneling(&mut self, request: &AuthRequest, seq: &mut Sequence) -> Result<(), NetError> {
        let host = request.url.host_str().ok_or(NetError::InvalidUrl)?.to_string();
        let port = request
            .url
            .port_or_known_default()
            .ok_or(NetError::InvalidUrl)?;
        let connect_uri = request.connect_uri()?;

        let mut tunnel_headers = HeaderMap::new();
        if let Some((proxy_host, proxy_port)) = self.transport.proxy_address() {
            let space = ProtectionSpace::for_proxy(
                &proxy_host,
                proxy_port,
                AuthScheme::Unknown,
                None,
                &self.config.authenticator_id,
            );
            if let Some(cred) = self.store.get(&space.location_key(), Some("/")) {
                if cred.supports_preemptive() {
                    let value = cred.header_value(&connect_uri, "CONNECT")?;
                    set_header(&mut tunnel_headers, PROXY_AUTHORIZATION, &value)?;
                    seq.proxy_cred = Some(cred);
                }
            }
        }

        let mut attempts = 0usize;
        loop {
            let response = self.transport.connect_tunnel(&host, port, &tunnel_headers)?;
            let status_line = response.status_line.clone();

            if response.is_success() {
                tracing::debug!(host = %host, port, "tunnel established");
                seq.in_negotiate_proxy = false;
                seq.proxy_handshake = false;
                if let Some(cred) = &seq.proxy_cred {
                    self.store.put(cred);
                }
                return Ok(());
            }

            if response.is_proxy_auth_required() {
                attempts += 1;
                if attempts < self.config.max_attempts {
                    let handled = self.handle_proxy_challenge_in(
                        &mut tunnel_headers,
                        &connect_uri,
                        "CONNECT",
                        seq,
                        &response,
                        ChallengeContext::Tunnel,
                    )?;
                    if let Handled::Retry = handled {
                        self.transport.disconnect();
                        continue;
                    }
                }
            }

            tracing::warn!(status_line = %status_line, "tunnel setup failed");
            return Err(NetError::TunnelConnectionFailed { status_line });
        }
    }

    /// Commit a proven server credential: Basic widens its stored path to
    /// the common root, a Digest challenge's `domain` list spreads the
    /// credential over every listed path.
    fn commit_server(&self, seq: &mut Sequence, request: &AuthRequest) {
        let Some(cred) = seq.server_cred.take() else {
            return;
        };
        match &cred {
            Credential::Basic(_) => {
                let npath = reduce_path(request.url.path());
                let opath = cred.path().to_string();
                let merged = if !opath.starts_with(&npath) || npath.len() >= opath.len() {
                    common_root_path(&opath, &npath)
                } else {
                    npath
                };
                self.store.remove_credential(&cred);
                let widened = cred.with_path(merged);
                self.store.put(&widened);
                seq.server_cred = Some(widened);
                return;
            }
            Credential::Digest(d) => {
                if let Some(domain) = &seq.server_domain {
                    for entry in domain.split_whitespace() {
                        let target = match request.url.join(entry) {
                            Ok(u) => u,
                            Err(_) => continue,
                        };
                        let space = match ProtectionSpace::for_server(
                            &target,
                            AuthScheme::Digest,
                            cred.space().realm.clone(),
                            &self.config.authenticator_id,
                        ) {
                            Ok(s) => s,
                            Err(_) => continue,
                        };
                        let scoped = d.sharing_params(space, reduce_path(target.path()));
                        self.store.put(&Credential::Digest(scoped));
                    }
                } else {
                    self.store.put(&cred);
                }
            }
            Credential::Negotiate(_) => {
                self.store.put(&cred);
            }
        }
        seq.server_cred = Some(cred);
    }

    /// Check `Authentication-Info`/`Proxy-Authentication-Info` rspauth on a
    /// successful digest-authenticated exchange, when configured. A missing
    /// header is tolerated; a mismatch is fatal.
    fn validate_response_auth(
        &self,
        seq: &Sequence,
        request: &AuthRequest,
        response: &AuthResponse,
    ) -> Result<(), NetError> {
        if self.config.validate_proxy {
            if let Some(Credential::Digest(d)) = &seq.proxy_cred {
                if let Some(info) = header_str(&response.headers, &PROXY_AUTHENTICATION_INFO) {
                    d.validate_response_auth(info, &request.request_uri())?;
                }
            }
        }
        if self.config.validate_server {
            if let Some(Credential::Digest(d)) = &seq.server_cred {
                if let Some(info) = header_str(&response.headers, &AUTHENTICATION_INFO) {
                    d.validate_response_auth(info, &request.request_uri())?;
                }
            }
        }
        Ok(())
    }

    /// Resolve and vet the redirect target. Returns whether it was followed.
    fn follow_redirect(
        &mut self,
        request: &mut AuthRequest,
        seq: &mut Sequence,
        response: &AuthResponse,
    ) -> Result<bool, NetError> {
        let target = match redirect_target(response, &request.url) {
            Some(t) => t,
            None => return Ok(false),
        };
        if !self
            .redirect_policy
            .should_follow(&request.url, &target, response.status)
        {
            tracing::debug!(from = %request.url, to = %target, "redirect vetoed by policy");
            return Ok(false);
        }

        tracing::debug!(from = %request.url, to = %target, status = response.status.as_u16(), "following redirect");
        request.url = target;
        if !seq.user_server_auth {
            request.headers.remove(AUTHORIZATION);
        }
        // The new destination starts a fresh server-side sequence.
        seq.server_cred = None;
        seq.last_server_challenge = None;
        seq.server_handshake = false;
        seq.server_domain = None;
        self.transport.disconnect();
        Ok(true)
    }
}

fn set_header(headers: &mut HeaderMap, name: HeaderName, value: &str) -> Result<(), NetError> {
    let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidResponse)?;
    headers.insert(name, value);
    Ok(())
}

fn header_str<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
