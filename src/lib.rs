//! # authnet
//!
//! An HTTP(S) client authentication engine.
//!
//! `authnet` transparently authenticates requests against origin servers and
//! forwarding proxies using competing challenge/response schemes — Basic,
//! Digest, and pluggable negotiated schemes (Negotiate/Kerberos/NTLM) —
//! while driving the request through redirects, CONNECT tunnel setup and
//! connection reuse.
//!
//! ## Features
//!
//! - **Scheme negotiation**: priority-ordered selection over
//!   `WWW-Authenticate`/`Proxy-Authenticate`, with per-context disabled sets
//!   and fallback when a Negotiate round fails server-side
//! - **Credential cache**: process-shareable store with path-prefix scoping
//!   and single-flight prompt serialization per protection space
//! - **Digest**: MD5/SHA-256 (plain and `-sess`), qop=auth nonce counting,
//!   stale-nonce revival, `Authentication-Info` validation
//! - **Pluggable transport**: the wire, TLS, pooling, cookies and redirect
//!   policy stay behind collaborator traits
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use authnet::auth::{AuthConfig, CredentialStore};
//! use authnet::http::{AuthRequest, RequestAuthenticator};
//! use std::sync::Arc;
//!
//! let store = Arc::new(CredentialStore::new());
//! let mut authenticator =
//!     RequestAuthenticator::new(&mut transport, store, AuthConfig::default())
//!         .with_prompt(prompt);
//! let response = authenticator.authenticate(AuthRequest::get(url))?;
//! println!("Status: {}", response.status);
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core error definitions
//! - [`auth`] - Challenge parsing, scheme selection, credentials, cache
//! - [`http`] - Transport seams and the request-driving state machine

pub mod auth;
pub mod base;
pub mod http;
