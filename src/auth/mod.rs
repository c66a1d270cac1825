//! The authentication core.
//!
//! Leaf-first: [`challenge`] parses `WWW-Authenticate`/`Proxy-Authenticate`
//! headers, [`scheme`] picks one scheme to pursue, [`cache`] holds shared
//! credentials behind single-flight coordination, and the scheme modules
//! ([`basic`], [`digest`], [`negotiate`]) compute the authorization headers.
//! The request-driving loop lives in [`crate::http::authenticator`].

pub mod basic;
pub mod cache;
pub mod challenge;
pub mod credential;
pub mod digest;
pub mod negotiate;
pub mod scheme;

pub use cache::CredentialStore;
pub use challenge::{Challenge, ChallengeSet};
pub use credential::{Credential, PasswordCredentials, ProtectionSpace};
pub use negotiate::{NegotiateSession, NegotiatedSchemeProvider};
pub use scheme::{AuthConfig, AuthScheme, ChallengeContext, SchemeSelector};
