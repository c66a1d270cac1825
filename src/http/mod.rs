//! The request-driving layer.
//!
//! - [`transport`]: the wire and prompt collaborator seams
//! - [`redirect`]: redirect classification and the follow/stop policy
//! - [`authenticator`]: the retry/redirect/tunnel state machine

pub mod authenticator;
pub mod redirect;
pub mod transport;

// Re-exports for convenience
pub use authenticator::RequestAuthenticator;
pub use redirect::{RedirectPolicy, SameOriginPolicy};
pub use transport::{AuthRequest, AuthResponse, CredentialPrompt, Transport};
