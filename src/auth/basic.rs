//! Basic authentication (RFC 7617).

use crate::auth::credential::{PasswordCredentials, ProtectionSpace};
use base64::{engine::general_purpose, Engine as _};

/// A cached Basic credential. The header value is computed once at creation
/// and reused verbatim; Basic is never considered stale, so a 401 against an
/// existing credential always means drop-and-reprompt.
#[derive(Debug, Clone)]
pub struct BasicCredential {
    space: ProtectionSpace,
    path: String,
    header_value: String,
}

impl BasicCredential {
    /// Build the credential, encoding `username:password` as UTF-8 when the
    /// challenge carried `charset=UTF-8` and Latin-1 otherwise.
    pub fn new(
        space: ProtectionSpace,
        path: String,
        creds: &PasswordCredentials,
        utf8: bool,
    ) -> Self {
        let joined = format!("{}:{}", creds.username, creds.password.as_str());
        let bytes = if utf8 {
            joined.into_bytes()
        } else {
            latin1_bytes(&joined)
        };
        let header_value = format!("Basic {}", general_purpose::STANDARD.encode(bytes));
        Self {
            space,
            path,
            header_value,
        }
    }

    pub fn space(&self) -> &ProtectionSpace {
        &self.space
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header_value(&self) -> &str {
        &self.header_value
    }

    pub fn with_path(&self, path: String) -> Self {
        Self {
            space: self.space.clone(),
            path,
            header_value: self.header_value.clone(),
        }
    }
}

/// Lossy ISO-8859-1 encoding: code points above U+00FF become `?`.
fn latin1_bytes(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| {
            let cp = c as u32;
            if cp <= 0xFF {
                cp as u8
            } else {
                b'?'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::scheme::AuthScheme;
    use base64::{engine::general_purpose, Engine as _};

    fn space() -> ProtectionSpace {
        ProtectionSpace::for_proxy("proxy.com", 8080, AuthScheme::Basic, Some("r".into()), "default")
    }

    #[test]
    fn test_header_value() {
        let cred = BasicCredential::new(
            space(),
            "/".into(),
            &PasswordCredentials::new("user", "pass"),
            false,
        );
        // base64("user:pass") = "dXNlcjpwYXNz"
        assert_eq!(cred.header_value(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_roundtrip_decodes_to_user_colon_pass() {
        let cred = BasicCredential::new(
            space(),
            "/".into(),
            &PasswordCredentials::new("Aladdin", "open sesame"),
            false,
        );
        let b64 = cred.header_value().strip_prefix("Basic ").unwrap();
        let decoded = general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, b"Aladdin:open sesame");
    }

    #[test]
    fn test_latin1_vs_utf8_encoding() {
        let creds = PasswordCredentials::new("müller", "geheim");
        let latin1 = BasicCredential::new(space(), "/".into(), &creds, false);
        let utf8 = BasicCredential::new(space(), "/".into(), &creds, true);
        assert_ne!(latin1.header_value(), utf8.header_value());

        let b64 = latin1.header_value().strip_prefix("Basic ").unwrap();
        let decoded = general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, b"m\xfcller:geheim");

        let b64 = utf8.header_value().strip_prefix("Basic ").unwrap();
        let decoded = general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, "müller:geheim".as_bytes());
    }

    #[test]
    fn test_unmappable_char_replaced_in_latin1() {
        let creds = PasswordCredentials::new("user", "pass→word");
        let cred = BasicCredential::new(space(), "/".into(), &creds, false);
        let b64 = cred.header_value().strip_prefix("Basic ").unwrap();
        let decoded = general_purpose::STANDARD.decode(b64).unwrap();
        assert_eq!(decoded, b"user:pass?word");
    }

    #[test]
    fn test_with_path_keeps_header() {
        let cred = BasicCredential::new(
            space(),
            "/a/b/".into(),
            &PasswordCredentials::new("u", "p"),
            false,
        );
        let widened = cred.with_path("/a/".into());
        assert_eq!(widened.path(), "/a/");
        assert_eq!(widened.header_value(), cred.header_value());
    }
}
