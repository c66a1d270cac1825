//! Challenge header parsing integration tests.

use authnet::auth::ChallengeSet;
use base64::{engine::general_purpose, Engine as _};

#[test]
fn test_mixed_schemes_single_line() {
    let set = ChallengeSet::parse_lines([
        "Basic realm=\"simple\", Digest realm=\"elaborate\", nonce=\"abc\", \
         opaque=\"xyz\", qop=\"auth,auth-int\"",
    ]);

    assert_eq!(set.len(), 2);
    assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "simple");
    let digest = set.get("digest").unwrap();
    assert_eq!(digest.find_param("realm").unwrap(), "elaborate");
    assert_eq!(digest.find_param("opaque").unwrap(), "xyz");
    assert_eq!(digest.find_param("qop").unwrap(), "auth,auth-int");
}

#[test]
fn test_repeated_scheme_across_lines_last_wins() {
    let set = ChallengeSet::parse_lines([
        "Digest realm=\"old\", nonce=\"n1\"",
        "Basic realm=\"b\"",
        "Digest realm=\"new\", nonce=\"n2\"",
    ]);

    let digest = set.get("Digest").unwrap();
    assert_eq!(digest.find_param("realm").unwrap(), "new");
    assert_eq!(digest.find_param("nonce").unwrap(), "n2");
}

#[test]
fn test_ntlm_blob_roundtrips_verbatim() {
    // NTLM type-2 messages are opaque tokens, not structured parameters.
    let type2 = b"NTLMSSP\x00\x02\x00\x00\x00";
    let line = format!("NTLM {}", general_purpose::STANDARD.encode(type2));
    let set = ChallengeSet::parse_lines([line.as_str()]);

    assert_eq!(set.handshake_token("NTLM").unwrap(), type2);
    assert!(set.handshake_token("Negotiate").is_none());
}

#[test]
fn test_garbage_lines_never_error() {
    let set = ChallengeSet::parse_lines([
        "",
        "=,=,=",
        "realm=\"orphaned params\"",
        "Basic realm=\"survivor\"",
    ]);

    assert!(set.contains("basic"));
    assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "survivor");
}

#[test]
fn test_bare_negotiate_detection() {
    let with_token = format!("Negotiate {}", general_purpose::STANDARD.encode(b"t"));
    assert!(ChallengeSet::parse_lines(["Negotiate"]).has_bare_negotiate());
    assert!(ChallengeSet::parse_lines(["Kerberos"]).has_bare_negotiate());
    assert!(!ChallengeSet::parse_lines([with_token.as_str()]).has_bare_negotiate());
    assert!(!ChallengeSet::parse_lines(["Basic realm=\"r\""]).has_bare_negotiate());
}
