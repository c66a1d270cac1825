//! Digest credential integration tests against the public API.

use authnet::auth::challenge::ChallengeSet;
use authnet::auth::digest::DigestCredential;
use authnet::auth::{AuthScheme, PasswordCredentials, ProtectionSpace};
use authnet::base::NetError;
use boring::hash::{hash, MessageDigest};
use std::fmt::Write as _;
use url::Url;

fn md5_hex(input: &str) -> String {
    let digest = hash(MessageDigest::md5(), input.as_bytes()).unwrap();
    let mut hex = String::new();
    for b in digest.iter() {
        write!(hex, "{:02x}", b).unwrap();
    }
    hex
}

fn credential(challenge_line: &str) -> DigestCredential {
    let url = Url::parse("http://www.nowhere.org/dir/index.html").unwrap();
    let set = ChallengeSet::parse_lines([challenge_line]);
    let challenge = set.get("digest").unwrap();
    let space = ProtectionSpace::for_server(
        &url,
        AuthScheme::Digest,
        challenge.find_param("realm"),
        "default",
    )
    .unwrap();
    DigestCredential::from_challenge(
        space,
        "/dir/".into(),
        &PasswordCredentials::new("Mufasa", "Circle Of Life"),
        challenge,
        false,
    )
    .unwrap()
}

/// Pull a parameter back out of a generated Authorization header.
fn header_param(header: &str, name: &str) -> Option<String> {
    let rest = header.strip_prefix("Digest ")?;
    for part in rest.split(", ") {
        let (key, value) = part.split_once('=')?;
        if key.eq_ignore_ascii_case(name) {
            return Some(value.trim_matches('"').to_string());
        }
    }
    None
}

#[test]
fn test_response_matches_hand_computed_hash() {
    let cred = credential(
        "Digest realm=\"testrealm@host.com\", qop=\"auth\", \
         nonce=\"dcd98b7102dd2f0e8b11d0f600bfb0c093\"",
    );
    let header = cred.header_value("/dir/index.html", "GET");

    // Recompute the RFC 2617 response from the emitted nc/cnonce.
    let cnonce = header_param(&header, "cnonce").unwrap();
    let nc = header_param(&header, "nc").unwrap();
    let ha1 = md5_hex("Mufasa:testrealm@host.com:Circle Of Life");
    let ha2 = md5_hex("GET:/dir/index.html");
    let expected = md5_hex(&format!(
        "{}:dcd98b7102dd2f0e8b11d0f600bfb0c093:{}:{}:auth:{}",
        ha1, nc, cnonce, ha2
    ));

    assert_eq!(header_param(&header, "response").unwrap(), expected);
    assert_eq!(header_param(&header, "uri").unwrap(), "/dir/index.html");
    assert_eq!(header_param(&header, "username").unwrap(), "Mufasa");
}

#[test]
fn test_nc_sequence_and_reset() {
    let cred = credential("Digest realm=\"r\", nonce=\"n1\", qop=\"auth\"");

    let ncs: Vec<String> = (0..3)
        .map(|_| header_param(&cred.header_value("/dir/", "GET"), "nc").unwrap())
        .collect();
    assert_eq!(ncs, ["00000001", "00000002", "00000003"]);

    // A stale challenge with a fresh nonce revives and resets the count.
    let set = ChallengeSet::parse_lines(["Digest realm=\"r\", nonce=\"n2\", stale=true"]);
    assert!(cred.try_revive(set.get("digest").unwrap()));

    let header = cred.header_value("/dir/", "GET");
    assert_eq!(header_param(&header, "nc").unwrap(), "00000001");
    assert_eq!(header_param(&header, "nonce").unwrap(), "n2");
}

#[test]
fn test_rspauth_validation_roundtrip() {
    let cred = credential("Digest realm=\"r\", nonce=\"n1\", qop=\"auth\"");
    let header = cred.header_value("/dir/page", "GET");
    let cnonce = header_param(&header, "cnonce").unwrap();

    let ha1 = md5_hex("Mufasa:r:Circle Of Life");
    let ha2 = md5_hex(":/dir/page");
    let rspauth = md5_hex(&format!("{}:n1:00000001:{}:auth:{}", ha1, cnonce, ha2));

    let info = format!(
        "qop=auth, rspauth=\"{}\", cnonce=\"{}\", nc=00000001, nextnonce=\"n2\"",
        rspauth, cnonce
    );
    cred.validate_response_auth(&info, "/dir/page").unwrap();

    // nextnonce was adopted for the next request.
    let header = cred.header_value("/dir/page", "GET");
    assert_eq!(header_param(&header, "nonce").unwrap(), "n2");
    assert_eq!(header_param(&header, "nc").unwrap(), "00000001");
}

#[test]
fn test_rspauth_mismatch_is_protocol_violation() {
    let cred = credential("Digest realm=\"r\", nonce=\"n1\", qop=\"auth\"");
    let header = cred.header_value("/dir/page", "GET");
    let cnonce = header_param(&header, "cnonce").unwrap();

    let info = format!(
        "qop=auth, rspauth=\"00000000000000000000000000000000\", cnonce=\"{}\", nc=00000001",
        cnonce
    );
    assert_eq!(
        cred.validate_response_auth(&info, "/dir/page"),
        Err(NetError::ResponseAuthMismatch)
    );
}

#[test]
fn test_sha256_algorithm_accepted() {
    let cred = credential("Digest realm=\"r\", nonce=\"n\", algorithm=SHA-256, qop=\"auth\"");
    let header = cred.header_value("/dir/", "GET");
    assert!(header.contains("algorithm=SHA-256"));
    // SHA-256 responses are 64 hex chars.
    assert_eq!(header_param(&header, "response").unwrap().len(), 64);
}
