//! `WWW-Authenticate` / `Proxy-Authenticate` challenge parsing.
//!
//! A response may carry several challenge header lines, and a single line may
//! carry several challenges back to back (`Basic realm="a", Digest realm="b",
//! nonce="..."`). A new scheme starts wherever a token has no `=value`
//! attached. Parsing never fails: malformed entries are dropped from the set.
//!
//! The verbatim header text is retained per challenge because NTLM-style
//! schemes do not follow structured-parameter syntax — their handshake blobs
//! must be handled as opaque tokens (see [`ChallengeSet::handshake_token`]).

use base64::{engine::general_purpose, Engine as _};
use http::header::HeaderName;
use http::HeaderMap;
use std::collections::HashMap;

/// One parsed challenge: a scheme name plus its raw parameter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    scheme: String,
    params: String,
    raw: String,
}

impl Challenge {
    /// The lower-cased scheme name.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The raw parameter text following the scheme name.
    pub fn params(&self) -> &str {
        &self.params
    }

    /// The verbatim challenge text, scheme name included.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Look up a `key=value` parameter, case-insensitively, with quotes
    /// stripped. Returns `None` for absent or value-less parameters.
    pub fn find_param(&self, name: &str) -> Option<String> {
        find_in_params(&self.params, name)
    }

    /// True if the parameter is present and equals `expected`
    /// (case-insensitive).
    pub fn param_equals(&self, name: &str, expected: &str) -> bool {
        self.find_param(name)
            .map(|v| v.eq_ignore_ascii_case(expected))
            .unwrap_or(false)
    }
}

/// The set of challenges offered by one 401/407 response, keyed by
/// lower-cased scheme name. If a scheme repeats across lines the last
/// occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct ChallengeSet {
    by_scheme: HashMap<String, Challenge>,
    raw_lines: Vec<String>,
}

impl ChallengeSet {
    /// Parse every value of `name` out of a response header map.
    pub fn from_headers(headers: &HeaderMap, name: &HeaderName) -> Self {
        let lines = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok());
        Self::parse_lines(lines)
    }

    /// Parse an iterator of raw header line values.
    pub fn parse_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = ChallengeSet::default();
        for line in lines {
            set.raw_lines.push(line.to_string());
            for challenge in split_line(line) {
                set.by_scheme
                    .insert(challenge.scheme.clone(), challenge);
            }
        }
        set
    }

    pub fn get(&self, scheme: &str) -> Option<&Challenge> {
        self.by_scheme.get(&scheme.to_ascii_lowercase())
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.by_scheme.contains_key(&scheme.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.by_scheme.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_scheme.len()
    }

    /// Iterate over the parsed scheme names.
    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.by_scheme.keys().map(|s| s.as_str())
    }

    /// The verbatim header lines joined back together. Used to compare
    /// challenge state across rounds and to surface the last challenge in
    /// errors.
    pub fn raw(&self) -> String {
        self.raw_lines.join(", ")
    }

    /// True if any header line was a bare `Negotiate`/`Kerberos` challenge
    /// (no handshake token) — the signal used for failed-round detection.
    pub fn has_bare_negotiate(&self) -> bool {
        self.raw_lines.iter().any(|line| {
            let t = line.trim();
            t.eq_ignore_ascii_case("negotiate") || t.eq_ignore_ascii_case("kerberos")
        })
    }

    /// Extract the opaque base64 handshake blob from a `<Scheme> <token>`
    /// line, bypassing structured-parameter parsing entirely. NTLM type-2
    /// messages and SPNEGO continuations arrive this way.
    pub fn handshake_token(&self, scheme: &str) -> Option<Vec<u8>> {
        for line in &self.raw_lines {
            let t = line.trim();
            let rest = match strip_scheme_prefix(t, scheme) {
                Some(r) => r.trim(),
                None => continue,
            };
            if rest.is_empty() || rest.contains(' ') || rest.contains(',') || rest.contains('"') {
                continue;
            }
            if let Ok(decoded) = general_purpose::STANDARD.decode(rest) {
                return Some(decoded);
            }
        }
        None
    }
}

fn strip_scheme_prefix<'a>(line: &'a str, scheme: &str) -> Option<&'a str> {
    if line.len() > scheme.len()
        && line[..scheme.len()].eq_ignore_ascii_case(scheme)
        && line.as_bytes()[scheme.len()] == b' '
    {
        Some(&line[scheme.len()..])
    } else {
        None
    }
}

/// Split one header line into challenges. A token carrying no `=` starts a
/// new scheme; everything up to the next scheme token (or end of line) is
/// that challenge's parameter text.
fn split_line(line: &str) -> Vec<Challenge> {
    let mut challenges = Vec::new();
    let mut current: Option<(usize, usize)> = None; // (scheme token start, scheme token end)

    for (start, end) in tokenize(line) {
        let token = &line[start..end];
        if token.contains('=') {
            continue; // parameter of the current challenge, or dropped if none
        }
        if let Some((cs, ce)) = current.take() {
            challenges.push(make_challenge(line, cs, ce, start));
        }
        current = Some((start, end));
    }
    if let Some((cs, ce)) = current {
        challenges.push(make_challenge(line, cs, ce, line.len()));
    }
    challenges
}

fn make_challenge(line: &str, scheme_start: usize, scheme_end: usize, until: usize) -> Challenge {
    let raw = line[scheme_start..until]
        .trim_end_matches(|c: char| c == ',' || c.is_ascii_whitespace())
        .to_string();
    let params = line[scheme_end..until]
        .trim_matches(|c: char| c == ',' || c.is_ascii_whitespace())
        .to_string();
    Challenge {
        scheme: line[scheme_start..scheme_end].to_ascii_lowercase(),
        params,
        raw,
    }
}

/// Produce `(start, end)` byte ranges of the comma/whitespace-separated
/// tokens of a line, treating quoted spans as opaque.
fn tokenize(line: &str) -> Vec<(usize, usize)> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_quotes = false;

    for (i, c) in line.char_indices() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                if start.is_none() {
                    start = Some(i);
                }
            }
            ',' | ' ' | '\t' if !in_quotes => {
                if let Some(s) = start.take() {
                    tokens.push((s, i));
                }
            }
            _ => {
                if start.is_none() {
                    start = Some(i);
                }
            }
        }
    }
    if let Some(s) = start {
        tokens.push((s, line.len()));
    }
    tokens
}

/// Look up a `key=value` pair in raw parameter text, case-insensitively,
/// with quotes stripped. Also used against `Authentication-Info` headers,
/// which carry the same syntax without a scheme prefix.
pub(crate) fn find_in_params(params: &str, name: &str) -> Option<String> {
    for part in split_params(params) {
        let eq = match part.find('=') {
            Some(i) => i,
            None => continue,
        };
        let key = part[..eq].trim();
        if !key.eq_ignore_ascii_case(name) {
            continue;
        }
        let mut value = part[eq + 1..].trim();
        if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
            value = &value[1..value.len() - 1];
        }
        return Some(value.to_string());
    }
    None
}

/// Split parameter text on commas, honoring quotes.
fn split_params(params: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (i, c) in params.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let part = params[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let part = params[start..].trim();
    if !part.is_empty() {
        parts.push(part);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_challenge() {
        let set = ChallengeSet::parse_lines(["Basic realm=\"WallyWorld\""]);
        let basic = set.get("Basic").unwrap();
        assert_eq!(basic.scheme(), "basic");
        assert_eq!(basic.find_param("realm").unwrap(), "WallyWorld");
    }

    #[test]
    fn test_multiple_challenges_one_line() {
        let set = ChallengeSet::parse_lines([
            "Basic realm=\"a\", Digest realm=\"b\", nonce=\"n1\", qop=\"auth\"",
        ]);
        assert!(set.contains("basic"));
        assert!(set.contains("digest"));
        assert_eq!(set.get("digest").unwrap().find_param("nonce").unwrap(), "n1");
        assert_eq!(set.get("digest").unwrap().find_param("qop").unwrap(), "auth");
        assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "a");
    }

    #[test]
    fn test_multiple_header_lines() {
        let set =
            ChallengeSet::parse_lines(["Digest realm=\"r\", nonce=\"abc\"", "Basic realm=\"r\""]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_repeated_scheme_last_wins() {
        let set = ChallengeSet::parse_lines(["Basic realm=\"first\"", "Basic realm=\"second\""]);
        assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "second");
    }

    #[test]
    fn test_quoted_comma_does_not_split() {
        let set = ChallengeSet::parse_lines(["Basic realm=\"a, b\""]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "a, b");
    }

    #[test]
    fn test_malformed_leading_param_dropped() {
        // Parameter before any scheme name has nothing to attach to.
        let set = ChallengeSet::parse_lines(["realm=\"lost\", Basic realm=\"kept\""]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("basic").unwrap().find_param("realm").unwrap(), "kept");
    }

    #[test]
    fn test_bare_scheme() {
        let set = ChallengeSet::parse_lines(["Negotiate"]);
        let neg = set.get("negotiate").unwrap();
        assert!(neg.params().is_empty());
        assert!(set.has_bare_negotiate());
    }

    #[test]
    fn test_param_case_insensitive() {
        let set = ChallengeSet::parse_lines(["Digest Realm=\"r\", NONCE=\"n\""]);
        let d = set.get("digest").unwrap();
        assert_eq!(d.find_param("realm").unwrap(), "r");
        assert_eq!(d.find_param("nonce").unwrap(), "n");
    }

    #[test]
    fn test_charset_param() {
        let set = ChallengeSet::parse_lines(["Basic realm=\"r\", charset=UTF-8"]);
        assert!(set.get("basic").unwrap().param_equals("charset", "utf-8"));
    }

    #[test]
    fn test_handshake_token_roundtrip() {
        let blob = b"NTLMSSP\x00\x02";
        let line = format!("NTLM {}", general_purpose::STANDARD.encode(blob));
        let set = ChallengeSet::parse_lines([line.as_str()]);
        assert_eq!(set.handshake_token("NTLM").unwrap(), blob);
    }

    #[test]
    fn test_handshake_token_absent_for_structured_challenge() {
        let set = ChallengeSet::parse_lines(["Digest realm=\"r\", nonce=\"n\""]);
        assert!(set.handshake_token("Digest").is_none());
        let set = ChallengeSet::parse_lines(["NTLM"]);
        assert!(set.handshake_token("NTLM").is_none());
    }

    #[test]
    fn test_raw_preserved_verbatim() {
        let line = "Digest realm=\"r\", nonce=\"n\", stale=true";
        let set = ChallengeSet::parse_lines([line]);
        assert_eq!(set.raw(), line);
        assert_eq!(set.get("digest").unwrap().raw(), line);
    }
}
