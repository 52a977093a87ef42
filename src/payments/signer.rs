//! Canonical parameter encoding and Signature Version 2 request signing.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Percent-encodes a value per RFC 3986: unreserved characters
/// (ALPHA / DIGIT / `-` / `.` / `_` / `~`) pass through, everything else
/// becomes uppercase `%XX`. Space is `%20`, never `+`; `~` stays literal.
pub fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Renders `key=value` pairs joined by `&`, preserving the iteration order
/// of `pairs`. Values are percent-encoded; keys are emitted as-is (MWS
/// parameter names are plain ASCII identifiers).
pub fn canonical_query<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds the Signature V2 string-to-sign:
///
/// ```text
/// POST
/// <host>
/// <path, each segment percent-encoded>
/// <parameters sorted byte-wise by key, canonically encoded>
/// ```
///
/// `BTreeMap` iteration gives exactly the byte-wise lexicographic key order
/// the scheme requires. The final line has no trailing newline.
pub fn string_to_sign(host: &str, path: &str, params: &BTreeMap<String, String>) -> String {
    let path = if path.is_empty() { "/" } else { path };
    let encoded_path = path.split('/').map(encode).collect::<Vec<_>>().join("/");

    let query = canonical_query(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    format!("POST\n{host}\n{encoded_path}\n{query}")
}

/// HMAC-SHA256 over the string-to-sign with the secret key, base64-encoded.
pub fn sign(string_to_sign: &str, secret_key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}
