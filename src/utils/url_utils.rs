//! URL canonicalization and document identity.
//!
//! Re-crawling the same resource must always land on the same document, so
//! every URL entering the pipeline goes through [`canonicalize_url`] before it
//! is hashed into a document id.

use anyhow::{Result, anyhow};
use url::Url;
use xxhash_rust::xxh3::xxh3_64;

use super::constants::TRACKING_PARAMS;

/// Check if a URL is valid
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    // Skip data URLs, javascript URLs, and other non-http schemes
    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Produce the canonical form of a URL.
///
/// Scheme and host are lowercased and default ports dropped (both done by the
/// `url` parser), the fragment and tracking parameters are removed, remaining
/// query pairs are sorted, and a trailing slash on a non-root path is trimmed.
///
/// # Errors
///
/// Returns an error if the input is not a well-formed http(s) URL.
pub fn canonicalize_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if !is_valid_url(trimmed) {
        return Err(anyhow!("Not a well-formed http(s) URL: {input}"));
    }
    let mut url = Url::parse(trimmed).map_err(|e| anyhow!("Failed to parse URL {input}: {e}"))?;

    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Ok(url.to_string())
}

/// Stable document id: xxh3-64 of the canonical URL, hex encoded.
#[must_use]
pub fn document_id(canonical_url: &str) -> String {
    hex::encode(xxh3_64(canonical_url.as_bytes()).to_be_bytes())
}

/// Canonicalize then hash in one step.
///
/// # Errors
///
/// Returns an error if the URL cannot be canonicalized.
pub fn document_id_for_url(url: &str) -> Result<(String, String)> {
    let canonical = canonicalize_url(url)?;
    let id = document_id(&canonical);
    Ok((canonical, id))
}

/// Extract the lowercase host of a URL, without a leading `www.`
#[must_use]
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let normalized = match host.strip_prefix("www.") {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => host,
    };
    Some(normalized)
}
