//! Strict profile-URL validation.
//!
//! The only accepted shape is `https://x.com/<handle>` where the handle is
//! 1–15 letters, digits or underscores. Everything else is rejected with a
//! reason specific enough to fix the input, because the error text is the
//! only feedback the user gets.

use regex::Regex;
use std::sync::LazyLock;

/// Canonical profile domain.
pub const PROFILE_DOMAIN: &str = "x.com";

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{1,15}$").expect("handle regex should compile")
});

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProfileUrlError {
    #[error("URL must not be empty")]
    Empty,
    #[error("enter the full URL, not the @handle shorthand (expected https://x.com/handle)")]
    HandleShorthand,
    #[error("URL is missing a scheme, expected https://x.com/handle")]
    MissingScheme,
    #[error("use https:// (http:// is not supported)")]
    InsecureScheme,
    #[error("unsupported scheme {0}://, use https://")]
    UnsupportedScheme(String),
    #[error("use the x.com domain (twitter.com is not supported)")]
    TwitterDomain,
    #[error("use the x.com domain without the www prefix")]
    WwwSubdomain,
    #[error("domain must be x.com (got {0})")]
    WrongDomain(String),
    #[error("URL must not carry an explicit port (:{0})")]
    PortPresent(String),
    #[error("URL must not contain query parameters (anything after ?)")]
    QueryPresent,
    #[error("URL must not contain a fragment (anything after #)")]
    FragmentPresent,
    #[error("URL must not end with a slash")]
    TrailingSlash,
    #[error("missing username, enter the full profile URL (like https://x.com/elonmusk)")]
    MissingHandle,
    #[error("URL contains extra path segments (like /media or /likes), keep only the profile root")]
    ExtraPathSegments,
    #[error("username too long (at most 15 characters, got {0})")]
    HandleTooLong(usize),
    #[error("username contains invalid characters: {0} (only letters, digits and underscore)")]
    HandleInvalidChars(String),
    #[error("invalid username (letters, digits and underscore, 1-15 characters)")]
    InvalidHandle,
}

/// Validate a raw profile URL and extract the account handle.
///
/// Pure and deterministic; accepts exactly `https://x.com/<handle>` with no
/// trailing slash, port, query, fragment or extra path segments.
pub fn parse_profile_url(input: &str) -> Result<String, ProfileUrlError> {
    let url = input.trim();
    if url.is_empty() {
        return Err(ProfileUrlError::Empty);
    }

    if url.starts_with('@') {
        return Err(ProfileUrlError::HandleShorthand);
    }

    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme.to_ascii_lowercase(), rest),
        None => return Err(ProfileUrlError::MissingScheme),
    };
    match scheme.as_str() {
        "https" => {}
        "http" => return Err(ProfileUrlError::InsecureScheme),
        other => return Err(ProfileUrlError::UnsupportedScheme(other.to_string())),
    }

    let authority_end = rest
        .find(['/', '?', '#'])
        .unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let after_authority = &rest[authority_end..];

    let (host, port) = match authority.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    };
    let host_lower = host.to_ascii_lowercase();
    if host_lower != PROFILE_DOMAIN {
        return Err(match host_lower.as_str() {
            "twitter.com" | "www.twitter.com" => ProfileUrlError::TwitterDomain,
            "www.x.com" => ProfileUrlError::WwwSubdomain,
            _ => ProfileUrlError::WrongDomain(authority.to_string()),
        });
    }
    if let Some(port) = port {
        return Err(ProfileUrlError::PortPresent(port.to_string()));
    }

    // Split off fragment first, then query, so `?a#b` reports the query and
    // `#a?b` reports the fragment.
    let (before_fragment, fragment) = match after_authority.split_once('#') {
        Some((p, f)) => (p, Some(f)),
        None => (after_authority, None),
    };
    let (path, query) = match before_fragment.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (before_fragment, None),
    };
    if query.is_some() {
        return Err(ProfileUrlError::QueryPresent);
    }
    if fragment.is_some() {
        return Err(ProfileUrlError::FragmentPresent);
    }

    if path.len() > 1 && path.ends_with('/') {
        return Err(ProfileUrlError::TrailingSlash);
    }

    let handle = path.strip_prefix('/').unwrap_or(path);
    if handle.is_empty() {
        return Err(ProfileUrlError::MissingHandle);
    }
    if handle.contains('/') {
        return Err(ProfileUrlError::ExtraPathSegments);
    }

    if HANDLE_RE.is_match(handle) {
        return Ok(handle.to_string());
    }

    if handle.chars().count() > 15 {
        return Err(ProfileUrlError::HandleTooLong(handle.chars().count()));
    }
    let mut invalid: Vec<char> = handle
        .chars()
        .filter(|c| !c.is_ascii_alphanumeric() && *c != '_')
        .collect();
    invalid.sort_unstable();
    invalid.dedup();
    if !invalid.is_empty() {
        let listed = invalid
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(ProfileUrlError::HandleInvalidChars(listed));
    }
    Err(ProfileUrlError::InvalidHandle)
}

/// Render the canonical profile URL for a handle.
pub fn canonical_profile_url(handle: &str) -> String {
    format!("https://{PROFILE_DOMAIN}/{handle}")
}
