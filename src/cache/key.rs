//! Cache key derivation.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::http::{Method, Request};

/// Prefix on every key, keeping cache entries apart from unrelated keys in a
/// shared store.
pub const NAMESPACE: &str = "cache:";

/// Joins method and URI before hashing. Absent from every standard method
/// token, so no method/URI pair can collide with another by shifting bytes
/// across the boundary.
const SEPARATOR: u8 = b'|';

/// The store key for one `(method, URI)` pair.
///
/// `cache:` followed by the lowercase hex SHA-256 of `METHOD|URI`. The URI is
/// hashed exactly as received: no case folding, no trailing-slash handling, no
/// query parameter sorting. `/a?x=1&y=2` and `/a?y=2&x=1` are different keys.
///
/// # Examples
///
/// ```
/// use rttp_cache::cache::CacheKey;
/// use rttp_cache::http::Method;
///
/// let key = CacheKey::derive(&Method::Get, "/widgets/7");
/// assert!(key.as_str().starts_with("cache:"));
/// assert_eq!(key.as_str().len(), "cache:".len() + 64);
/// assert_eq!(key, CacheKey::derive(&Method::Get, "/widgets/7"));
/// assert_ne!(key, CacheKey::derive(&Method::Get, "/widgets/7?v=2"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(method: &Method, uri: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(method.as_str().as_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(uri.as_bytes());
        Self(format!("{NAMESPACE}{}", hex::encode(hasher.finalize())))
    }

    /// Key for `request`'s method and full request target.
    pub fn for_request(request: &Request) -> Self {
        Self::derive(request.method(), request.uri())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        // sha256("GET|/")
        assert_eq!(
            CacheKey::derive(&Method::Get, "/").as_str(),
            "cache:3a027fd0ec4cfe4d6bb5d5e4da9ae4ab3e074ff899985e7b1877b16d68e05ef5"
        );
    }

    #[test]
    fn deterministic() {
        let uris = ["/", "/widgets/7", "/search?q=rust&page=2", "/caf%C3%A9"];
        for uri in uris {
            assert_eq!(
                CacheKey::derive(&Method::Get, uri),
                CacheKey::derive(&Method::Get, uri)
            );
        }
    }

    #[test]
    fn query_string_distinguishes_keys() {
        assert_ne!(
            CacheKey::derive(&Method::Get, "/a?x=1"),
            CacheKey::derive(&Method::Get, "/a?x=2")
        );
    }

    #[test]
    fn query_order_is_not_normalized() {
        assert_ne!(
            CacheKey::derive(&Method::Get, "/a?x=1&y=2"),
            CacheKey::derive(&Method::Get, "/a?y=2&x=1")
        );
    }

    #[test]
    fn case_and_trailing_slash_are_not_normalized() {
        let base = CacheKey::derive(&Method::Get, "/Widgets");
        assert_ne!(base, CacheKey::derive(&Method::Get, "/widgets"));
        assert_ne!(base, CacheKey::derive(&Method::Get, "/Widgets/"));
    }

    #[test]
    fn method_distinguishes_keys() {
        assert_ne!(
            CacheKey::derive(&Method::Get, "/a"),
            CacheKey::derive(&Method::Head, "/a")
        );
    }

    #[test]
    fn boundary_shift_does_not_collide() {
        // "GET" + "|" + "/x" must differ from "GE" + "|" + "T/x" style splits.
        assert_ne!(
            CacheKey::derive(&Method::Get, "/x"),
            CacheKey::derive(&Method::Custom("GE".into()), "T/x")
        );
    }

    #[test]
    fn request_key_uses_full_target() {
        let request = Request::new(Method::Get, "/widgets/7?fields=id");
        assert_eq!(
            CacheKey::for_request(&request),
            CacheKey::derive(&Method::Get, "/widgets/7?fields=id")
        );
    }
}
