//! Cache key layout: `"<entity>:<id>"`.

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::codec::{Codec, CodecError, Json};

/// Prefix of per-subject permission documents.
pub const AUTHZ_PREFIX: &str = "authz";

/// Prefix of single catalog resources.
pub const RESOURCE_PREFIX: &str = "resource";

/// Prefix of catalog list queries.
pub const RESOURCES_PREFIX: &str = "resources";

/// Key of a subject's permission document.
#[must_use]
pub fn authz_key(subject_id: &str) -> String {
    format!("{AUTHZ_PREFIX}:{subject_id}")
}

/// Key of a single catalog resource.
#[must_use]
pub fn resource_key(id: &Uuid) -> String {
    format!("{RESOURCE_PREFIX}:{id}")
}

/// Key of a catalog list query, fingerprinted from its serialized form.
///
/// Equal queries always produce equal keys.
pub fn resources_key<Q: Serialize>(query: &Q) -> Result<String, CodecError> {
    Ok(format!("{RESOURCES_PREFIX}:{}", fingerprint(query)?))
}

/// Hex SHA-256 of the JSON encoding of `query`.
pub fn fingerprint<Q: Serialize>(query: &Q) -> Result<String, CodecError> {
    let bytes = Json.encode(query)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Entity part of a key, used as a metrics label.
#[must_use]
pub fn key_kind(key: &str) -> &str {
    key.split_once(':').map_or(key, |(kind, _)| kind)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Query<'a> {
        action: &'a str,
        limit: u32,
    }

    #[test]
    fn test_key_layout() {
        let id = Uuid::nil();
        assert_eq!(authz_key("u-1"), "authz:u-1");
        assert_eq!(
            resource_key(&id),
            "resource:00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_resources_key_is_stable() {
        let a = resources_key(&Query { action: "read", limit: 50 }).unwrap();
        let b = resources_key(&Query { action: "read", limit: 50 }).unwrap();
        let c = resources_key(&Query { action: "read", limit: 51 }).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("resources:"));
        assert_eq!(a.len(), "resources:".len() + 64);
    }

    #[test]
    fn test_key_kind() {
        assert_eq!(key_kind("authz:u-1"), "authz");
        assert_eq!(key_kind("resources:abc"), "resources");
        assert_eq!(key_kind("bare"), "bare");
    }
}
