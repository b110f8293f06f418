//! Resource path to match-pattern normalization.
//!
//! A requested path such as `/users/3f0c…/posts/*` is turned into an
//! anchored regex matching catalog templates like
//! `/users/{user_id}/posts/{post_id}`. UUID and `*` segments become
//! [`PLACEHOLDER`]; every other character passes through as written.

use regex::Regex;
use uuid::Uuid;

/// Regex matching one `{name}` template segment.
pub const PLACEHOLDER: &str = r"\{[a-z_]{1,50}\}";

/// Length of a hyphenated UUID.
const UUID_LEN: usize = 36;

/// Normalizes `path` into an anchored pattern.
///
/// Total and idempotent: any existing `^`/`$` anchors are stripped before
/// re-anchoring, and placeholders are left as they are.
///
/// ```
/// use tessera_auth::authz::pattern::normalize;
///
/// assert_eq!(normalize("/users/*"), r"^/users/\{[a-z_]{1,50}\}$");
/// assert_eq!(normalize(""), "^$");
/// ```
#[must_use]
pub fn normalize(path: &str) -> String {
    let body = path.strip_prefix('^').unwrap_or(path);
    let body = body.strip_suffix('$').unwrap_or(body);

    let segments: Vec<&str> = body
        .split('/')
        .map(|segment| {
            if is_wildcard_segment(segment) {
                PLACEHOLDER
            } else {
                segment
            }
        })
        .collect();

    format!("^{}$", segments.join("/"))
}

/// Compiles the normalized form of `path`.
///
/// # Errors
/// Fails when the literal parts of `path` are not valid regex syntax.
pub fn compile(path: &str) -> Result<Regex, regex::Error> {
    Regex::new(&normalize(path))
}

/// Compiles the matcher for a requested path.
///
/// Unlike [`compile`], only UUID and `*` segments are patterns here. Every
/// other segment, regex syntax and anchors included, matches literally.
///
/// # Errors
/// Fails only when the regex exceeds the engine's size limit.
pub fn request_matcher(path: &str) -> Result<Regex, regex::Error> {
    let segments: Vec<String> = path
        .split('/')
        .map(|segment| {
            if is_wildcard_segment(segment) {
                PLACEHOLDER.to_string()
            } else {
                regex::escape(segment)
            }
        })
        .collect();
    Regex::new(&format!("^{}$", segments.join("/")))
}

/// Returns `true` if `path` contains a UUID or `*` segment.
#[must_use]
pub fn has_wildcard(path: &str) -> bool {
    path.split('/').any(is_wildcard_segment)
}

fn is_wildcard_segment(segment: &str) -> bool {
    segment == "*" || (segment.len() == UUID_LEN && Uuid::try_parse(segment).is_ok())
}
