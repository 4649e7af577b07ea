//! Name helpers for generated objects
//!
//! Generated names must be valid DNS labels: lowercase alphanumerics and
//! `-`, at most 63 characters, starting and ending with an alphanumeric.

/// Longest valid DNS label.
pub const MAX_NAME_LENGTH: usize = 63;

/// Longest service name prefix used for instance addresses; leaves room for
/// the `-z{az}-{index}` suffix.
pub const MAX_SERVICE_NAME_LENGTH: usize = 53;

const DIGEST_LENGTH: usize = 8;

/// Turn an arbitrary name into a DNS label.
pub fn sanitize(name: &str) -> String {
    let lowered: String = name
        .chars()
        .filter_map(|c| match c {
            'a'..='z' | '0'..='9' | '-' => Some(c),
            'A'..='Z' => Some(c.to_ascii_lowercase()),
            '_' | '.' => Some('-'),
            _ => None,
        })
        .collect();
    truncate(lowered.trim_matches('-'), MAX_NAME_LENGTH)
}

/// Shorten `name` to at most `max` characters.
///
/// Names that fit are returned unchanged. Longer names keep a prefix and
/// end in `-` plus a short digest of the full name, so distinct long names
/// stay distinct.
pub fn truncate(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    let digest = blake3::hash(name.as_bytes()).to_hex();
    let mut keep = max.saturating_sub(DIGEST_LENGTH + 1);
    while !name.is_char_boundary(keep) {
        keep -= 1;
    }
    let prefix = name[..keep].trim_end_matches('-');
    format!("{prefix}-{}", &digest.as_str()[..DIGEST_LENGTH])
}

/// Sanitized service name of at most `max` characters.
pub fn truncated_service_name(name: &str, max: usize) -> String {
    truncate(&sanitize(name), max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("Cloud_Controller.ng"), "cloud-controller-ng");
        assert_eq!(sanitize("_api!"), "api");
        assert_eq!(sanitize("nats"), "nats");
    }

    #[test]
    fn test_truncate_keeps_short_names() {
        assert_eq!(truncate("api", 53), "api");
    }

    #[test]
    fn test_truncate_long_names() {
        let a = "a".repeat(70);
        let b = format!("{}b", "a".repeat(69));
        let ta = truncate(&a, 53);
        let tb = truncate(&b, 53);
        assert!(ta.len() <= 53);
        assert_ne!(ta, tb);
        assert_eq!(ta, truncate(&a, 53));
        assert!(ta.starts_with("aaaa"));
    }

    #[test]
    fn test_sanitize_bounds_length() {
        let long = "Group_".repeat(20);
        assert!(sanitize(&long).len() <= MAX_NAME_LENGTH);
    }
}
