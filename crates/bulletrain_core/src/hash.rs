//! # Identifier Hashing
//!
//! String identifiers ("SIDs") for archives and resources.
//!
//! The hash is Jenkins one-at-a-time. It is fast and deterministic but NOT
//! collision-free, so every lookup keyed by a SID also compares the name.
//! [`NameKey`] bundles both and orders by SID first, then by name.
//!
//! Because [`sid`] is a `const fn`, extension tables are computed at compile
//! time and can never drift from the algorithm.

use std::fmt;

/// A 32-bit string identifier.
pub type Sid = u32;

/// Longest stored name, in bytes. Longer names are truncated.
pub const MAX_NAME_LEN: usize = 15;

/// Jenkins one-at-a-time hash of `bytes`.
///
/// The empty string hashes to `0`.
#[must_use]
pub const fn sid(bytes: &[u8]) -> Sid {
    let mut hash: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        hash = hash.wrapping_add(bytes[i] as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
        i += 1;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

/// Convenience wrapper over [`sid`] for string slices.
#[inline]
#[must_use]
pub fn sid_str(s: &str) -> Sid {
    sid(s.as_bytes())
}

/// Cuts `s` at the first non-printing character.
///
/// Names coming from user input or script code may carry trailing newlines.
#[must_use]
pub fn clip_printable(s: &str) -> &str {
    match s.find(|c: char| c.is_control()) {
        Some(end) => &s[..end],
        None => s,
    }
}

/// Truncates `s` to at most [`MAX_NAME_LEN`] bytes on a char boundary.
#[must_use]
pub fn truncate_name(s: &str) -> &str {
    if s.len() <= MAX_NAME_LEN {
        return s;
    }
    let mut end = MAX_NAME_LEN;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Returns the extension of `name`: everything from the last `.` onward.
///
/// A dot in the first position does not count, and a name without a dot is
/// returned whole.
#[must_use]
pub fn extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[pos..],
        _ => name,
    }
}

/// A name together with its SID.
///
/// Ordering is by SID first and by name second, which is the order buckets
/// and archive chains are kept in.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NameKey {
    sid: Sid,
    name: String,
}

impl NameKey {
    /// Builds a key from a raw name: clipped at the first control character,
    /// truncated to [`MAX_NAME_LEN`] bytes, then hashed.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let name = truncate_name(clip_printable(raw));
        Self {
            sid: sid_str(name),
            name: name.to_owned(),
        }
    }

    /// Builds a key that keeps the whole name: clipped at the first control
    /// character, never truncated. Archive names are file paths, so two
    /// archives sharing a prefix must stay distinct.
    #[must_use]
    pub fn unbounded(raw: &str) -> Self {
        let name = clip_printable(raw);
        Self {
            sid: sid_str(name),
            name: name.to_owned(),
        }
    }

    /// The identifier.
    #[inline]
    #[must_use]
    pub const fn sid(&self) -> Sid {
        self.sid
    }

    /// The stored name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_string_hashes_to_zero() {
        assert_eq!(sid(b""), 0);
        assert_eq!(sid_str(""), 0);
    }

    #[test]
    fn test_known_vectors() {
        // Reference values for Jenkins one-at-a-time.
        assert_eq!(sid(b"a"), 0xca2e_9442);
        assert_eq!(
            sid(b"The quick brown fox jumps over the lazy dog"),
            0x519e_91f5
        );
    }

    #[test]
    fn test_deterministic_and_sensitive() {
        assert_eq!(sid_str("test.tgz"), sid_str("test.tgz"));
        assert_ne!(sid_str("test.tgz"), sid_str("test.tgy"));
        assert_ne!(sid_str("a.txt"), sid_str("b.txt"));
    }

    #[test]
    fn test_const_evaluation() {
        const PNG: Sid = sid(b".png");
        assert_eq!(PNG, sid_str(".png"));
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("a.txt"), ".txt");
        assert_eq!(extension("dir/sprite.sheet.png"), ".png");
        assert_eq!(extension("README"), "README");
        assert_eq!(extension(".png"), ".png");
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short.txt"), "short.txt");
        assert_eq!(truncate_name("a_very_long_name.txt"), "a_very_long_nam");
        // 'é' is two bytes and straddles the limit
        let name = "aaaaaaaaaaaaaaé";
        assert_eq!(truncate_name(name), "aaaaaaaaaaaaaa");
    }

    #[test]
    fn test_name_key_clips_and_orders() {
        let key = NameKey::new("stage1.tgz\n");
        assert_eq!(key.name(), "stage1.tgz");
        assert_eq!(key.sid(), sid_str("stage1.tgz"));

        let a = NameKey::new("a.txt");
        let b = NameKey::new("b.txt");
        assert_eq!(a.cmp(&b), a.sid().cmp(&b.sid()));
    }

    #[test]
    fn test_unbounded_key_keeps_long_names_apart() {
        let a = NameKey::unbounded("stage1_bullets_a.tgz\n");
        let b = NameKey::unbounded("stage1_bullets_b.tgz");
        assert_eq!(a.name(), "stage1_bullets_a.tgz");
        assert_ne!(a, b);
        assert_eq!(a.sid(), sid_str("stage1_bullets_a.tgz"));

        // The bounded form collapses them
        assert_eq!(
            NameKey::new("stage1_bullets_a.tgz"),
            NameKey::new("stage1_bullets_b.tgz")
        );
    }
}
