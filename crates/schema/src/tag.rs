//! Deterministic generation of column tags.
//!
//! A new column's tag is derived by hashing the table name, the kinds of the table's existing columns,
//! and the new column's name and kind, then masking to [`Tag::GENERATED_MASK`].
//! Generation is a pure function of those inputs, so two repositories adding the same column
//! to the same table get the same tag.
//! A tag that collides with any tag the table has ever used is re-hashed until it doesn't.

use std::collections::BTreeSet;
use strata_primitives::Tag;
use strata_sats::ValueKind;

fn tag_from_digest(digest: &blake3::Hash) -> Tag {
    let mut low = [0; 8];
    low.copy_from_slice(&digest.as_bytes()[..8]);
    Tag(u64::from_le_bytes(low) & Tag::GENERATED_MASK)
}

fn digest(table_name: &str, existing_kinds: &[ValueKind], col_name: &str, kind: ValueKind) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(table_name.as_bytes());
    hasher.update(&[0]);
    for kind in existing_kinds {
        hasher.update(&[*kind as u8]);
    }
    hasher.update(&[0xff]);
    hasher.update(col_name.as_bytes());
    hasher.update(&[kind as u8]);
    hasher.finalize()
}

/// Generates the tag for a single new column, ignoring collisions.
pub fn generate_tag(table_name: &str, existing_kinds: &[ValueKind], col_name: &str, kind: ValueKind) -> Tag {
    tag_from_digest(&digest(table_name, existing_kinds, col_name, kind))
}

/// Generates tags for `new_cols`, in order, avoiding every tag in `used`.
///
/// Each generated column counts as existing for the columns after it,
/// and no two generated tags collide with each other.
pub fn generate_tags(
    table_name: &str,
    existing_kinds: &[ValueKind],
    new_cols: &[(&str, ValueKind)],
    used: &BTreeSet<Tag>,
) -> Vec<Tag> {
    let mut kinds = existing_kinds.to_vec();
    let mut tags = Vec::with_capacity(new_cols.len());
    for &(name, kind) in new_cols {
        let mut digest = digest(table_name, &kinds, name, kind);
        let mut tag = tag_from_digest(&digest);
        while used.contains(&tag) || tags.contains(&tag) || !tag.is_valid() {
            digest = blake3::hash(digest.as_bytes());
            tag = tag_from_digest(&digest);
        }
        tags.push(tag);
        kinds.push(kind);
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let kinds = [ValueKind::Int, ValueKind::String];
        let a = generate_tag("people", &kinds, "age", ValueKind::Int);
        let b = generate_tag("people", &kinds, "age", ValueKind::Int);
        assert_eq!(a, b);
        assert!(a.0 <= Tag::GENERATED_MASK);
        assert_ne!(a, generate_tag("people", &kinds, "age", ValueKind::Uint));
        assert_ne!(a, generate_tag("persons", &kinds, "age", ValueKind::Int));
    }

    #[test]
    fn collisions_are_rehashed() {
        let kinds = [ValueKind::Int];
        let first = generate_tag("t", &kinds, "c", ValueKind::Int);
        let used = BTreeSet::from([first]);
        let tags = generate_tags("t", &kinds, &[("c", ValueKind::Int)], &used);
        assert_ne!(tags[0], first);
        assert!(tags[0].0 <= Tag::GENERATED_MASK);
    }

    #[test]
    fn batch_matches_sequential_generation() {
        let tags = generate_tags(
            "t",
            &[ValueKind::Int],
            &[("a", ValueKind::String), ("b", ValueKind::Bool)],
            &BTreeSet::new(),
        );
        assert_eq!(tags[0], generate_tag("t", &[ValueKind::Int], "a", ValueKind::String));
        assert_eq!(
            tags[1],
            generate_tag("t", &[ValueKind::Int, ValueKind::String], "b", ValueKind::Bool)
        );
    }
}
