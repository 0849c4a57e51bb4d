use crate::Tag;
use alloc::vec::Vec;
use core::fmt;
use core::ops::Deref;
use itertools::Itertools;
use smallvec::SmallVec;

/// An ordered sequence of column [`Tag`]s.
///
/// Order is significant: an index over `[a, b]` is a different index than one over `[b, a]`,
/// and a foreign key pairs its child and parent tags positionally.
/// Most lists are short, so up to four tags are stored inline.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagList(SmallVec<[Tag; 4]>);

impl TagList {
    /// Returns an empty list.
    pub fn new() -> Self {
        Self(SmallVec::new())
    }

    /// Appends `tag` to the end of the list.
    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    /// Returns the position of `tag` in the list, if present.
    pub fn position(&self, tag: Tag) -> Option<usize> {
        self.0.iter().position(|t| *t == tag)
    }

    /// Returns whether any tag appears more than once.
    pub fn has_duplicates(&self) -> bool {
        self.0.iter().duplicates().next().is_some()
    }

    pub fn to_vec(&self) -> Vec<Tag> {
        self.0.to_vec()
    }
}

impl Deref for TagList {
    type Target = [Tag];

    fn deref(&self) -> &[Tag] {
        &self.0
    }
}

impl FromIterator<Tag> for TagList {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Tag>> for TagList {
    fn from(tags: Vec<Tag>) -> Self {
        Self(tags.into())
    }
}

impl<const N: usize> From<[u64; N]> for TagList {
    fn from(tags: [u64; N]) -> Self {
        tags.into_iter().map(Tag).collect()
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = core::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Debug for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.iter().map(|t| t.0)).finish()
    }
}

impl fmt::Display for TagList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn order_is_significant() {
        let ab = TagList::from([1, 2]);
        let ba = TagList::from([2, 1]);
        assert_ne!(ab, ba);
        assert_eq!(ab.position(Tag(2)), Some(1));
        assert_eq!(ab.to_string(), "[1, 2]");
    }

    #[test]
    fn detects_duplicates() {
        assert!(TagList::from([7, 3, 7]).has_duplicates());
        assert!(!TagList::from([7, 3]).has_duplicates());
    }

    proptest! {
        #[test]
        fn collect_preserves_order(tags in proptest::collection::vec(any::<u64>(), 0..12)) {
            let list: TagList = tags.iter().copied().map(Tag).collect();
            prop_assert_eq!(list.iter().map(|t| t.0).collect::<Vec<_>>(), tags);
        }
    }
}
