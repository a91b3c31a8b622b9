use std::fmt;

/// Ordered tag strings, in the order they were supplied.
///
/// Used both for the operator's `--tag` filter and for a peer's tag
/// annotation. Duplicates are kept and no value is rejected, the empty
/// string included. A peer without tags carries an empty `TagSet`, never a
/// missing one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet(Vec<String>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: impl Into<String>) {
        self.0.push(tag.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.iter().any(|t| t == tag)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<String>> for TagSet {
    fn from(tags: Vec<String>) -> Self {
        Self(tags)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(" "))
    }
}

/// Decide whether a peer carrying `peer_tags` passes `filter`.
///
/// An empty filter means no filtering was requested and every peer passes.
/// Otherwise the peer passes when at least one of its tags appears in the
/// filter (exact string equality).
pub fn matches(peer_tags: &TagSet, filter: &TagSet) -> bool {
    filter.is_empty() || peer_tags.iter().any(|tag| filter.contains(tag))
}
