//! Tag-based action selection

use std::collections::BTreeSet;

use crate::action::Action;

/// Tag that selects every action when given in `tags`
pub const ALL: &str = "all";

/// Selects actions by tag; relative order is never changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    tags: BTreeSet<String>,
    skip_tags: BTreeSet<String>,
}

impl TagFilter {
    /// Filter that selects every action
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Select actions carrying any of `tags` (all when empty), then drop
    /// those carrying any of `skip_tags`
    pub fn new<I, S, J, T>(tags: I, skip_tags: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            skip_tags: skip_tags.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `action` should execute
    #[must_use]
    pub fn matches(&self, action: &Action) -> bool {
        let included = self.tags.is_empty()
            || self.tags.contains(ALL)
            || !self.tags.is_disjoint(&action.tags);
        included && self.skip_tags.is_disjoint(&action.tags)
    }
}
