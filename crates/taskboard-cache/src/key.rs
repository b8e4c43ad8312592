//! Cache keys and staleness policy.

use std::fmt;

/// Logical resource key. Keys compare structurally by their segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// `["session", "probe"]`
    Session,
    /// `["tasks"]`
    Tasks,
    /// `["tasks", "stats"]`
    TaskStats,
    /// `["tasks", "progress-stats"]`
    ProgressStats,
}

impl QueryKey {
    pub const ALL: [QueryKey; 4] = [
        QueryKey::Session,
        QueryKey::Tasks,
        QueryKey::TaskStats,
        QueryKey::ProgressStats,
    ];

    pub fn segments(&self) -> &'static [&'static str] {
        match self {
            QueryKey::Session => &["session", "probe"],
            QueryKey::Tasks => &["tasks"],
            QueryKey::TaskStats => &["tasks", "stats"],
            QueryKey::ProgressStats => &["tasks", "progress-stats"],
        }
    }

    /// True when `prefix`'s segments are a leading run of this key's segments.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.segments().starts_with(prefix.segments())
    }

    /// Every key matched by `prefix`, in declaration order.
    pub fn matching(prefix: &QueryKey) -> impl Iterator<Item = QueryKey> + '_ {
        Self::ALL.into_iter().filter(move |key| key.starts_with(prefix))
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.segments().join(","))
    }
}

/// When cached data must be refetched on the next query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StalePolicy {
    /// Fresh once loaded, until explicitly invalidated.
    Never,
    /// Every query revalidates.
    Always,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tasks_prefix_matches_stats() {
        let matched: Vec<_> = QueryKey::matching(&QueryKey::Tasks).collect();
        assert_eq!(
            matched,
            [QueryKey::Tasks, QueryKey::TaskStats, QueryKey::ProgressStats]
        );
    }

    #[test]
    fn test_leaf_prefix_matches_only_itself() {
        let matched: Vec<_> = QueryKey::matching(&QueryKey::TaskStats).collect();
        assert_eq!(matched, [QueryKey::TaskStats]);
        assert!(!QueryKey::Tasks.starts_with(&QueryKey::TaskStats));
        assert!(!QueryKey::Session.starts_with(&QueryKey::Tasks));
    }

    #[test]
    fn test_display() {
        assert_eq!(QueryKey::Session.to_string(), "[session,probe]");
    }
}
