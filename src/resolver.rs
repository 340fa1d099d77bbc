//! Conflict Resolution
//!
//! Decides which labels must go so that every group keeps a single member

use std::collections::HashSet;

use crate::config::JugglerConfig;
use crate::error::Result;
use crate::github::Label;
use crate::matcher::{GroupKey, GroupMatcher};

/// Conflict Resolver
///
/// Pure, synchronous resolution over an already fetched label snapshot
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    matcher: GroupMatcher,
}

impl ConflictResolver {
    /// Create a resolver for a group configuration
    ///
    /// # Errors
    /// Returns [`crate::Error::Configuration`] if a group pattern is invalid
    pub fn new(config: &JugglerConfig) -> Result<Self> {
        Ok(Self::from_matcher(GroupMatcher::new(&config.groups)?))
    }

    /// Create a resolver from an already compiled matcher
    pub fn from_matcher(matcher: GroupMatcher) -> Self {
        Self { matcher }
    }

    /// Group matcher used by this resolver
    pub fn matcher(&self) -> &GroupMatcher {
        &self.matcher
    }

    /// Order labels by keep preference
    ///
    /// Just-applied labels come first, then the rest. Both parts keep the
    /// order the API returned them in; creation time is not consulted.
    pub fn prioritize<'a>(labels: &'a [Label], just_applied: &HashSet<String>) -> Vec<&'a Label> {
        let (priority, remainder): (Vec<&Label>, Vec<&Label>) = labels
            .iter()
            .partition(|label| just_applied.contains(&label.id));

        priority.into_iter().chain(remainder).collect()
    }

    /// Labels to remove, in preference order
    ///
    /// # Arguments
    /// - `current`: Labels currently on the issue or pull request
    /// - `just_applied`: Identifiers of the labels that triggered the evaluation
    pub fn conflicting_labels<'a>(
        &self,
        current: &'a [Label],
        just_applied: &HashSet<String>,
    ) -> Vec<&'a Label> {
        let mut occupied = HashSet::new();

        Self::prioritize(current, just_applied)
            .into_iter()
            .filter(|label| {
                let key = self.matcher.match_group(&label.name);
                // first member of a group is kept
                key != GroupKey::Ungrouped && !occupied.insert(key)
            })
            .collect()
    }

    /// Identifiers of the labels to remove
    ///
    /// An empty result means nothing conflicts and no removal must be issued.
    pub fn resolve(&self, current: &[Label], just_applied: &HashSet<String>) -> Vec<String> {
        self.conflicting_labels(current, just_applied)
            .into_iter()
            .map(|label| label.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupDefinition;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn label(id: &str, name: &str) -> Label {
        Label {
            id: id.to_string(),
            name: name.to_string(),
            created_at: None,
        }
    }

    fn ids(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn resolver(groups: Vec<GroupDefinition>) -> ConflictResolver {
        ConflictResolver::new(&JugglerConfig::new(groups)).unwrap()
    }

    fn remaining(current: &[Label], removed: &[String]) -> Vec<Label> {
        current
            .iter()
            .filter(|label| !removed.contains(&label.id))
            .cloned()
            .collect()
    }

    #[test]
    fn test_just_applied_label_is_kept() {
        let resolver = resolver(vec![GroupDefinition::literals(["bug", "wontfix"])]);
        let current = vec![label("1", "bug"), label("2", "wontfix")];

        assert_eq!(resolver.resolve(&current, &ids(&["2"])), vec!["1"]);
        assert_eq!(resolver.resolve(&current, &ids(&["1"])), vec!["2"]);
    }

    #[test]
    fn test_glob_group_replaces_previous_member() {
        let resolver = resolver(vec![GroupDefinition::pattern("priority:*")]);
        let current = vec![label("high", "priority:high"), label("low", "priority:low")];

        assert_eq!(resolver.resolve(&current, &ids(&["low"])), vec!["high"]);
    }

    #[test]
    fn test_no_conflict_yields_empty_removal() {
        let resolver = resolver(vec![
            GroupDefinition::pattern("priority:*"),
            GroupDefinition::literals(["bug", "feature"]),
        ]);
        let current = vec![
            label("1", "priority:high"),
            label("2", "bug"),
            label("3", "help wanted"),
        ];

        assert!(resolver.resolve(&current, &ids(&["2"])).is_empty());
        assert!(resolver.resolve(&[], &ids(&["2"])).is_empty());
    }

    #[test]
    fn test_ungrouped_labels_never_removed() {
        let resolver = resolver(vec![GroupDefinition::literals(["bug", "feature"])]);
        let current = vec![
            label("1", "docs"),
            label("2", "docs"),
            label("3", "bug"),
            label("4", "feature"),
        ];

        assert_eq!(resolver.resolve(&current, &ids(&["4"])), vec!["3"]);
    }

    #[test]
    fn test_empty_configuration_removes_nothing() {
        let resolver = resolver(Vec::new());
        let current = vec![label("1", "bug"), label("2", "bug")];

        assert!(resolver.resolve(&current, &ids(&["1"])).is_empty());
    }

    #[test]
    fn test_without_just_applied_api_order_decides() {
        let resolver = resolver(vec![GroupDefinition::pattern("size/*")]);
        let current = vec![
            label("m", "size/m"),
            label("s", "size/s"),
            label("l", "size/l"),
        ];

        assert_eq!(resolver.resolve(&current, &HashSet::new()), vec!["s", "l"]);
    }

    #[test]
    fn test_missing_just_applied_id_has_no_effect() {
        let resolver = resolver(vec![GroupDefinition::pattern("size/*")]);
        let current = vec![label("m", "size/m"), label("s", "size/s")];

        assert_eq!(resolver.resolve(&current, &ids(&["gone"])), vec!["s"]);
    }

    #[test]
    fn test_several_just_applied_in_one_group_keep_api_order() {
        let resolver = resolver(vec![GroupDefinition::pattern("size/*")]);
        let current = vec![
            label("m", "size/m"),
            label("s", "size/s"),
            label("l", "size/l"),
        ];

        // "s" precedes "l" in the API order, so the just-applied "l" goes too
        assert_eq!(resolver.resolve(&current, &ids(&["l", "s"])), vec!["l", "m"]);
    }

    #[test]
    fn test_creation_time_is_not_consulted() {
        let resolver = resolver(vec![GroupDefinition::literals(["a", "b"])]);
        let mut newer = label("1", "a");
        newer.created_at = Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let mut older = label("2", "b");
        older.created_at = Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());

        assert_eq!(resolver.resolve(&[newer, older], &HashSet::new()), vec!["2"]);
    }

    #[test]
    fn test_label_binds_to_earliest_group_only() {
        let resolver = resolver(vec![
            GroupDefinition::pattern("priority:*"),
            GroupDefinition::literals(["priority:high", "urgent"]),
        ]);
        let current = vec![label("1", "urgent"), label("2", "priority:high")];

        // "priority:high" belongs to group 0 only, so it does not evict "urgent"
        assert!(resolver.resolve(&current, &ids(&["2"])).is_empty());
    }

    #[test]
    fn test_groups_resolved_independently() {
        let resolver = resolver(vec![
            GroupDefinition::pattern("priority:*"),
            GroupDefinition::pattern("status:*"),
        ]);
        let current = vec![
            label("p1", "priority:high"),
            label("s1", "status:todo"),
            label("p2", "priority:low"),
            label("s2", "status:done"),
        ];

        assert_eq!(resolver.resolve(&current, &ids(&["s2"])), vec!["s1", "p2"]);
    }

    #[test]
    fn test_prioritize_moves_just_applied_first() {
        let current = vec![label("1", "a"), label("2", "b"), label("3", "c")];
        let ordered: Vec<&str> = ConflictResolver::prioritize(&current, &ids(&["3", "2"]))
            .into_iter()
            .map(|label| label.id.as_str())
            .collect();

        assert_eq!(ordered, vec!["2", "3", "1"]);
    }

    #[test]
    fn test_each_group_keeps_exactly_one_member() {
        let resolver = resolver(vec![
            GroupDefinition::pattern("priority:*"),
            GroupDefinition::literals(["bug", "feature", "question"]),
            GroupDefinition::pattern("size/?"),
        ]);
        let current = vec![
            label("1", "priority:low"),
            label("2", "bug"),
            label("3", "size/s"),
            label("4", "priority:high"),
            label("5", "question"),
            label("6", "size/m"),
            label("7", "feature"),
            label("8", "docs"),
        ];

        let removed = resolver.resolve(&current, &ids(&["5"]));
        let after = remaining(&current, &removed);

        let mut members: HashMap<GroupKey, usize> = HashMap::new();
        for label in &current {
            let key = resolver.matcher().match_group(&label.name);
            if key.is_grouped() {
                members.entry(key).or_insert(0);
            }
        }
        for label in &after {
            let key = resolver.matcher().match_group(&label.name);
            if key.is_grouped() {
                *members.entry(key).or_insert(0) += 1;
            }
        }

        assert_eq!(members.len(), 3);
        assert!(members.values().all(|count| *count == 1));
        assert!(after.iter().any(|label| label.id == "5"));
        assert!(after.iter().any(|label| label.id == "8"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let resolver = resolver(vec![
            GroupDefinition::pattern("priority:*"),
            GroupDefinition::literals(["bug", "feature"]),
        ]);
        let current = vec![
            label("1", "priority:low"),
            label("2", "bug"),
            label("3", "priority:high"),
            label("4", "feature"),
        ];
        let just_applied = ids(&["3"]);

        let removed = resolver.resolve(&current, &just_applied);
        assert_eq!(removed, vec!["1", "4"]);

        let after = remaining(&current, &removed);
        assert!(resolver.resolve(&after, &just_applied).is_empty());
    }
}
