//! Group Matching
//!
//! Maps label names onto the configured mutual-exclusivity groups

use std::collections::HashSet;
use std::fmt;

use globset::{GlobBuilder, GlobMatcher};

use crate::config::GroupDefinition;
use crate::error::{Error, Result};

/// Group a label belongs to
///
/// Group identity is the position of the definition in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKey {
    /// Index of the first matching group definition
    Group(usize),

    /// The label matches no group and is never removed
    Ungrouped,
}

impl GroupKey {
    /// Whether the label takes part in conflict resolution
    pub fn is_grouped(&self) -> bool {
        matches!(self, GroupKey::Group(_))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Group(index) => write!(f, "group #{}", index),
            GroupKey::Ungrouped => write!(f, "ungrouped"),
        }
    }
}

/// Make `{` and `}` literal outside character classes
///
/// Group patterns have no alternation, so `{wip}` only matches `{wip}` and
/// an unbalanced brace is an ordinary character.
fn escape_braces(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    let mut in_class = false;

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                escaped.push(c);
                if let Some(next) = chars.next() {
                    escaped.push(next);
                }
            }
            '[' if !in_class => {
                in_class = true;
                escaped.push(c);
                // a leading `]` (after an optional negation) is a member
                if let Some(&negation) = chars.peek().filter(|n| **n == '!' || **n == '^') {
                    escaped.push(negation);
                    chars.next();
                }
                if chars.peek() == Some(&']') {
                    escaped.push(']');
                    chars.next();
                }
            }
            ']' if in_class => {
                in_class = false;
                escaped.push(c);
            }
            '{' if !in_class => escaped.push_str("[{]"),
            '}' if !in_class => escaped.push_str("[}]"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// A compiled group definition
#[derive(Debug, Clone)]
enum CompiledGroup {
    Pattern(GlobMatcher),
    Literals(HashSet<String>),
}

impl CompiledGroup {
    fn compile(index: usize, definition: &GroupDefinition) -> Result<Self> {
        match definition {
            GroupDefinition::Pattern(pattern) => {
                let glob = GlobBuilder::new(&escape_braces(pattern))
                    .literal_separator(false)
                    .backslash_escape(true)
                    .build()
                    .map_err(|e| {
                        Error::configuration(format!(
                            "group #{} has an invalid pattern '{}': {}",
                            index, pattern, e
                        ))
                    })?;
                Ok(CompiledGroup::Pattern(glob.compile_matcher()))
            }
            GroupDefinition::Literals(names) => {
                Ok(CompiledGroup::Literals(names.iter().cloned().collect()))
            }
        }
    }

    fn accepts(&self, label_name: &str) -> bool {
        match self {
            CompiledGroup::Pattern(glob) => glob.is_match(label_name),
            CompiledGroup::Literals(names) => names.contains(label_name),
        }
    }
}

/// Group Matcher
///
/// Compiled form of an ordered list of group definitions
#[derive(Debug, Clone, Default)]
pub struct GroupMatcher {
    groups: Vec<CompiledGroup>,
}

impl GroupMatcher {
    /// Compile group definitions
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if a pattern is not a valid glob
    pub fn new(definitions: &[GroupDefinition]) -> Result<Self> {
        let groups = definitions
            .iter()
            .enumerate()
            .map(|(index, definition)| CompiledGroup::compile(index, definition))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups })
    }

    /// Find the group a label name belongs to
    ///
    /// The earliest accepting definition wins when several match.
    pub fn match_group(&self, label_name: &str) -> GroupKey {
        self.groups
            .iter()
            .position(|group| group.accepts(label_name))
            .map_or(GroupKey::Ungrouped, GroupKey::Group)
    }

    /// Number of compiled groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether no groups are configured
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Find the group a label name belongs to without keeping the compiled matcher
///
/// # Errors
/// Returns [`Error::Configuration`] if a pattern is not a valid glob
pub fn match_group(groups: &[GroupDefinition], label_name: &str) -> Result<GroupKey> {
    Ok(GroupMatcher::new(groups)?.match_group(label_name))
}
