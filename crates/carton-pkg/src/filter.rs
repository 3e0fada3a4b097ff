//! Dependency filters built from whitespace-separated pattern lists.
//!
//! A pattern is either exact or a prefix ending in `*`:
//!
//! - `commons-logging` matches a group id, an artifact id, or
//!   `group:artifact` equal to it
//! - `org.apache.*` matches any of those starting with `org.apache.`
//! - `org.slf4j:slf4j-*` matches the group and artifact parts separately
//! - `org.acme:core:1.*` additionally constrains the version
//!
//! An empty pattern list never matches.

use crate::coordinate::Coordinate;
use crate::ownership::PackageOwnership;
use crate::tree::{DependencyNode, DependencyTree, NodeId};

/// A parsed dependency predicate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Filter {
    /// Never matches.
    #[default]
    None,
    /// Always matches.
    Any,
    /// Equal to the text.
    Exact(String),
    /// Starts with the text.
    Prefix(String),
    /// Separate terms for the group, artifact and version.
    Coordinate {
        group: Box<Filter>,
        artifact: Box<Filter>,
        version: Box<Filter>,
    },
    /// Matches when any member matches.
    Or(Vec<Filter>),
}

impl Filter {
    /// Parse a whitespace-separated pattern list.
    pub fn parse(patterns: &str) -> Self {
        let mut filters: Vec<Filter> = patterns.split_whitespace().map(parse_pattern).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.remove(0),
            _ => Self::Or(filters),
        }
    }

    /// Match a single text term.
    pub fn matches_text(&self, text: &str) -> bool {
        match self {
            Self::None | Self::Coordinate { .. } => false,
            Self::Any => true,
            Self::Exact(expected) => text == expected,
            Self::Prefix(prefix) => text.starts_with(prefix.as_str()),
            Self::Or(filters) => filters.iter().any(|f| f.matches_text(text)),
        }
    }

    /// Match a coordinate.
    pub fn matches_coordinate(&self, coordinate: &Coordinate) -> bool {
        match self {
            Self::None => false,
            Self::Any => true,
            Self::Exact(_) | Self::Prefix(_) => {
                self.matches_text(&coordinate.group)
                    || self.matches_text(&coordinate.artifact)
                    || self.matches_text(&coordinate.key())
            }
            Self::Coordinate {
                group,
                artifact,
                version,
            } => {
                group.matches_text(&coordinate.group)
                    && artifact.matches_text(&coordinate.artifact)
                    && version.matches_text(&coordinate.version)
            }
            Self::Or(filters) => filters.iter().any(|f| f.matches_coordinate(coordinate)),
        }
    }

    pub fn matches(&self, node: &DependencyNode) -> bool {
        self.matches_coordinate(node.coordinate())
    }
}

fn parse_pattern(pattern: &str) -> Filter {
    if !pattern.contains(':') {
        return parse_term(pattern);
    }
    let mut parts = pattern.splitn(3, ':');
    let group = parse_term(parts.next().unwrap_or_default());
    let artifact = parse_term(parts.next().unwrap_or_default());
    let version = parse_term(parts.next().unwrap_or_default());
    Filter::Coordinate {
        group: Box::new(group),
        artifact: Box::new(artifact),
        version: Box::new(version),
    }
}

fn parse_term(term: &str) -> Filter {
    if term.is_empty() || term.chars().all(|c| c == '*') {
        Filter::Any
    } else if let Some(prefix) = term.strip_suffix('*') {
        Filter::Prefix(prefix.to_string())
    } else {
        Filter::Exact(term.to_string())
    }
}

/// The five predicates driving classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationFilters {
    /// Dependencies provided by the runtime.
    pub shared: Filter,
    /// Dependencies that must be required as modules.
    pub require_as_module: Filter,
    /// Dependencies dropped entirely.
    pub excluded: Filter,
    /// Optional dependencies explicitly opted in.
    pub optional: Filter,
    /// Shared dependencies whose exports become imports.
    pub import_exports: Filter,
}

impl ClassificationFilters {
    /// Excluded by pattern, or every exported package is owned elsewhere.
    pub fn is_excluded(
        &self,
        tree: &DependencyTree,
        id: NodeId,
        ownership: &PackageOwnership,
    ) -> bool {
        self.excluded.matches(tree.node(id)) || ownership.all_packages_hidden(tree, id)
    }

    /// An optional dependency (or one with optional descendants) that the
    /// optional filter opts in.
    pub fn is_optional_included(&self, tree: &DependencyTree, id: NodeId) -> bool {
        self.optional.matches(tree.node(id)) && tree.is_this_or_descendant_optional(id)
    }

    pub fn is_shared_or_required(&self, node: &DependencyNode) -> bool {
        self.shared.matches(node) || self.require_as_module.matches(node)
    }

    /// Predicate handed to dependency collection: prune optional
    /// dependencies that were not opted in.
    pub fn excludes_unselected_optional(&self, coordinate: &Coordinate, optional: bool) -> bool {
        optional && !self.optional.matches_coordinate(coordinate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(group: &str, artifact: &str, version: &str) -> Coordinate {
        Coordinate::new(group, artifact, version)
    }

    #[test]
    fn test_parse_empty_never_matches() {
        let filter = Filter::parse("   ");
        assert_eq!(filter, Filter::None);
        assert!(!filter.matches_coordinate(&coord("a", "b", "1")));
    }

    #[test]
    fn test_parse_variants() {
        assert_eq!(Filter::parse("*"), Filter::Any);
        assert_eq!(Filter::parse("org.acme"), Filter::Exact("org.acme".into()));
        assert_eq!(Filter::parse("org.*"), Filter::Prefix("org.".into()));
        assert!(matches!(Filter::parse("a b"), Filter::Or(ref fs) if fs.len() == 2));
    }

    #[test]
    fn test_exact_matches_group_artifact_or_key() {
        let filter = Filter::parse("commons-logging");
        assert!(filter.matches_coordinate(&coord("commons-logging", "commons-logging", "1.1")));
        assert!(filter.matches_coordinate(&coord("org.other", "commons-logging", "1.1")));
        assert!(!filter.matches_coordinate(&coord("org.other", "logging", "1.1")));
    }

    #[test]
    fn test_prefix_matches() {
        let filter = Filter::parse("org.apache.*");
        assert!(filter.matches_coordinate(&coord("org.apache.camel", "camel-core", "2.9")));
        assert!(!filter.matches_coordinate(&coord("org.slf4j", "slf4j-api", "1.6")));
    }

    #[test]
    fn test_coordinate_pattern() {
        let filter = Filter::parse("org.slf4j:slf4j-*");
        assert!(filter.matches_coordinate(&coord("org.slf4j", "slf4j-api", "1.6")));
        assert!(!filter.matches_coordinate(&coord("org.slf4j", "jcl-over-slf4j", "1.6")));
        assert!(!filter.matches_coordinate(&coord("org.other", "slf4j-api", "1.6")));

        let versioned = Filter::parse("org.acme:core:1.*");
        assert!(versioned.matches_coordinate(&coord("org.acme", "core", "1.4")));
        assert!(!versioned.matches_coordinate(&coord("org.acme", "core", "2.0")));

        let any_artifact = Filter::parse("org.acme:*");
        assert!(any_artifact.matches_coordinate(&coord("org.acme", "whatever", "9")));
    }

    #[test]
    fn test_or_filter() {
        let filter = Filter::parse("org.slf4j commons-*");
        assert!(filter.matches_coordinate(&coord("org.slf4j", "slf4j-api", "1.6")));
        assert!(filter.matches_coordinate(&coord("commons-io", "commons-io", "2.0")));
        assert!(!filter.matches_coordinate(&coord("log4j", "log4j", "1.2")));
    }

    #[test]
    fn test_excludes_unselected_optional() {
        let filters = ClassificationFilters {
            optional: Filter::parse("org.acme:wanted"),
            ..Default::default()
        };
        assert!(filters.excludes_unselected_optional(&coord("org.acme", "other", "1"), true));
        assert!(!filters.excludes_unselected_optional(&coord("org.acme", "wanted", "1"), true));
        assert!(!filters.excludes_unselected_optional(&coord("org.acme", "other", "1"), false));
    }
}
