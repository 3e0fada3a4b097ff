//! Manifest header assembly.
//!
//! Turns the package maps gathered during classification into the final
//! `Import-Package`, `Export-Package`, `Bundle-ClassPath` and
//! `Require-Bundle` values.

use crate::classify::Classification;
use crate::clause::{self, HeaderEncoder, PackageMap, OPTIONAL, RESOLUTION, VERSION};
use crate::filter::Filter;
use crate::registry::ModuleRegistry;
use crate::tree::{DependencyTree, NodeId};
use crate::version::version_range;
use std::collections::BTreeSet;
use tracing::debug;

/// Attribute keys written into package headers; everything else is dropped.
pub const EMITTED_ATTRIBUTES: &[&str] = &[
    VERSION,
    RESOLUTION,
    "-split-package:",
    "-remove-attribute:",
];

/// Answers version and optionality questions about packages.
pub trait VersionResolver {
    /// Version of a package provided by a shared dependency.
    fn resolve_package_version(&self, package: &str) -> Option<String>;

    /// Version of a package exported by the module itself, falling back to
    /// shared dependencies.
    fn resolve_export_package_version(&self, package: &str) -> Option<String>;

    /// False when a non-optional dependency provides the package.
    fn is_package_optional(&self, package: &str) -> bool;
}

/// [`VersionResolver`] over a classified tree.
pub struct ClassificationResolver<'a> {
    tree: &'a DependencyTree,
    classification: &'a Classification,
}

impl<'a> ClassificationResolver<'a> {
    pub fn new(tree: &'a DependencyTree, classification: &'a Classification) -> Self {
        Self {
            tree,
            classification,
        }
    }

    fn provides(&self, id: NodeId, package: &str) -> bool {
        self.tree.packages_or_empty(id).contains(package)
            && !self.classification.ownership.is_hidden(self.tree, id, package)
    }

    fn shared_provider(&self, package: &str) -> Option<NodeId> {
        self.classification
            .shared
            .iter()
            .copied()
            .find(|&id| self.provides(id, package))
    }
}

impl VersionResolver for ClassificationResolver<'_> {
    fn resolve_package_version(&self, package: &str) -> Option<String> {
        self.shared_provider(package)
            .map(|id| self.tree.node(id).package_version(package).to_string())
    }

    fn resolve_export_package_version(&self, package: &str) -> Option<String> {
        let root = self.tree.root();
        let root_node = self.tree.node(root);
        if self.tree.packages_or_empty(root).contains(package)
            || root_node.export_clauses().contains_key(package)
        {
            return Some(root_node.package_version(package).to_string());
        }
        self.resolve_package_version(package)
    }

    fn is_package_optional(&self, package: &str) -> bool {
        !self
            .classification
            .shared
            .iter()
            .any(|&id| !self.tree.node(id).is_optional() && self.provides(id, package))
    }
}

/// Assembled `Import-Package` value and the packages it requires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportHeader {
    pub header: String,
    /// Imports that must resolve, i.e. every import not left optional.
    pub required: BTreeSet<String>,
}

/// Inputs to [`assemble_imports`] besides the resolver and encoder.
#[derive(Debug, Clone, Default)]
pub struct ImportSources<'a> {
    /// Imports gathered from shared dependency exports.
    pub computed: PackageMap,
    /// The module's own `Import-Package` value.
    pub declared: &'a str,
    /// Exports of runtime modules that stood in for shared dependencies.
    pub extra: PackageMap,
    /// Whitespace-separated exclude patterns.
    pub exclude: &'a str,
    pub range_digits: u8,
}

/// Build the `Import-Package` header.
///
/// Declared clauses win over computed ones. Imports without a version get
/// a range synthesized from the providing dependency, extra imports fill
/// in whatever is still missing, exclude patterns are applied, and
/// optional markers are dropped for packages a required dependency
/// provides.
pub fn assemble_imports(
    sources: &ImportSources<'_>,
    resolver: &dyn VersionResolver,
    encoder: &dyn HeaderEncoder,
) -> ImportHeader {
    let mut imports = clause::parse_clauses(sources.declared);
    for (package, attributes) in &sources.computed {
        imports
            .entry(package.clone())
            .or_insert_with(|| attributes.clone());
    }

    for (package, attributes) in &mut imports {
        if attributes.contains_key(VERSION) {
            continue;
        }
        if let Some(version) = resolver.resolve_package_version(package) {
            attributes.insert(
                VERSION.to_string(),
                version_range(&version, sources.range_digits),
            );
        } else {
            debug!("No version found for imported package {}", package);
        }
    }

    merge_extra_imports(&mut imports, &sources.extra, sources.range_digits);
    exclude_imports(&mut imports, sources.exclude);

    let mut required = BTreeSet::new();
    for (package, attributes) in &mut imports {
        let optional = attributes.get(RESOLUTION).is_some_and(|r| r == OPTIONAL);
        if optional {
            if !resolver.is_package_optional(package) {
                debug!("Import of {} is provided by a required dependency", package);
                attributes.remove(RESOLUTION);
                required.insert(package.clone());
            }
        } else {
            required.insert(package.clone());
        }
    }

    ImportHeader {
        header: encoder.encode(&imports, EMITTED_ATTRIBUTES),
        required,
    }
}

/// Fill `imports` from `extra` without replacing anything already set.
pub fn merge_extra_imports(imports: &mut PackageMap, extra: &PackageMap, range_digits: u8) {
    for (package, extra_attributes) in extra {
        let attributes = imports.entry(package.clone()).or_default();
        for (key, value) in extra_attributes {
            attributes.entry(key.clone()).or_insert_with(|| {
                if key == VERSION {
                    version_range(value, range_digits)
                } else {
                    value.clone()
                }
            });
        }
    }
}

/// Remove imports matching whitespace-separated patterns. `prefix*` removes
/// a prefix, a pattern of only `*` removes everything.
pub fn exclude_imports(imports: &mut PackageMap, patterns: &str) {
    for pattern in patterns.split_whitespace() {
        if pattern.chars().all(|c| c == '*') {
            imports.clear();
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            imports.retain(|package, _| !package.starts_with(prefix));
        } else {
            imports.remove(pattern);
        }
    }
}

/// Exports of the runtime modules standing in for provided dependencies,
/// with the module version where a clause has none.
pub fn provided_exports(
    tree: &DependencyTree,
    classification: &Classification,
    registry: &dyn ModuleRegistry,
) -> PackageMap {
    let mut exports = PackageMap::new();
    for &id in &classification.provided {
        let Some(module) = registry.installed(tree.node(id).coordinate()) else {
            continue;
        };
        for (package, mut attributes) in module.export_clauses() {
            attributes
                .entry(VERSION.to_string())
                .or_insert_with(|| module.version.clone());
            exports.entry(package).or_insert(attributes);
        }
    }
    exports
}

/// Build the `Export-Package` header from the declared exports, filling in
/// missing versions.
pub fn assemble_exports(
    declared: &PackageMap,
    resolver: &dyn VersionResolver,
    encoder: &dyn HeaderEncoder,
) -> String {
    let mut exports = declared.clone();
    for (package, attributes) in &mut exports {
        if attributes.contains_key(VERSION) {
            continue;
        }
        if let Some(version) = resolver.resolve_export_package_version(package) {
            attributes.insert(VERSION.to_string(), version);
        }
    }
    encoder.encode(&exports, EMITTED_ATTRIBUTES)
}

/// `Bundle-ClassPath`: the module root followed by every embedded jar.
pub fn class_path(tree: &DependencyTree, embedded: &[NodeId]) -> String {
    std::iter::once(".".to_string())
        .chain(
            embedded
                .iter()
                .map(|&id| format!("lib/{}", tree.node(id).coordinate().file_name())),
        )
        .collect::<Vec<_>>()
        .join(",")
}

/// `Require-Bundle`: shared dependencies that must be wired as modules.
pub fn require_bundle(
    tree: &DependencyTree,
    shared: &[NodeId],
    require_as_module: &Filter,
    range_digits: u8,
) -> String {
    shared
        .iter()
        .map(|&id| tree.node(id))
        .filter(|node| require_as_module.matches(node))
        .map(|node| {
            format!(
                "{};bundle-version=\"{}\"",
                node.symbolic_name(),
                version_range(&node.version(), range_digits)
            )
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyOptions};
    use crate::clause::ClauseEncoder;
    use crate::coordinate::Coordinate;
    use crate::filter::ClassificationFilters;
    use crate::registry::{InstalledModule, MemoryRegistry};
    use crate::tree::{DependencyNode, EXPORT_PACKAGE, SYMBOLIC_NAME};
    use std::collections::HashMap;

    #[derive(Default)]
    struct StubResolver {
        versions: HashMap<&'static str, &'static str>,
        required: BTreeSet<&'static str>,
    }

    impl VersionResolver for StubResolver {
        fn resolve_package_version(&self, package: &str) -> Option<String> {
            self.versions.get(package).map(ToString::to_string)
        }

        fn resolve_export_package_version(&self, package: &str) -> Option<String> {
            self.resolve_package_version(package)
        }

        fn is_package_optional(&self, package: &str) -> bool {
            !self.required.contains(package)
        }
    }

    fn assemble(sources: &ImportSources<'_>, resolver: &StubResolver) -> ImportHeader {
        assemble_imports(sources, resolver, &ClauseEncoder)
    }

    #[test]
    fn test_missing_versions_are_synthesized() {
        let resolver = StubResolver {
            versions: HashMap::from([("org.slf4j", "1.6.1")]),
            ..Default::default()
        };
        let sources = ImportSources {
            computed: clause::parse_clauses("org.slf4j,org.unknown"),
            declared: "org.pinned;version=\"[2,3)\"",
            range_digits: 2,
            ..Default::default()
        };

        let result = assemble(&sources, &resolver);
        assert_eq!(
            result.header,
            "org.pinned;version=\"[2,3)\",org.slf4j;version=\"[1.6.1,1.7)\",org.unknown"
        );
        assert_eq!(result.required.len(), 3);
    }

    #[test]
    fn test_declared_imports_win() {
        let sources = ImportSources {
            computed: clause::parse_clauses("org.acme;version=\"1.0\""),
            declared: "org.acme;version=\"[5,6)\"",
            ..Default::default()
        };
        let result = assemble(&sources, &StubResolver::default());
        assert_eq!(result.header, "org.acme;version=\"[5,6)\"");
    }

    #[test]
    fn test_extra_imports_fill_gaps_only() {
        let sources = ImportSources {
            computed: clause::parse_clauses("org.acme;resolution:=optional"),
            extra: clause::parse_clauses(
                "org.acme;version=\"1.0\";resolution:=mandatory,org.extra;version=\"2.1\"",
            ),
            range_digits: 3,
            ..Default::default()
        };
        let result = assemble(&sources, &StubResolver::default());
        assert_eq!(
            result.header,
            "org.acme;resolution:=optional;version=\"[1.0,2)\",org.extra;version=\"[2.1,3)\""
        );
        assert_eq!(result.required.into_iter().collect::<Vec<_>>(), vec!["org.extra"]);
    }

    #[test]
    fn test_exclude_patterns() {
        let mut imports = clause::parse_clauses("org.acme.a,org.acme.b,org.other,javax.x");
        exclude_imports(&mut imports, "org.acme.* javax.x");
        assert_eq!(imports.keys().collect::<Vec<_>>(), vec!["org.other"]);

        exclude_imports(&mut imports, "**");
        assert!(imports.is_empty());
    }

    #[test]
    fn test_optional_marker_dropped_when_required() {
        let resolver = StubResolver {
            required: BTreeSet::from(["org.needed"]),
            ..Default::default()
        };
        let sources = ImportSources {
            declared: "org.needed;resolution:=optional,org.maybe;resolution:=optional",
            ..Default::default()
        };
        let result = assemble(&sources, &resolver);
        assert_eq!(
            result.header,
            "org.maybe;resolution:=optional,org.needed"
        );
        assert_eq!(result.required.into_iter().collect::<Vec<_>>(), vec!["org.needed"]);
    }

    #[test]
    fn test_unlisted_attributes_are_not_emitted() {
        let sources = ImportSources {
            declared: "org.acme;version=\"1\";uses:=\"org.x\";vendor=acme;-split-package:=merge-first",
            ..Default::default()
        };
        let result = assemble(&sources, &StubResolver::default());
        assert_eq!(
            result.header,
            "org.acme;-split-package:=merge-first;version=\"1\""
        );
    }

    #[test]
    fn test_assemble_exports() {
        let resolver = StubResolver {
            versions: HashMap::from([("org.acme.api", "1.2.0")]),
            ..Default::default()
        };
        let declared = clause::parse_clauses("org.acme.api,org.acme.spi;version=\"0.9\"");
        assert_eq!(
            assemble_exports(&declared, &resolver, &ClauseEncoder),
            "org.acme.api;version=\"1.2.0\",org.acme.spi;version=\"0.9\""
        );
    }

    fn classified() -> (DependencyTree, Classification, MemoryRegistry) {
        let mut tree = DependencyTree::new(
            DependencyNode::new(Coordinate::new("org.acme", "app", "1.0"))
                .with_packages(["org.acme.app"])
                .with_manifest_entry(EXPORT_PACKAGE, "org.acme.app;version=\"1.0.1\""),
        );
        let r = tree.root();
        tree.add_child(
            r,
            DependencyNode::new(Coordinate::new("org.shared", "lib", "2.3"))
                .with_packages(["org.shared.lib"])
                .with_manifest_entry(SYMBOLIC_NAME, "org.shared.lib.module"),
        );
        tree.add_child(
            r,
            DependencyNode::new(Coordinate::new("org.shared", "opt", "1.0"))
                .with_packages(["org.shared.opt"])
                .optional(true),
        );
        tree.add_child(
            r,
            DependencyNode::new(Coordinate::new("org.slf4j", "slf4j-api", "1.6.1")),
        );
        tree.add_child(
            r,
            DependencyNode::new(Coordinate::new("org.embed", "util", "3.0").with_classifier("jdk8")),
        );

        let registry = MemoryRegistry::new().with_module(
            InstalledModule::new("org.slf4j.api", "1.6.1")
                .providing(Coordinate::new("org.slf4j", "slf4j-api", "1.6.1"))
                .with_exports("org.slf4j,org.slf4j.spi;version=\"1.6.0\""),
        );
        let filters = ClassificationFilters {
            shared: Filter::parse("org.shared org.slf4j"),
            require_as_module: Filter::parse("org.shared:lib"),
            ..Default::default()
        };
        let classification = classify(&tree, &filters, &ClassifyOptions::default(), &registry);
        (tree, classification, registry)
    }

    #[test]
    fn test_classification_resolver() {
        let (tree, classification, _) = classified();
        let resolver = ClassificationResolver::new(&tree, &classification);

        assert_eq!(
            resolver.resolve_package_version("org.shared.lib").as_deref(),
            Some("2.3.0")
        );
        assert_eq!(resolver.resolve_package_version("org.nowhere"), None);
        assert_eq!(
            resolver.resolve_export_package_version("org.acme.app").as_deref(),
            Some("1.0.1")
        );
        assert!(!resolver.is_package_optional("org.shared.lib"));
        assert!(resolver.is_package_optional("org.shared.opt"));
    }

    #[test]
    fn test_provided_exports() {
        let (tree, classification, registry) = classified();
        let exports = provided_exports(&tree, &classification, &registry);
        assert_eq!(exports["org.slf4j"][VERSION], "1.6.1");
        assert_eq!(exports["org.slf4j.spi"][VERSION], "1.6.0");
    }

    #[test]
    fn test_class_path_and_require_bundle() {
        let (tree, classification, _) = classified();
        assert_eq!(
            class_path(&tree, &classification.non_shared),
            ".,lib/util-3.0-jdk8.jar"
        );
        assert_eq!(class_path(&tree, &[]), ".");
        assert_eq!(
            require_bundle(&tree, &classification.shared, &Filter::parse("org.shared:lib"), 1),
            "org.shared.lib.module;bundle-version=\"[2.3.0,2.3.1)\""
        );
    }
}
