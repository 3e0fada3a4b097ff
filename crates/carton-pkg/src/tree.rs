//! Resolved dependency trees.
//!
//! A [`DependencyTree`] is an arena of [`DependencyNode`]s addressed by
//! [`NodeId`]. Children are ordered and owned by the arena; nothing in the
//! classification needs back-edges beyond the parent link kept for
//! diagnostics.

use crate::clause::{self, PackageMap};
use crate::coordinate::Coordinate;
use crate::jar;
use crate::version::{clean_version, ModuleVersion};
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Manifest entry naming a module's symbolic name.
pub const SYMBOLIC_NAME: &str = "Bundle-SymbolicName";

/// Manifest entry marking a fragment and naming its host.
pub const FRAGMENT_HOST: &str = "Fragment-Host";

/// Manifest entry listing exported packages.
pub const EXPORT_PACKAGE: &str = "Export-Package";

/// Manifest entry listing imported packages.
pub const IMPORT_PACKAGE: &str = "Import-Package";

/// Index of a node inside its tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a node's package set comes from.
#[derive(Debug, Clone)]
enum PackageOrigin {
    /// Packages known up front.
    Listed(BTreeSet<String>),
    /// Packages read lazily from a jar on first use.
    Jar(PathBuf),
    /// Nothing known; the manifest's `Export-Package` names are used.
    Manifest,
}

/// One resolved artifact in a dependency tree.
#[derive(Debug)]
pub struct DependencyNode {
    coordinate: Coordinate,
    module: bool,
    optional: bool,
    manifest: BTreeMap<String, String>,
    origin: PackageOrigin,
    packages: OnceCell<Result<BTreeSet<String>, Arc<io::Error>>>,
    exports: OnceCell<PackageMap>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl DependencyNode {
    /// A plain, non-optional, non-module node.
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            module: false,
            optional: false,
            manifest: BTreeMap::new(),
            origin: PackageOrigin::Manifest,
            packages: OnceCell::new(),
            exports: OnceCell::new(),
            children: Vec::new(),
            parent: None,
        }
    }

    /// Mark whether the artifact is already a deployable module.
    #[must_use]
    pub fn module(mut self, module: bool) -> Self {
        self.module = module;
        self
    }

    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    #[must_use]
    pub fn with_manifest_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.manifest.insert(key.into(), value.into());
        self.exports = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_manifest(mut self, manifest: BTreeMap<String, String>) -> Self {
        self.manifest.extend(manifest);
        self.exports = OnceCell::new();
        self
    }

    #[must_use]
    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.origin = PackageOrigin::Listed(packages.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_jar(mut self, path: impl Into<PathBuf>) -> Self {
        self.origin = PackageOrigin::Jar(path.into());
        self
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn is_module(&self) -> bool {
        self.module
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Fragments attach to a host module instead of exporting on their own.
    pub fn is_fragment(&self) -> bool {
        self.manifest.contains_key(FRAGMENT_HOST)
    }

    pub fn manifest(&self) -> &BTreeMap<String, String> {
        &self.manifest
    }

    pub fn manifest_entry(&self, key: &str) -> Option<&str> {
        self.manifest.get(key).map(String::as_str)
    }

    /// Declared symbolic name, or `group.artifact`.
    pub fn symbolic_name(&self) -> String {
        self.manifest_entry(SYMBOLIC_NAME)
            .map(clause::strip_attributes)
            .filter(|name| !name.is_empty())
            .map_or_else(|| self.coordinate.symbolic_name(), str::to_string)
    }

    /// Cleaned artifact version.
    pub fn version(&self) -> String {
        clean_version(&self.coordinate.version)
    }

    /// Clauses of the `Export-Package` manifest entry, parsed once.
    pub fn export_clauses(&self) -> &PackageMap {
        self.exports.get_or_init(|| {
            self.manifest_entry(EXPORT_PACKAGE)
                .map(clause::parse_clauses)
                .unwrap_or_default()
        })
    }

    /// Version this node exports `package` at: the package-level `version`
    /// attribute when declared, the artifact version otherwise.
    pub fn package_version(&self, package: &str) -> ModuleVersion {
        self.export_clauses()
            .get(package)
            .and_then(|attributes| attributes.get(clause::VERSION))
            .map_or_else(
                || ModuleVersion::parse(&self.coordinate.version),
                |version| ModuleVersion::parse(version),
            )
    }

    /// Packages contained in this artifact, computed once and cached.
    pub fn packages(&self) -> io::Result<&BTreeSet<String>> {
        let cached = self.packages.get_or_init(|| {
            self.load_packages().map_err(|e| {
                warn!(
                    "Failed to read packages of {}: {}",
                    self.coordinate, e
                );
                Arc::new(e)
            })
        });
        cached
            .as_ref()
            .map_err(|e| io::Error::new(e.kind(), e.to_string()))
    }

    fn load_packages(&self) -> io::Result<BTreeSet<String>> {
        match &self.origin {
            PackageOrigin::Listed(packages) => Ok(packages.clone()),
            PackageOrigin::Jar(path) => {
                debug!("Reading packages of {} from {}", self.coordinate, path.display());
                jar::read_jar_packages(path)
            }
            PackageOrigin::Manifest => Ok(self.export_clauses().keys().cloned().collect()),
        }
    }
}

/// A resolved dependency tree rooted at the module being described.
#[derive(Debug)]
pub struct DependencyTree {
    nodes: Vec<DependencyNode>,
    /// Per node: the node or something below it is optional.
    optional_below: OnceCell<Vec<bool>>,
}

impl DependencyTree {
    /// Start a tree from its root node.
    pub fn new(root: DependencyNode) -> Self {
        Self {
            nodes: vec![root],
            optional_below: OnceCell::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append `node` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn add_child(&mut self, parent: NodeId, mut node: DependencyNode) -> NodeId {
        assert!(parent.0 < self.nodes.len(), "unknown parent node {parent}");
        let id = NodeId(self.nodes.len());
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        self.optional_below = OnceCell::new();
        id
    }

    pub fn node(&self, id: NodeId) -> &DependencyNode {
        &self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over every node id in arena order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Depth-first pre-order of the subtree at `start`, `start` included.
    pub fn pre_order(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Strict descendants of `id` in pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = self.pre_order(id);
        order.remove(0);
        order
    }

    /// True if `id` or any node below it is marked optional.
    pub fn is_this_or_descendant_optional(&self, id: NodeId) -> bool {
        let below = self.optional_below.get_or_init(|| {
            let mut below: Vec<bool> = self.nodes.iter().map(DependencyNode::is_optional).collect();
            // Reversed pre-order visits every child before its parent.
            for node in self.pre_order(self.root()).into_iter().rev() {
                if let Some(parent) = self.parent(node) {
                    below[parent.0] |= below[node.0];
                }
            }
            below
        });
        below[id.0]
    }

    /// Packages of `id`, or an empty set when they cannot be read.
    pub fn packages_or_empty(&self, id: NodeId) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        match self.node(id).packages() {
            Ok(packages) => packages,
            Err(e) => {
                debug!(
                    "Treating {} as exporting no packages: {}",
                    self.node(id).coordinate(),
                    e
                );
                &EMPTY
            }
        }
    }

    /// Reorder the children of `id`; used to check order independence.
    pub fn reverse_children(&mut self, id: NodeId) {
        self.nodes[id.0].children.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(artifact: &str) -> DependencyNode {
        DependencyNode::new(Coordinate::new("org.acme", artifact, "1.0"))
    }

    fn sample() -> (DependencyTree, [NodeId; 4]) {
        let mut tree = DependencyTree::new(node("root"));
        let root = tree.root();
        let a = tree.add_child(root, node("a"));
        let b = tree.add_child(a, node("b").optional(true));
        let c = tree.add_child(root, node("c"));
        (tree, [root, a, b, c])
    }

    #[test]
    fn test_pre_order() {
        let (tree, [root, a, b, c]) = sample();
        assert_eq!(tree.pre_order(root), vec![root, a, b, c]);
        assert_eq!(tree.descendants(root), vec![a, b, c]);
        assert_eq!(tree.parent(b), Some(a));
        assert_eq!(tree.parent(root), None);
    }

    #[test]
    fn test_this_or_descendant_optional() {
        let (tree, [root, a, b, c]) = sample();
        assert!(tree.is_this_or_descendant_optional(root));
        assert!(tree.is_this_or_descendant_optional(a));
        assert!(tree.is_this_or_descendant_optional(b));
        assert!(!tree.is_this_or_descendant_optional(c));
    }

    #[test]
    fn test_optional_flags_follow_new_children() {
        let (mut tree, [root, _, _, c]) = sample();
        assert!(!tree.is_this_or_descendant_optional(c));
        let d = tree.add_child(c, node("d"));
        let e = tree.add_child(d, node("e").optional(true));
        assert!(tree.is_this_or_descendant_optional(c));
        assert!(tree.is_this_or_descendant_optional(d));
        assert!(tree.is_this_or_descendant_optional(e));
        assert!(tree.is_this_or_descendant_optional(root));
    }

    #[test]
    fn test_export_clauses_track_manifest_changes() {
        let n = node("api").with_manifest_entry(EXPORT_PACKAGE, "org.acme.api");
        assert_eq!(n.export_clauses().len(), 1);
        let n = n.with_manifest_entry(EXPORT_PACKAGE, "org.acme.api,org.acme.spi");
        assert_eq!(n.export_clauses().len(), 2);
    }

    #[test]
    fn test_fragment_and_symbolic_name() {
        let fragment = node("frag")
            .with_manifest_entry(FRAGMENT_HOST, "org.acme.host")
            .with_manifest_entry(SYMBOLIC_NAME, "org.acme.frag;singleton:=true");
        assert!(fragment.is_fragment());
        assert_eq!(fragment.symbolic_name(), "org.acme.frag");
        assert_eq!(node("plain").symbolic_name(), "org.acme.plain");
    }

    #[test]
    fn test_package_version_prefers_export_attribute() {
        let n = node("api")
            .with_manifest_entry(EXPORT_PACKAGE, "org.acme.api;version=\"2.1\",org.acme.spi");
        assert_eq!(n.package_version("org.acme.api"), ModuleVersion::new(2, 1, 0));
        assert_eq!(n.package_version("org.acme.spi"), ModuleVersion::new(1, 0, 0));
    }

    #[test]
    fn test_packages_from_manifest_origin() {
        let n = node("api").with_manifest_entry(EXPORT_PACKAGE, "org.acme.api,org.acme.spi");
        let packages = n.packages().unwrap();
        assert!(packages.contains("org.acme.api"));
        assert!(packages.contains("org.acme.spi"));
    }

    #[test]
    fn test_unreadable_jar_yields_empty_packages() {
        let mut tree = DependencyTree::new(node("root"));
        let broken = tree.add_child(tree.root(), node("broken").with_jar("/nonexistent/x.jar"));
        assert!(tree.node(broken).packages().is_err());
        // Cached failure is reported consistently.
        assert!(tree.node(broken).packages().is_err());
        assert!(tree.packages_or_empty(broken).is_empty());
    }
}
