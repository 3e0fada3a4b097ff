//! Package ownership across a dependency tree.
//!
//! Several artifacts in one tree may contain the same package (repackaged
//! copies, split api/impl jars, different versions of one library). Each
//! package gets exactly one owning node: the one exporting it at the highest
//! version, with ties going to the node visited last in pre-order. Every
//! other node has that package hidden.

use crate::tree::{DependencyTree, NodeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Owner and hidden-package tables for one tree.
#[derive(Debug, Default, Clone)]
pub struct PackageOwnership {
    owners: BTreeMap<String, NodeId>,
    /// Hidden packages keyed by coordinate identity, so repeated occurrences
    /// of one artifact in the tree share their fate.
    hidden: HashMap<String, BTreeSet<String>>,
}

impl PackageOwnership {
    /// Walk the whole tree in pre-order and assign every package an owner.
    ///
    /// Runs before any exclusion is applied, since exclusion depends on the
    /// hidden packages computed here.
    pub fn compute(tree: &DependencyTree) -> Self {
        let mut ownership = Self::default();
        for id in tree.pre_order(tree.root()) {
            ownership.register(tree, id);
        }
        ownership
    }

    fn register(&mut self, tree: &DependencyTree, id: NodeId) {
        let node = tree.node(id);
        let identity = node.coordinate().identity();

        for package in tree.packages_or_empty(id) {
            let Some(&owner) = self.owners.get(package) else {
                self.owners.insert(package.clone(), id);
                continue;
            };

            let owner_node = tree.node(owner);
            if owner_node.coordinate().identity() == identity {
                continue;
            }

            let candidate_version = node.package_version(package);
            let owner_version = owner_node.package_version(package);
            if candidate_version >= owner_version {
                debug!(
                    "Package {} moves from {} ({}) to {} ({})",
                    package,
                    owner_node.coordinate(),
                    owner_version,
                    node.coordinate(),
                    candidate_version
                );
                self.hide(owner_node.coordinate().identity(), package);
                self.unhide(&identity, package);
                self.owners.insert(package.clone(), id);
            } else {
                debug!(
                    "Package {} of {} ({}) hidden by {} ({})",
                    package,
                    node.coordinate(),
                    candidate_version,
                    owner_node.coordinate(),
                    owner_version
                );
                self.hide(identity.clone(), package);
            }
        }
    }

    fn hide(&mut self, identity: String, package: &str) {
        self.hidden
            .entry(identity)
            .or_default()
            .insert(package.to_string());
    }

    /// A repeated artifact taking a package back clears its earlier loss.
    fn unhide(&mut self, identity: &str, package: &str) {
        if let Some(hidden) = self.hidden.get_mut(identity) {
            hidden.remove(package);
        }
    }

    /// Current owner of a package.
    pub fn owner(&self, package: &str) -> Option<NodeId> {
        self.owners.get(package).copied()
    }

    /// True if `package` of node `id` lost to another exporter.
    pub fn is_hidden(&self, tree: &DependencyTree, id: NodeId, package: &str) -> bool {
        self.hidden
            .get(&tree.node(id).coordinate().identity())
            .is_some_and(|hidden| hidden.contains(package))
    }

    /// True if the node exports at least one package and every one of them is
    /// owned elsewhere. Fragments are never reported, since they attach to a
    /// host rather than exporting on their own.
    pub fn all_packages_hidden(&self, tree: &DependencyTree, id: NodeId) -> bool {
        let node = tree.node(id);
        if node.is_fragment() {
            return false;
        }
        let packages = tree.packages_or_empty(id);
        if packages.is_empty() {
            return false;
        }
        let Some(hidden) = self.hidden.get(&node.coordinate().identity()) else {
            return false;
        };
        packages.iter().all(|p| hidden.contains(p))
    }
}
