//! Dependency classification.
//!
//! [`classify`] walks the children of the root and sorts every node into one
//! of four buckets:
//!
//! - **excluded**: matched by the exclude filter, or every package it exports
//!   is owned by another node. Dropped along with its subtree.
//! - **optional**: an optional dependency opted in by the optional filter.
//!   Its subtree is collected as optional too.
//! - **shared**: provided by the runtime (shared or require-as-module filter).
//!   Its subtree stays shared, and its module nodes are queued for install.
//! - **non-shared**: everything else, embedded into the module.
//!
//! The root is the module being described and is never classified.

use crate::clause::PackageMap;
use crate::filter::ClassificationFilters;
use crate::ownership::PackageOwnership;
use crate::registry::ModuleRegistry;
use crate::tree::{DependencyTree, NodeId};
use std::collections::HashSet;
use tracing::debug;

/// Switches that change how shared dependencies are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Import the exports of every shared dependency.
    pub include_shared_resources: bool,
    /// Classify shared dependencies as shared even when the runtime already
    /// provides them.
    pub install_provided_modules: bool,
}

/// Result of one classification pass.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub shared: Vec<NodeId>,
    pub non_shared: Vec<NodeId>,
    /// Module nodes to install, dependencies before dependents.
    pub install: Vec<NodeId>,
    pub optional: Vec<NodeId>,
    /// Shared dependencies skipped because the runtime provides them.
    pub provided: Vec<NodeId>,
    /// Imports gathered from shared dependency exports, without versions.
    pub imports: PackageMap,
    pub ownership: PackageOwnership,
}

/// Classify the dependencies of the root of `tree`.
pub fn classify(
    tree: &DependencyTree,
    filters: &ClassificationFilters,
    options: &ClassifyOptions,
    registry: &dyn ModuleRegistry,
) -> Classification {
    let ownership = PackageOwnership::compute(tree);
    let mut classifier = Classifier {
        tree,
        filters,
        options,
        registry,
        result: Classification::default(),
        ownership,
    };
    classifier.run();
    classifier.finish()
}

/// Keep the first node of every coordinate identity, preserving order.
pub fn dedup(tree: &DependencyTree, ids: Vec<NodeId>) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|&id| seen.insert(tree.node(id).coordinate().identity()))
        .collect()
}

struct Classifier<'a> {
    tree: &'a DependencyTree,
    filters: &'a ClassificationFilters,
    options: &'a ClassifyOptions,
    registry: &'a dyn ModuleRegistry,
    ownership: PackageOwnership,
    result: Classification,
}

impl Classifier<'_> {
    fn run(&mut self) {
        let tree = self.tree;
        let mut stack: Vec<NodeId> = tree.children(tree.root()).iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let coordinate = tree.node(id).coordinate();
            if self.is_excluded(id) {
                debug!("Excluding {}", coordinate);
            } else if self.filters.is_optional_included(tree, id) {
                debug!("Including optional {}", coordinate);
                self.collect_optional(id);
            } else if self.filters.is_shared_or_required(tree.node(id)) {
                self.add_shared(id);
            } else {
                debug!("Embedding {}", coordinate);
                self.result.non_shared.push(id);
                stack.extend(tree.children(id).iter().rev());
            }
        }
    }

    fn finish(mut self) -> Classification {
        let tree = self.tree;
        let result = &mut self.result;
        result.shared = dedup(tree, std::mem::take(&mut result.shared));
        result.non_shared = dedup(tree, std::mem::take(&mut result.non_shared));
        result.install = dedup(tree, std::mem::take(&mut result.install));
        result.optional = dedup(tree, std::mem::take(&mut result.optional));
        result.provided = dedup(tree, std::mem::take(&mut result.provided));
        self.result.ownership = self.ownership;
        self.result
    }

    fn is_excluded(&self, id: NodeId) -> bool {
        self.filters.is_excluded(self.tree, id, &self.ownership)
    }

    fn is_provided(&self, id: NodeId) -> bool {
        !self.options.install_provided_modules
            && self.registry.installed(self.tree.node(id).coordinate()).is_some()
    }

    /// Append `start` and its non-excluded descendants to the optional list.
    fn collect_optional(&mut self, start: NodeId) {
        let tree = self.tree;
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if id != start && self.is_excluded(id) {
                debug!("Excluding optional {}", tree.node(id).coordinate());
                continue;
            }
            self.result.optional.push(id);
            stack.extend(tree.children(id).iter().rev());
        }
    }

    fn add_shared(&mut self, start: NodeId) {
        let tree = self.tree;
        let mut stack = vec![start];

        while let Some(id) = stack.pop() {
            let node = tree.node(id);
            if self.is_provided(id) {
                debug!("{} is already provided by the runtime", node.coordinate());
                self.result.provided.push(id);
                continue;
            }

            debug!("Sharing {}", node.coordinate());
            self.result.shared.push(id);
            if self.options.include_shared_resources || self.filters.import_exports.matches(node) {
                self.import_exports(id);
            }

            for &child in tree.children(id).iter().rev() {
                if self.is_excluded(child) {
                    debug!("Excluding {}", tree.node(child).coordinate());
                } else if self.filters.is_optional_included(tree, child) {
                    self.collect_optional(child);
                } else {
                    stack.push(child);
                }
            }
        }

        self.collect_install(start);
    }

    /// Queue the packages `id` owns as unversioned imports.
    fn import_exports(&mut self, id: NodeId) {
        for package in self.tree.packages_or_empty(id) {
            if self.ownership.is_hidden(self.tree, id, package) {
                continue;
            }
            self.result.imports.entry(package.clone()).or_default();
        }
    }

    /// Post-order walk appending module nodes to the install list.
    fn collect_install(&mut self, start: NodeId) {
        if self.is_provided(start) {
            return;
        }
        let tree = self.tree;
        let mut stack = vec![(start, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                if tree.node(id).is_module() {
                    self.result.install.push(id);
                }
                continue;
            }
            stack.push((id, true));
            for &child in tree.children(id).iter().rev() {
                if !self.skips_install(child) {
                    stack.push((child, false));
                }
            }
        }
    }

    fn skips_install(&self, id: NodeId) -> bool {
        let tree = self.tree;
        self.is_excluded(id)
            || self.is_provided(id)
            || (tree.node(id).is_optional() && self.filters.is_optional_included(tree, id))
    }
}
