//! Module descriptor synthesis.
//!
//! [`DescriptorBuilder`] runs the whole pipeline for one root artifact:
//! collect its dependency tree, merge directives from the config file, the
//! root manifest and any extension modules, classify the tree, and assemble
//! the manifest headers of the resulting module.

use crate::classify::{classify, Classification};
use crate::clause::{self, ClauseEncoder, HeaderEncoder, PackageMap};
use crate::coordinate::Coordinate;
use crate::directives::{Directives, Feature};
use crate::headers::{
    assemble_exports, assemble_imports, class_path, provided_exports, require_bundle,
    ClassificationResolver, ImportSources,
};
use crate::registry::{lookup_unique, ModuleRegistry, RegistryError};
use crate::resolve::{DependencyResolver, ResolveError};
use crate::tree::{DependencyTree, NodeId, EXPORT_PACKAGE, IMPORT_PACKAGE, SYMBOLIC_NAME};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{debug, info};

pub const BUNDLE_VERSION: &str = "Bundle-Version";
pub const BUNDLE_CLASS_PATH: &str = "Bundle-ClassPath";
pub const REQUIRE_BUNDLE: &str = "Require-Bundle";

/// Errors that can occur while building a descriptor.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to collect dependencies: {0}")]
    Resolve(#[from] ResolveError),

    #[error("failed to look up extension module: {0}")]
    Registry(#[from] RegistryError),

    /// Neither a symbolic name nor a usable coordinate names the module.
    #[error("module '{0}' has no symbolic name")]
    MissingIdentity(String),
}

/// A synthesized module descriptor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModuleDescriptor {
    pub coordinate: Option<Coordinate>,
    /// Manifest headers of the module.
    pub headers: BTreeMap<String, String>,
    /// Imported packages that must resolve.
    pub required_packages: BTreeSet<String>,
    pub shared: Vec<Coordinate>,
    pub embedded: Vec<Coordinate>,
    pub install: Vec<Coordinate>,
    pub optional: Vec<Coordinate>,
    pub provided: Vec<Coordinate>,
    pub features: Vec<Feature>,
    pub feature_repositories: Vec<String>,
}

impl ModuleDescriptor {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// Render the headers as `META-INF/MANIFEST.MF` text.
    pub fn to_manifest(&self) -> String {
        clause::write_manifest(&self.headers)
    }
}

/// Builds descriptors from a resolver and a module registry.
pub struct DescriptorBuilder<'a> {
    resolver: &'a dyn DependencyResolver,
    registry: &'a dyn ModuleRegistry,
    encoder: &'a dyn HeaderEncoder,
    config: Directives,
    offline: bool,
}

impl<'a> DescriptorBuilder<'a> {
    pub fn new(resolver: &'a dyn DependencyResolver, registry: &'a dyn ModuleRegistry) -> Self {
        Self {
            resolver,
            registry,
            encoder: &ClauseEncoder,
            config: Directives::default(),
            offline: false,
        }
    }

    /// Directives applied before the root manifest's own.
    #[must_use]
    pub fn with_config(mut self, config: Directives) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_encoder(mut self, encoder: &'a dyn HeaderEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    #[must_use]
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Build the descriptor of `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dependency tree cannot be collected, an
    /// extension module is missing or ambiguous in the registry, or the
    /// module has no symbolic name.
    pub fn build(&self, root: &Coordinate) -> Result<ModuleDescriptor, DescriptorError> {
        let mut tree = self.collect(root, &self.config)?;
        let directives = self.merge_directives(&tree)?;
        if directives.include_optional_dependency != self.config.include_optional_dependency {
            debug!("Optional dependency selection changed, collecting {} again", root);
            tree = self.collect(root, &directives)?;
        }

        let filters = directives.filters();
        let classification = classify(&tree, &filters, &directives.options(), self.registry);
        info!(
            "Classified {}: {} shared, {} embedded, {} optional, {} to install",
            root,
            classification.shared.len(),
            classification.non_shared.len(),
            classification.optional.len(),
            classification.install.len()
        );

        let range_digits = directives.range_digits();
        let resolver = ClassificationResolver::new(&tree, &classification);
        let root_node = tree.node(tree.root());

        let symbolic_name = root_node.symbolic_name();
        if symbolic_name.is_empty() {
            return Err(DescriptorError::MissingIdentity(root.to_string()));
        }

        let imports = assemble_imports(
            &ImportSources {
                computed: classification.imports.clone(),
                declared: root_node.manifest_entry(IMPORT_PACKAGE).unwrap_or_default(),
                extra: provided_exports(&tree, &classification, self.registry),
                exclude: &directives.exclude_import_package,
                range_digits,
            },
            &resolver,
            self.encoder,
        );
        let exports = assemble_exports(
            &declared_exports(&tree, &classification),
            &resolver,
            self.encoder,
        );

        let mut headers = BTreeMap::new();
        headers.insert(SYMBOLIC_NAME.to_string(), symbolic_name);
        headers.insert(BUNDLE_VERSION.to_string(), root_node.version());
        headers.insert(
            BUNDLE_CLASS_PATH.to_string(),
            class_path(&tree, &classification.non_shared),
        );
        let required = require_bundle(
            &tree,
            &classification.shared,
            &filters.require_as_module,
            range_digits,
        );
        for (key, value) in [
            (IMPORT_PACKAGE, imports.header),
            (EXPORT_PACKAGE, exports),
            (REQUIRE_BUNDLE, required),
        ] {
            if !value.is_empty() {
                headers.insert(key.to_string(), value);
            }
        }

        let coordinates = |ids: &[NodeId]| -> Vec<Coordinate> {
            ids.iter()
                .map(|&id| tree.node(id).coordinate().clone())
                .collect()
        };

        Ok(ModuleDescriptor {
            coordinate: Some(root_node.coordinate().clone()),
            headers,
            required_packages: imports.required,
            shared: coordinates(&classification.shared),
            embedded: coordinates(&classification.non_shared),
            install: coordinates(&classification.install),
            optional: coordinates(&classification.optional),
            provided: coordinates(&classification.provided),
            features: directives.features(),
            feature_repositories: directives
                .feature_repositories()
                .into_iter()
                .map(String::from)
                .collect(),
        })
    }

    fn collect(
        &self,
        root: &Coordinate,
        directives: &Directives,
    ) -> Result<DependencyTree, ResolveError> {
        let filters = directives.filters();
        self.resolver
            .collect_dependencies(root, self.offline, &|coordinate, optional| {
                filters.excludes_unselected_optional(coordinate, optional)
            })
    }

    /// Config file, then root manifest, then each extension module.
    fn merge_directives(&self, tree: &DependencyTree) -> Result<Directives, RegistryError> {
        let mut directives = self.config.clone();
        directives.merge(&Directives::from_manifest(tree.node(tree.root()).manifest()));

        let extensions: Vec<String> = directives.extension_names().map(str::to_string).collect();
        for name in extensions {
            let module = lookup_unique(self.registry, &name)?;
            debug!("Merging directives of extension {} {}", name, module.version);
            directives.merge(&Directives::from_manifest(&module.manifest));
        }
        Ok(directives)
    }
}

/// The root's declared exports, or every package it owns when it declares
/// none.
fn declared_exports(tree: &DependencyTree, classification: &Classification) -> PackageMap {
    let root = tree.root();
    if let Some(declared) = tree.node(root).manifest_entry(EXPORT_PACKAGE) {
        return clause::parse_clauses(declared);
    }
    tree.packages_or_empty(root)
        .iter()
        .filter(|package| !classification.ownership.is_hidden(tree, root, package))
        .map(|package| (package.clone(), clause::Attributes::new()))
        .collect()
}
