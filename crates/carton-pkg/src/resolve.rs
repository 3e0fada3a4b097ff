//! Dependency tree collection.
//!
//! A [`DependencyResolver`] turns a root coordinate into a resolved
//! [`DependencyTree`]. [`FileResolver`] reads trees that an earlier
//! resolution step wrote to a local repository, one TOML file per root at
//! `<repo>/<group>/<artifact>-<version>.toml`:
//!
//! ```toml
//! coordinate = "org.acme:app:1.0.0"
//! jar = "app-1.0.0.jar"
//!
//! [[dependencies]]
//! coordinate = "org.slf4j:slf4j-api:1.6.1"
//! module = true
//! packages = ["org.slf4j", "org.slf4j.spi"]
//!
//! [[dependencies.dependencies]]
//! coordinate = "org.acme:tools:2.0"
//! optional = true
//! ```
//!
//! Jar paths are relative to the tree file. A jar's manifest is read while
//! the tree is built; its packages are read lazily when first needed.

use crate::coordinate::{Coordinate, CoordinateError};
use crate::jar;
use crate::tree::{DependencyNode, DependencyTree, NodeId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while collecting a dependency tree.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// No tree is recorded for the coordinate.
    #[error("no dependency tree for '{coordinate}' at {}", .path.display())]
    NotFound { coordinate: String, path: PathBuf },

    /// The tree file could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The tree file is not valid TOML.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A node names an unparsable coordinate.
    #[error(transparent)]
    InvalidCoordinate(#[from] CoordinateError),

    /// A jar's manifest could not be read.
    #[error("failed to read manifest of {}: {source}", .path.display())]
    JarManifest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Collects the transitive dependencies of a root artifact.
pub trait DependencyResolver {
    /// Collect the tree rooted at `root`.
    ///
    /// `exclude` is called with each dependency's coordinate and optional
    /// flag; dependencies it accepts are left out together with their
    /// subtrees. The root is always kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be found or read.
    fn collect_dependencies(
        &self,
        root: &Coordinate,
        offline: bool,
        exclude: &dyn Fn(&Coordinate, bool) -> bool,
    ) -> Result<DependencyTree, ResolveError>;
}

/// One node of a tree file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub coordinate: String,
    #[serde(default)]
    pub module: bool,
    #[serde(default)]
    pub optional: bool,
    /// Backing jar, relative to the tree file.
    #[serde(default)]
    pub jar: Option<PathBuf>,
    /// Packages, when known without opening the jar.
    #[serde(default)]
    pub packages: Option<Vec<String>>,
    /// Manifest entries; these override entries read from the jar.
    #[serde(default)]
    pub manifest: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<NodeSpec>,
}

/// Resolver reading tree files from a local repository directory.
#[derive(Debug, Clone)]
pub struct FileResolver {
    repository: PathBuf,
}

impl FileResolver {
    #[must_use]
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    /// Location of the tree file for `coordinate`.
    pub fn tree_path(&self, coordinate: &Coordinate) -> PathBuf {
        let file = match &coordinate.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.toml",
                coordinate.artifact, coordinate.version, classifier
            ),
            None => format!("{}-{}.toml", coordinate.artifact, coordinate.version),
        };
        self.repository.join(&coordinate.group).join(file)
    }

    /// Read and parse the tree file for `coordinate`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] if no file exists for the
    /// coordinate, or an error if it cannot be read or parsed.
    pub fn load_spec(&self, coordinate: &Coordinate) -> Result<NodeSpec, ResolveError> {
        let path = self.tree_path(coordinate);
        if !path.is_file() {
            return Err(ResolveError::NotFound {
                coordinate: coordinate.to_string(),
                path,
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ResolveError::Parse { path, source })
    }
}

impl DependencyResolver for FileResolver {
    fn collect_dependencies(
        &self,
        root: &Coordinate,
        offline: bool,
        exclude: &dyn Fn(&Coordinate, bool) -> bool,
    ) -> Result<DependencyTree, ResolveError> {
        // Trees are already on disk, so offline mode changes nothing here.
        debug!("Collecting dependencies of {} (offline: {})", root, offline);

        let spec = self.load_spec(root)?;
        let base = self.tree_path(root);
        let base = base.parent().unwrap_or(self.repository.as_path());

        let root_node = build_node(&spec, base)?;
        if root_node.coordinate().identity() != root.identity() {
            warn!(
                "Tree file for {} describes {}",
                root,
                root_node.coordinate()
            );
        }

        let mut tree = DependencyTree::new(root_node);
        let mut stack: Vec<(NodeId, &NodeSpec)> = spec
            .dependencies
            .iter()
            .rev()
            .map(|child| (tree.root(), child))
            .collect();

        while let Some((parent, child)) = stack.pop() {
            let coordinate: Coordinate = child.coordinate.parse()?;
            if exclude(&coordinate, child.optional) {
                debug!("Skipping {} during collection", coordinate);
                continue;
            }
            let id = tree.add_child(parent, build_node(child, base)?);
            stack.extend(child.dependencies.iter().rev().map(|grandchild| (id, grandchild)));
        }

        debug!("Collected {} nodes for {}", tree.len(), root);
        Ok(tree)
    }
}

fn build_node(spec: &NodeSpec, base: &Path) -> Result<DependencyNode, ResolveError> {
    let coordinate: Coordinate = spec.coordinate.parse()?;
    let mut node = DependencyNode::new(coordinate)
        .module(spec.module)
        .optional(spec.optional);

    if let Some(jar_path) = &spec.jar {
        let path = base.join(jar_path);
        let manifest = jar::read_jar_manifest(&path).map_err(|source| ResolveError::JarManifest {
            path: path.clone(),
            source,
        })?;
        node = node.with_manifest(manifest);
        if spec.packages.is_none() {
            node = node.with_jar(path);
        }
    }
    if let Some(packages) = &spec.packages {
        node = node.with_packages(packages.iter().cloned());
    }
    Ok(node.with_manifest(spec.manifest.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jar::MANIFEST_PATH;
    use crate::tree::SYMBOLIC_NAME;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const TREE: &str = r#"
coordinate = "org.acme:app:1.0"

[manifest]
Bundle-SymbolicName = "org.acme.app"

[[dependencies]]
coordinate = "org.acme:lib:2.0"
module = true
packages = ["org.acme.lib"]

[[dependencies.dependencies]]
coordinate = "org.acme:deep:3.0"

[[dependencies]]
coordinate = "org.acme:extra:1.1"
optional = true

[[dependencies.dependencies]]
coordinate = "org.acme:under-extra:1.0"
"#;

    fn repo_with(tree: &str) -> (TempDir, FileResolver) {
        let dir = TempDir::new().unwrap();
        let group = dir.path().join("org.acme");
        fs::create_dir_all(&group).unwrap();
        fs::write(group.join("app-1.0.toml"), tree).unwrap();
        let resolver = FileResolver::new(dir.path());
        (dir, resolver)
    }

    fn app() -> Coordinate {
        Coordinate::new("org.acme", "app", "1.0")
    }

    #[test]
    fn test_collect_full_tree() {
        let (_dir, resolver) = repo_with(TREE);
        let tree = resolver
            .collect_dependencies(&app(), true, &|_, _| false)
            .unwrap();

        assert_eq!(tree.len(), 5);
        let root = tree.root();
        assert_eq!(tree.node(root).symbolic_name(), "org.acme.app");
        let artifacts: Vec<_> = tree
            .pre_order(root)
            .into_iter()
            .map(|id| tree.node(id).coordinate().artifact.clone())
            .collect();
        assert_eq!(artifacts, vec!["app", "lib", "deep", "extra", "under-extra"]);

        let lib = tree.children(root)[0];
        assert!(tree.node(lib).is_module());
        assert!(tree.node(lib).packages().unwrap().contains("org.acme.lib"));
    }

    #[test]
    fn test_exclude_prunes_subtree() {
        let (_dir, resolver) = repo_with(TREE);
        let tree = resolver
            .collect_dependencies(&app(), false, &|_, optional| optional)
            .unwrap();
        assert_eq!(tree.len(), 3);
        assert!(tree
            .ids()
            .all(|id| tree.node(id).coordinate().artifact != "under-extra"));
    }

    #[test]
    fn test_missing_tree_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = FileResolver::new(dir.path());
        let err = resolver
            .collect_dependencies(&app(), false, &|_, _| false)
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let (_dir, resolver) = repo_with("coordinate = ");
        assert!(matches!(
            resolver.collect_dependencies(&app(), false, &|_, _| false),
            Err(ResolveError::Parse { .. })
        ));
    }

    #[test]
    fn test_invalid_dependency_coordinate() {
        let (_dir, resolver) = repo_with(
            "coordinate = \"org.acme:app:1.0\"\n[[dependencies]]\ncoordinate = \"broken\"\n",
        );
        assert!(matches!(
            resolver.collect_dependencies(&app(), false, &|_, _| false),
            Err(ResolveError::InvalidCoordinate(_))
        ));
    }

    #[test]
    fn test_jar_manifest_and_lazy_packages() {
        let (dir, resolver) = repo_with(
            "coordinate = \"org.acme:app:1.0\"\n[[dependencies]]\ncoordinate = \"org.acme:jarred:1.0\"\njar = \"jarred-1.0.jar\"\n",
        );
        let jar_path = dir.path().join("org.acme").join("jarred-1.0.jar");
        let mut writer = ZipWriter::new(File::create(&jar_path).unwrap());
        writer
            .start_file(MANIFEST_PATH, SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"Manifest-Version: 1.0\nBundle-SymbolicName: org.acme.jarred\n")
            .unwrap();
        writer
            .start_file("org/acme/jarred/Thing.class", SimpleFileOptions::default())
            .unwrap();
        writer.finish().unwrap();

        let tree = resolver
            .collect_dependencies(&app(), false, &|_, _| false)
            .unwrap();
        let jarred = tree.children(tree.root())[0];
        assert_eq!(
            tree.node(jarred).manifest_entry(SYMBOLIC_NAME),
            Some("org.acme.jarred")
        );
        assert!(tree.node(jarred).packages().unwrap().contains("org.acme.jarred"));
    }

    #[test]
    fn test_missing_jar_is_an_error() {
        let (_dir, resolver) = repo_with(
            "coordinate = \"org.acme:app:1.0\"\n[[dependencies]]\ncoordinate = \"org.acme:gone:1.0\"\njar = \"gone.jar\"\n",
        );
        assert!(matches!(
            resolver.collect_dependencies(&app(), false, &|_, _| false),
            Err(ResolveError::JarManifest { .. })
        ));
    }

    #[test]
    fn test_tree_path() {
        let resolver = FileResolver::new("/repo");
        assert_eq!(
            resolver.tree_path(&app()),
            PathBuf::from("/repo/org.acme/app-1.0.toml")
        );
        assert_eq!(
            resolver.tree_path(&app().with_classifier("tests")),
            PathBuf::from("/repo/org.acme/app-1.0-tests.toml")
        );
    }
}
