//! Modules already installed in the runtime.
//!
//! The classifier asks the registry whether a shared dependency is already
//! provided, and the descriptor builder looks up extension modules by
//! symbolic name. [`MemoryRegistry`] backs both with a list that can be
//! loaded from a TOML index file:
//!
//! ```toml
//! [[module]]
//! symbolic-name = "org.slf4j.api"
//! version = "1.6.1"
//! coordinate = "org.slf4j:slf4j-api:1.6.1"
//! export-package = "org.slf4j;version=\"1.6.1\""
//! ```

use crate::clause::{self, PackageMap};
use crate::coordinate::{Coordinate, CoordinateError};
use crate::version::clean_version;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No installed module carries the symbolic name.
    #[error("no installed module named '{0}'")]
    ModuleNotFound(String),

    /// Several installed modules carry the symbolic name.
    #[error("{count} installed modules are named '{name}', expected exactly one")]
    AmbiguousModule { name: String, count: usize },

    /// A module entry names an unparsable coordinate.
    #[error("invalid coordinate for module '{module}': {source}")]
    InvalidCoordinate {
        module: String,
        #[source]
        source: CoordinateError,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(String),
}

/// A module known to be installed in the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    pub symbolic_name: String,
    pub version: String,
    /// Dependency this module satisfies, when it came from one.
    pub coordinate: Option<Coordinate>,
    /// `Export-Package` header of the module.
    pub exports: String,
    /// Remaining manifest entries, including any `Carton-*` directives.
    pub manifest: BTreeMap<String, String>,
}

impl InstalledModule {
    #[must_use]
    pub fn new(symbolic_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            symbolic_name: symbolic_name.into(),
            version: version.into(),
            coordinate: None,
            exports: String::new(),
            manifest: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn providing(mut self, coordinate: Coordinate) -> Self {
        self.coordinate = Some(coordinate);
        self
    }

    #[must_use]
    pub fn with_exports(mut self, exports: impl Into<String>) -> Self {
        self.exports = exports.into();
        self
    }

    #[must_use]
    pub fn with_manifest_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.manifest.insert(key.into(), value.into());
        self
    }

    /// Parsed `Export-Package` clauses.
    pub fn export_clauses(&self) -> PackageMap {
        clause::parse_clauses(&self.exports)
    }

    /// True if this module satisfies the dependency: same group and
    /// artifact, same cleaned version.
    pub fn satisfies(&self, coordinate: &Coordinate) -> bool {
        self.coordinate.as_ref().is_some_and(|provided| {
            provided.key() == coordinate.key()
                && provided.classifier == coordinate.classifier
                && clean_version(&provided.version) == clean_version(&coordinate.version)
        })
    }
}

/// Lookup interface over installed modules.
pub trait ModuleRegistry {
    /// The installed module satisfying `coordinate`, if any.
    fn installed(&self, coordinate: &Coordinate) -> Option<&InstalledModule>;

    /// Every installed module carrying `symbolic_name`.
    fn find_by_symbolic_name(&self, symbolic_name: &str) -> Vec<&InstalledModule>;
}

/// Look up the single module carrying `symbolic_name`.
///
/// # Errors
///
/// Returns [`RegistryError::ModuleNotFound`] when no module matches and
/// [`RegistryError::AmbiguousModule`] when more than one does.
pub fn lookup_unique<'a>(
    registry: &'a dyn ModuleRegistry,
    symbolic_name: &str,
) -> Result<&'a InstalledModule, RegistryError> {
    let mut matches = registry.find_by_symbolic_name(symbolic_name);
    match matches.len() {
        0 => Err(RegistryError::ModuleNotFound(symbolic_name.to_string())),
        1 => Ok(matches.remove(0)),
        count => Err(RegistryError::AmbiguousModule {
            name: symbolic_name.to_string(),
            count,
        }),
    }
}

/// On-disk form of one module entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ModuleEntry {
    symbolic_name: String,
    version: String,
    #[serde(default)]
    coordinate: Option<String>,
    #[serde(default)]
    export_package: String,
    #[serde(default)]
    manifest: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "module")]
    modules: Vec<ModuleEntry>,
}

/// Registry backed by an in-memory module list.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    modules: Vec<InstalledModule>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry index. A missing file yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a registry index from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid index or a module names an
    /// invalid coordinate.
    pub fn from_toml_str(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| RegistryError::Toml(e.to_string()))?;

        let mut registry = Self::new();
        for entry in file.modules {
            let coordinate = entry
                .coordinate
                .as_deref()
                .map(str::parse::<Coordinate>)
                .transpose()
                .map_err(|source| RegistryError::InvalidCoordinate {
                    module: entry.symbolic_name.clone(),
                    source,
                })?;
            registry.insert(InstalledModule {
                symbolic_name: entry.symbolic_name,
                version: entry.version,
                coordinate,
                exports: entry.export_package,
                manifest: entry.manifest,
            });
        }
        Ok(registry)
    }

    pub fn insert(&mut self, module: InstalledModule) {
        self.modules.push(module);
    }

    #[must_use]
    pub fn with_module(mut self, module: InstalledModule) -> Self {
        self.insert(module);
        self
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleRegistry for MemoryRegistry {
    fn installed(&self, coordinate: &Coordinate) -> Option<&InstalledModule> {
        self.modules.iter().find(|m| m.satisfies(coordinate))
    }

    fn find_by_symbolic_name(&self, symbolic_name: &str) -> Vec<&InstalledModule> {
        self.modules
            .iter()
            .filter(|m| m.symbolic_name == symbolic_name)
            .collect()
    }
}
