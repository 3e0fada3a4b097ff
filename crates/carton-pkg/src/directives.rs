//! Classification directives.
//!
//! Directives come from three places, merged in order: the `[module]` table
//! of a `carton.toml` file, the `Carton-*` entries of the root manifest, and
//! the `Carton-*` entries of every extension module the root names. Pattern
//! lists concatenate, flags are OR-ed and the last digit sensitivity wins.

use crate::classify::ClassifyOptions;
use crate::filter::{ClassificationFilters, Filter};
use crate::version::{checked_range_digits, parse_range_digits};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::warn;
use url::Url;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "carton.toml";

pub const PROVIDED_DEPENDENCY: &str = "Carton-Provided-Dependency";
pub const DEPENDENCY_REQUIRE_MODULE: &str = "Carton-Dependency-Require-Module";
pub const EXCLUDE_DEPENDENCY: &str = "Carton-Exclude-Dependency";
pub const INCLUDE_OPTIONAL_DEPENDENCY: &str = "Carton-Include-Optional-Dependency";
pub const IMPORT_DEPENDENCY_EXPORTS: &str = "Carton-Import-Dependency-Exports";
pub const INCLUDE_SHARED_RESOURCES: &str = "Carton-Include-Shared-Resources";
pub const INSTALL_PROVIDED_MODULE_DEPENDENCIES: &str = "Carton-Install-Provided-Module-Dependencies";
pub const VERSION_RANGE_DIGITS: &str = "Carton-Version-Range-Digits";
pub const EXCLUDE_IMPORT_PACKAGE: &str = "Carton-Exclude-Import-Package";
pub const EXTENSIONS: &str = "Carton-Extensions";
pub const FEATURES: &str = "Carton-Features";
pub const FEATURE_REPOSITORY_URLS: &str = "Carton-Feature-Repository-URLs";

/// Errors that can occur when loading directives.
#[derive(Error, Debug)]
pub enum DirectivesError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Merged directive values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Directives {
    pub provided_dependency: String,
    pub dependency_require_module: String,
    pub exclude_dependency: String,
    pub include_optional_dependency: String,
    pub import_dependency_exports: String,
    pub include_shared_resources: bool,
    pub install_provided_module_dependencies: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_range_digits: Option<i64>,
    pub exclude_import_package: String,
    pub extensions: String,
    pub features: String,
    pub feature_repository_urls: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    module: Directives,
}

impl Directives {
    /// Load the `[module]` table of a config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DirectivesError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config file text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or holds unknown keys.
    pub fn parse(content: &str) -> Result<Self, DirectivesError> {
        let config: ConfigFile = toml::from_str(content)?;
        Ok(config.module)
    }

    /// Read the `Carton-*` entries of a manifest. Other entries are ignored.
    pub fn from_manifest(entries: &BTreeMap<String, String>) -> Self {
        let text = |key: &str| entries.get(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let flag = |key: &str| entries.get(key).is_some_and(|v| parse_flag(key, v));

        Self {
            provided_dependency: text(PROVIDED_DEPENDENCY),
            dependency_require_module: text(DEPENDENCY_REQUIRE_MODULE),
            exclude_dependency: text(EXCLUDE_DEPENDENCY),
            include_optional_dependency: text(INCLUDE_OPTIONAL_DEPENDENCY),
            import_dependency_exports: text(IMPORT_DEPENDENCY_EXPORTS),
            include_shared_resources: flag(INCLUDE_SHARED_RESOURCES),
            install_provided_module_dependencies: flag(INSTALL_PROVIDED_MODULE_DEPENDENCIES),
            version_range_digits: entries
                .get(VERSION_RANGE_DIGITS)
                .map(|v| i64::from(parse_range_digits(v))),
            exclude_import_package: text(EXCLUDE_IMPORT_PACKAGE),
            extensions: text(EXTENSIONS),
            features: text(FEATURES),
            feature_repository_urls: text(FEATURE_REPOSITORY_URLS),
        }
    }

    /// Merge `other` on top of `self`.
    pub fn merge(&mut self, other: &Directives) {
        append(&mut self.provided_dependency, &other.provided_dependency);
        append(&mut self.dependency_require_module, &other.dependency_require_module);
        append(&mut self.exclude_dependency, &other.exclude_dependency);
        append(&mut self.include_optional_dependency, &other.include_optional_dependency);
        append(&mut self.import_dependency_exports, &other.import_dependency_exports);
        append(&mut self.exclude_import_package, &other.exclude_import_package);
        append(&mut self.extensions, &other.extensions);
        append(&mut self.features, &other.features);
        append(&mut self.feature_repository_urls, &other.feature_repository_urls);
        self.include_shared_resources |= other.include_shared_resources;
        self.install_provided_module_dependencies |= other.install_provided_module_dependencies;
        if other.version_range_digits.is_some() {
            self.version_range_digits = other.version_range_digits;
        }
    }

    /// Filters derived from the current pattern lists.
    pub fn filters(&self) -> ClassificationFilters {
        ClassificationFilters {
            shared: Filter::parse(&self.provided_dependency),
            require_as_module: Filter::parse(&self.dependency_require_module),
            excluded: Filter::parse(&self.exclude_dependency),
            optional: Filter::parse(&self.include_optional_dependency),
            import_exports: Filter::parse(&self.import_dependency_exports),
        }
    }

    pub fn options(&self) -> ClassifyOptions {
        ClassifyOptions {
            include_shared_resources: self.include_shared_resources,
            install_provided_modules: self.install_provided_module_dependencies,
        }
    }

    /// Digit sensitivity, 0 when unset or out of range.
    pub fn range_digits(&self) -> u8 {
        self.version_range_digits.map_or(0, checked_range_digits)
    }

    /// Symbolic names of the extension modules to merge.
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.split_whitespace()
    }

    /// Features to provision, skipping malformed tokens.
    pub fn features(&self) -> Vec<Feature> {
        self.features
            .split_whitespace()
            .filter_map(|token| match Feature::parse(token) {
                Some(feature) => Some(feature),
                None => {
                    warn!("Ignoring malformed feature '{}'", token);
                    None
                }
            })
            .collect()
    }

    /// Feature repository locations, skipping invalid URLs.
    pub fn feature_repositories(&self) -> Vec<Url> {
        self.feature_repository_urls
            .split_whitespace()
            .filter_map(|token| match Url::parse(token) {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!("Ignoring feature repository '{}': {}", token, e);
                    None
                }
            })
            .collect()
    }
}

fn append(target: &mut String, patterns: &str) {
    let patterns = patterns.trim();
    if patterns.is_empty() {
        return;
    }
    if !target.is_empty() {
        target.push(' ');
    }
    target.push_str(patterns);
}

fn parse_flag(key: &str, value: &str) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" => true,
        "false" | "no" | "" => false,
        other => {
            warn!("Invalid boolean '{}' for {}, using false", other, key);
            false
        }
    }
}

/// A feature to provision alongside the module: `name[/version]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Feature {
    /// Parse a `name[/version]` token.
    pub fn parse(token: &str) -> Option<Self> {
        let (name, version) = match token.split_once('/') {
            Some((name, version)) => (name, Some(version)),
            None => (token, None),
        };
        if name.is_empty() || version.is_some_and(|v| v.is_empty() || v.contains('/')) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            version: version.map(str::to_string),
        })
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}/{}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}
