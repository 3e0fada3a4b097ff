//! Module descriptor synthesis for resolved Maven dependency trees.
//!
//! This crate provides:
//! - Classification of a dependency tree into shared, embedded, optional
//!   and to-install dependencies
//! - Package ownership tracking across competing artifact versions
//! - Version range synthesis and manifest header assembly
//! - Directive loading from `carton.toml` and root manifests
//! - File-backed dependency resolution and module registries

mod classify;
mod clause;
mod coordinate;
mod descriptor;
mod directives;
mod filter;
mod headers;
mod jar;
mod ownership;
mod registry;
mod resolve;
mod tree;
mod version;

pub use classify::{classify, dedup, Classification, ClassifyOptions};
pub use clause::{
    parse_clauses, parse_manifest, strip_attributes, write_manifest, Attributes,
    ClauseEncoder, HeaderEncoder, PackageMap, MANIFEST_LINE_WIDTH, OPTIONAL, RESOLUTION, VERSION,
};
pub use coordinate::{Coordinate, CoordinateError, DEFAULT_EXTENSION};
pub use descriptor::{
    DescriptorBuilder, DescriptorError, ModuleDescriptor, BUNDLE_CLASS_PATH, BUNDLE_VERSION,
    REQUIRE_BUNDLE,
};
pub use directives::{
    Directives, DirectivesError, Feature, CONFIG_FILE, DEPENDENCY_REQUIRE_MODULE,
    EXCLUDE_DEPENDENCY, EXCLUDE_IMPORT_PACKAGE, EXTENSIONS, FEATURES, FEATURE_REPOSITORY_URLS,
    IMPORT_DEPENDENCY_EXPORTS, INCLUDE_OPTIONAL_DEPENDENCY, INCLUDE_SHARED_RESOURCES,
    INSTALL_PROVIDED_MODULE_DEPENDENCIES, PROVIDED_DEPENDENCY, VERSION_RANGE_DIGITS,
};
pub use filter::{ClassificationFilters, Filter};
pub use headers::{
    assemble_exports, assemble_imports, class_path, exclude_imports, merge_extra_imports,
    provided_exports, require_bundle, ClassificationResolver, ImportHeader, ImportSources,
    VersionResolver, EMITTED_ATTRIBUTES,
};
pub use jar::{read_jar_manifest, read_jar_packages, MANIFEST_PATH};
pub use ownership::PackageOwnership;
pub use registry::{lookup_unique, InstalledModule, MemoryRegistry, ModuleRegistry, RegistryError};
pub use resolve::{DependencyResolver, FileResolver, NodeSpec, ResolveError};
pub use tree::{
    DependencyNode, DependencyTree, NodeId, EXPORT_PACKAGE, FRAGMENT_HOST,
    IMPORT_PACKAGE, SYMBOLIC_NAME,
};
pub use version::{
    checked_range_digits, clean_version, is_range, parse_range_digits, version_range,
    ModuleVersion, MAX_RANGE_DIGITS,
};
