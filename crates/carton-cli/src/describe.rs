//! Implementation of the `carton describe` and `carton range` commands.

use anyhow::{Context, Result};
use carton_pkg::{
    clean_version, is_range, parse_range_digits, version_range, Coordinate, DescriptorBuilder,
    Directives, FileResolver, MemoryRegistry, ModuleDescriptor, CONFIG_FILE,
};
use std::path::{Path, PathBuf};

/// Options for the describe command.
#[derive(Debug, Default)]
pub struct DescribeOptions {
    /// Root artifact coordinate.
    pub coordinate: String,
    /// Repository directory with tree files.
    pub repo: PathBuf,
    /// Explicit config file.
    pub config: Option<PathBuf>,
    /// Installed module index.
    pub registry: Option<PathBuf>,
    pub offline: bool,
    /// Print JSON instead of manifest text.
    pub json: bool,
}

/// Build and print the descriptor of one artifact.
pub fn describe(options: &DescribeOptions) -> Result<()> {
    let descriptor = build_descriptor(options)?;
    if options.json {
        println!("{}", serde_json::to_string_pretty(&descriptor)?);
    } else {
        print!("{}", render_text(&descriptor));
    }
    Ok(())
}

fn build_descriptor(options: &DescribeOptions) -> Result<ModuleDescriptor> {
    let root: Coordinate = options
        .coordinate
        .parse()
        .context("invalid root coordinate")?;
    let config = load_config(options.config.as_deref())?;

    let registry = match &options.registry {
        Some(path) => MemoryRegistry::load(path)
            .with_context(|| format!("failed to load registry {}", path.display()))?,
        None => MemoryRegistry::new(),
    };
    let resolver = FileResolver::new(&options.repo);

    DescriptorBuilder::new(&resolver, &registry)
        .with_config(config)
        .offline(options.offline)
        .build(&root)
        .with_context(|| format!("failed to describe {root}"))
}

/// Load the explicit config file, or `carton.toml` in the working directory
/// when it exists.
fn load_config(path: Option<&Path>) -> Result<Directives> {
    if let Some(path) = path {
        return Directives::from_path(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }
    let default = Path::new(CONFIG_FILE);
    if default.is_file() {
        return Directives::from_path(default)
            .with_context(|| format!("failed to load config {CONFIG_FILE}"));
    }
    Ok(Directives::default())
}

/// Manifest text followed by the features to provision, if any.
fn render_text(descriptor: &ModuleDescriptor) -> String {
    let mut text = descriptor.to_manifest();
    if !descriptor.features.is_empty() || !descriptor.feature_repositories.is_empty() {
        text.push('\n');
        for repository in &descriptor.feature_repositories {
            text.push_str(&format!("feature-repository {repository}\n"));
        }
        for feature in &descriptor.features {
            text.push_str(&format!("feature {feature}\n"));
        }
    }
    text
}

/// Range for a raw version and a digit sensitivity argument.
pub fn range(version: &str, digits: &str) -> String {
    let digits = parse_range_digits(digits);
    if is_range(version) {
        return version_range(version, digits);
    }
    version_range(&clean_version(version), digits)
}
