//! Jar inspection: package listing and manifest extraction.

use crate::clause::parse_manifest;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use zip::ZipArchive;

/// Manifest entry path inside a jar.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// List the packages of a jar: every directory holding a `.class` entry,
/// outside `META-INF`, in dotted form. Classes in the default package are
/// ignored.
pub fn read_jar_packages(path: &Path) -> io::Result<BTreeSet<String>> {
    let mut archive = ZipArchive::new(File::open(path)?).map_err(io::Error::other)?;
    let mut packages = BTreeSet::new();

    for index in 0..archive.len() {
        let entry = archive.by_index(index).map_err(io::Error::other)?;
        if let Some(package) = class_package(entry.name()) {
            packages.insert(package);
        }
    }

    Ok(packages)
}

/// Read the main manifest section of a jar, or an empty map when the jar has
/// no manifest.
pub fn read_jar_manifest(path: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut archive = ZipArchive::new(File::open(path)?).map_err(io::Error::other)?;
    let mut entry = match archive.by_name(MANIFEST_PATH) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(BTreeMap::new()),
        Err(e) => return Err(io::Error::other(e)),
    };

    let mut text = String::new();
    entry.read_to_string(&mut text)?;
    Ok(parse_manifest(&text))
}

fn class_package(entry: &str) -> Option<String> {
    if !entry.ends_with(".class") || entry.starts_with("META-INF/") {
        return None;
    }
    let (dir, _) = entry.rsplit_once('/')?;
    Some(dir.replace('/', "."))
}
