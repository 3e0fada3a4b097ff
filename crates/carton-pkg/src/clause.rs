//! Manifest attribute clauses.
//!
//! Headers such as `Export-Package` hold comma-separated clauses, each a list
//! of names followed by `;`-separated attributes (`version="1.0"`) and
//! directives (`resolution:=optional`):
//!
//! ```text
//! org.acme.api;org.acme.spi;version="1.2",org.acme.util;resolution:=optional
//! ```
//!
//! Attributes are stored under their name, directives under their name with a
//! trailing `:`, so a round trip keeps the two apart.

use std::collections::BTreeMap;

/// Attribute map of one clause.
pub type Attributes = BTreeMap<String, String>;

/// Ordered package name to attributes map.
pub type PackageMap = BTreeMap<String, Attributes>;

/// Version attribute key.
pub const VERSION: &str = "version";

/// Resolution directive key.
pub const RESOLUTION: &str = "resolution:";

/// Value of the resolution directive marking an optional import.
pub const OPTIONAL: &str = "optional";

/// Encodes package maps into header values.
pub trait HeaderEncoder {
    /// Encode `packages`, emitting only attribute keys listed in `allowed`.
    fn encode(&self, packages: &PackageMap, allowed: &[&str]) -> String;
}

/// Default encoder producing standard clause syntax.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClauseEncoder;

impl HeaderEncoder for ClauseEncoder {
    fn encode(&self, packages: &PackageMap, allowed: &[&str]) -> String {
        packages
            .iter()
            .map(|(name, attributes)| encode_clause(name, attributes, allowed))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn encode_clause(name: &str, attributes: &Attributes, allowed: &[&str]) -> String {
    let mut clause = name.to_string();
    for (key, value) in attributes {
        if !allowed.contains(&key.as_str()) {
            continue;
        }
        if let Some(directive) = key.strip_suffix(':') {
            clause.push_str(&format!(";{directive}:={}", quote_if_needed(value)));
        } else {
            clause.push_str(&format!(";{key}=\"{value}\""));
        }
    }
    clause
}

fn quote_if_needed(value: &str) -> String {
    if value
        .chars()
        .any(|c| matches!(c, ',' | ';' | '=' | ':' | ' ' | '"'))
    {
        format!("\"{value}\"")
    } else {
        value.to_string()
    }
}

/// Parse a clause header into a package map.
///
/// Names sharing one clause share its attributes. Later duplicates of a name
/// replace earlier ones.
pub fn parse_clauses(header: &str) -> PackageMap {
    let mut packages = PackageMap::new();

    for clause in split_unquoted(header, ',') {
        let mut names = Vec::new();
        let mut attributes = Attributes::new();

        for part in split_unquoted(&clause, ';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Some((key, value)) = part.split_once(":=") {
                attributes.insert(format!("{}:", key.trim()), unquote(value));
            } else if let Some((key, value)) = part.split_once('=') {
                attributes.insert(key.trim().to_string(), unquote(value));
            } else {
                names.push(part.to_string());
            }
        }

        for name in names {
            packages.insert(name, attributes.clone());
        }
    }

    packages
}

/// First name of a header value with its attributes stripped,
/// e.g. `org.acme.core;singleton:=true` → `org.acme.core`.
pub fn strip_attributes(value: &str) -> &str {
    value.split(';').next().unwrap_or_default().trim()
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
        .to_string()
}

/// Split on `separator` where it is not inside double quotes.
fn split_unquoted(text: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            c if c == separator && !quoted => {
                if !current.trim().is_empty() {
                    parts.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current);
    }
    parts
}

/// Parse the main section of a `META-INF/MANIFEST.MF` file.
///
/// Lines starting with a single space continue the previous value.
pub fn parse_manifest(text: &str) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    let mut current: Option<(String, String)> = None;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some((_, value)) = current.as_mut() {
                value.push_str(continuation);
            }
            continue;
        }
        if let Some((key, value)) = current.take() {
            entries.insert(key, value);
        }
        if line.is_empty() {
            // End of the main section.
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            current = Some((key.trim().to_string(), value.trim_start().to_string()));
        }
    }
    if let Some((key, value)) = current {
        entries.insert(key, value);
    }

    entries
}

/// Maximum manifest line length in bytes, continuation space included.
pub const MANIFEST_LINE_WIDTH: usize = 72;

/// Render a manifest main section, `Manifest-Version` first and long values
/// wrapped onto continuation lines.
pub fn write_manifest(entries: &BTreeMap<String, String>) -> String {
    let mut text = String::new();
    let version = entries
        .get(MANIFEST_VERSION)
        .map_or("1.0", String::as_str);
    push_wrapped(&mut text, &format!("{MANIFEST_VERSION}: {version}"));
    for (key, value) in entries {
        if key != MANIFEST_VERSION {
            push_wrapped(&mut text, &format!("{key}: {value}"));
        }
    }
    text
}

const MANIFEST_VERSION: &str = "Manifest-Version";

fn push_wrapped(text: &mut String, line: &str) {
    let mut width = MANIFEST_LINE_WIDTH;
    let mut rest = line;
    while rest.len() > width {
        let mut split = width;
        while !rest.is_char_boundary(split) {
            split -= 1;
        }
        text.push_str(&rest[..split]);
        text.push_str("\n ");
        rest = &rest[split..];
        width = MANIFEST_LINE_WIDTH - 1;
    }
    text.push_str(rest);
    text.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_clauses() {
        let map = parse_clauses("org.acme.api,org.acme.util");
        assert_eq!(map.len(), 2);
        assert!(map["org.acme.api"].is_empty());
    }

    #[test]
    fn test_parse_attributes_and_directives() {
        let map = parse_clauses(
            "org.acme.api;org.acme.spi;version=\"[1.0,2)\",org.acme.util;resolution:=optional",
        );
        assert_eq!(map["org.acme.api"][VERSION], "[1.0,2)");
        assert_eq!(map["org.acme.spi"][VERSION], "[1.0,2)");
        assert_eq!(map["org.acme.util"][RESOLUTION], OPTIONAL);
        assert!(!map["org.acme.util"].contains_key(VERSION));
    }

    #[test]
    fn test_encode_respects_allow_list() {
        let mut map = PackageMap::new();
        let mut attributes = Attributes::new();
        attributes.insert(VERSION.to_string(), "[1.0,2)".to_string());
        attributes.insert(RESOLUTION.to_string(), OPTIONAL.to_string());
        attributes.insert("uses:".to_string(), "org.other".to_string());
        map.insert("org.acme".to_string(), attributes);
        map.insert("org.plain".to_string(), Attributes::new());

        let header = ClauseEncoder.encode(&map, &[VERSION, RESOLUTION]);
        assert_eq!(
            header,
            "org.acme;resolution:=optional;version=\"[1.0,2)\",org.plain"
        );
    }

    #[test]
    fn test_encode_then_parse_keeps_directives_apart() {
        let map = parse_clauses("a;version=\"1.0\";resolution:=optional");
        let header = ClauseEncoder.encode(&map, &[VERSION, RESOLUTION]);
        assert_eq!(parse_clauses(&header), map);
    }

    #[test]
    fn test_strip_attributes() {
        assert_eq!(strip_attributes("org.acme.core;singleton:=true"), "org.acme.core");
        assert_eq!(strip_attributes(" plain "), "plain");
    }

    #[test]
    fn test_parse_manifest_with_continuations() {
        let text = "Manifest-Version: 1.0\r\n\
                    Bundle-SymbolicName: org.acme.core\r\n\
                    Export-Package: org.acme.api;version=\"1.0\",org.acme.s\r\n \
                    pi\r\n\
                    \r\n\
                    Name: ignored\r\n";
        let entries = parse_manifest(text);
        assert_eq!(entries["Bundle-SymbolicName"], "org.acme.core");
        assert_eq!(
            entries["Export-Package"],
            "org.acme.api;version=\"1.0\",org.acme.spi"
        );
        assert!(!entries.contains_key("Name"));
    }

    #[test]
    fn test_write_manifest_wraps_long_lines() {
        let mut entries = BTreeMap::new();
        let long = (0..20)
            .map(|i| format!("org.acme.pkg{i}"))
            .collect::<Vec<_>>()
            .join(",");
        entries.insert("Import-Package".to_string(), long.clone());
        entries.insert("Bundle-Version".to_string(), "1.0.0".to_string());

        let text = write_manifest(&entries);
        assert!(text.starts_with("Manifest-Version: 1.0\nBundle-Version: 1.0.0\n"));
        assert!(text.lines().all(|line| line.len() <= MANIFEST_LINE_WIDTH));
        assert!(text.lines().count() > 3);

        let parsed = parse_manifest(&text);
        assert_eq!(parsed["Import-Package"], long);
        assert_eq!(parsed["Manifest-Version"], "1.0");
    }
}
