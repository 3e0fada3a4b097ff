//! Module versions and version range synthesis.
//!
//! Artifact versions arrive in Maven form (`1.2-SNAPSHOT`, `3`, `2.0.0.Final`)
//! and are cleaned into the dotted `major.minor.micro[.qualifier]` form that
//! module manifests use. A cleaned version plus a digit sensitivity yields the
//! range written into `Import-Package` and `Require-Bundle` clauses.

use std::cmp::Ordering;
use std::fmt;
use tracing::warn;

/// Widest supported digit sensitivity (open-ended range).
pub const MAX_RANGE_DIGITS: u8 = 4;

/// A cleaned module version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ModuleVersion {
    pub major: u64,
    pub minor: u64,
    pub micro: u64,
    /// Free-form qualifier; empty sorts before any non-empty qualifier.
    pub qualifier: String,
}

impl ModuleVersion {
    pub fn new(major: u64, minor: u64, micro: u64) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    /// Parse any version string, cleaning it first.
    ///
    /// This never fails: text without a numeric prefix becomes the qualifier
    /// of `0.0.0`.
    pub fn parse(raw: &str) -> Self {
        let (numbers, qualifier) = split_version(raw);
        Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        }
    }
}

impl Ord for ModuleVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for ModuleVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ModuleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

/// Clean a Maven version into dotted module form.
///
/// - `1` → `1.0.0`
/// - `1.2-SNAPSHOT` → `1.2.0.SNAPSHOT`
/// - `2.0.0.Final` → `2.0.0.Final`
/// - `r09` → `0.0.0.r09`
pub fn clean_version(raw: &str) -> String {
    ModuleVersion::parse(raw).to_string()
}

/// Split a raw version into up to three numeric segments and a qualifier.
fn split_version(raw: &str) -> ([u64; 3], String) {
    let raw = raw.trim();
    let mut numbers = [0u64; 3];
    let mut rest = raw;

    for (index, slot) in numbers.iter_mut().enumerate() {
        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        if digits == 0 {
            if index == 0 {
                return ([0; 3], sanitize_qualifier(raw));
            }
            break;
        }
        let Ok(value) = rest[..digits].parse::<u64>() else {
            // Digit runs too long for u64 are kept verbatim in the qualifier.
            return ([0; 3], sanitize_qualifier(raw));
        };
        *slot = value;
        rest = &rest[digits..];

        // Continue only across a dot followed by another digit run.
        match rest.strip_prefix('.') {
            Some(next) if index < 2 && next.starts_with(|c: char| c.is_ascii_digit()) => {
                rest = next;
            }
            _ => break,
        }
    }

    let qualifier = rest
        .strip_prefix(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest);
    (numbers, sanitize_qualifier(qualifier))
}

fn sanitize_qualifier(qualifier: &str) -> String {
    qualifier
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Returns true if the text is already a range expression.
pub fn is_range(version: &str) -> bool {
    version.contains('[') || version.contains('(')
}

/// Synthesize a version range from a cleaned version.
///
/// | digits | range                         |
/// |--------|-------------------------------|
/// | 0      | `[V,V]`                       |
/// | 1      | `[V,major.minor.(micro+1))`   |
/// | 2      | `[V,major.(minor+1))`         |
/// | 3      | `[V,(major+1))`               |
/// | 4      | `[V,)`                        |
///
/// Existing ranges pass through untouched. Sensitivities above
/// [`MAX_RANGE_DIGITS`] are treated as 0.
pub fn version_range(version: &str, digits: u8) -> String {
    if is_range(version) {
        return version.to_string();
    }

    let digits = if digits > MAX_RANGE_DIGITS {
        warn!(
            "Version range digits {} out of range 0..={}, using exact ranges",
            digits, MAX_RANGE_DIGITS
        );
        0
    } else {
        digits
    };

    match range_ceiling(&ModuleVersion::parse(version), digits) {
        Some(ceiling) => format!("[{version},{ceiling})"),
        None if digits == 0 => format!("[{version},{version}]"),
        None => format!("[{version},)"),
    }
}

/// Exclusive upper bound for a sensitivity. A segment that cannot be bumped
/// widens the bound to the next segment up, and past the major to no bound.
fn range_ceiling(parsed: &ModuleVersion, digits: u8) -> Option<String> {
    match digits {
        1 => match parsed.micro.checked_add(1) {
            Some(micro) => Some(format!("{}.{}.{micro}", parsed.major, parsed.minor)),
            None => range_ceiling(parsed, 2),
        },
        2 => match parsed.minor.checked_add(1) {
            Some(minor) => Some(format!("{}.{minor}", parsed.major)),
            None => range_ceiling(parsed, 3),
        },
        3 => parsed.major.checked_add(1).map(|major| major.to_string()),
        _ => None,
    }
}

/// Parse a digit sensitivity directive value.
///
/// Unparsable or out-of-range values fall back to 0 with a warning.
pub fn parse_range_digits(value: &str) -> u8 {
    let value = value.trim();
    if value.is_empty() {
        return 0;
    }
    match value.parse::<i64>() {
        Ok(digits) => checked_range_digits(digits),
        Err(e) => {
            warn!(
                "Failed to parse version range digits '{}': {}, using 0",
                value, e
            );
            0
        }
    }
}

/// Clamp an integer sensitivity to the supported range, warning on fallback.
pub fn checked_range_digits(digits: i64) -> u8 {
    match u8::try_from(digits) {
        Ok(d) if d <= MAX_RANGE_DIGITS => d,
        _ => {
            warn!(
                "Version range digits {} must be between 0 and {}, using 0",
                digits, MAX_RANGE_DIGITS
            );
            0
        }
    }
}
