//! Maven-style artifact coordinates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default artifact extension.
pub const DEFAULT_EXTENSION: &str = "jar";

/// Error returned when a coordinate string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid coordinate '{input}': {reason}")]
pub struct CoordinateError {
    pub input: String,
    pub reason: &'static str,
}

/// Identity of one resolved artifact.
///
/// The textual form is `group:artifact:version`, optionally extended to
/// `group:artifact:extension:classifier:version` the way Maven prints it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

impl Coordinate {
    /// Create a plain jar coordinate.
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
            classifier: None,
            extension: default_extension(),
        }
    }

    /// Attach a classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    /// `group:artifact`, the key filters match against.
    pub fn key(&self) -> String {
        format!("{}:{}", self.group, self.artifact)
    }

    /// Identity used for deduplication: `group:artifact:version[:classifier]`.
    pub fn identity(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}:{}:{}:{}",
                self.group, self.artifact, self.version, classifier
            ),
            None => format!("{}:{}:{}", self.group, self.artifact, self.version),
        }
    }

    /// File name used when the artifact is embedded into a module.
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact, self.version, classifier, self.extension
            ),
            None => format!("{}-{}.{}", self.artifact, self.version, self.extension),
        }
    }

    /// Default module symbolic name, `group.artifact`.
    pub fn symbolic_name(&self) -> String {
        if self.group.is_empty() {
            self.artifact.clone()
        } else if self.artifact.is_empty() {
            self.group.clone()
        } else {
            format!("{}.{}", self.group, self.artifact)
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(
                f,
                "{}:{}:{}:{}:{}",
                self.group, self.artifact, self.extension, classifier, self.version
            ),
            None if self.extension != DEFAULT_EXTENSION => write!(
                f,
                "{}:{}:{}:{}",
                self.group, self.artifact, self.extension, self.version
            ),
            None => write!(f, "{}:{}:{}", self.group, self.artifact, self.version),
        }
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |reason| CoordinateError {
            input: s.to_string(),
            reason,
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(error("empty segment"));
        }

        match parts.as_slice() {
            [group, artifact, version] => Ok(Self::new(*group, *artifact, *version)),
            [group, artifact, extension, version] => Ok(Self {
                extension: (*extension).to_string(),
                ..Self::new(*group, *artifact, *version)
            }),
            [group, artifact, extension, classifier, version] => Ok(Self {
                extension: (*extension).to_string(),
                classifier: Some((*classifier).to_string()),
                ..Self::new(*group, *artifact, *version)
            }),
            _ => Err(error("expected group:artifact[:extension[:classifier]]:version")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_three_part() {
        let coord: Coordinate = "org.example:core:1.2.3".parse().unwrap();
        assert_eq!(coord.group, "org.example");
        assert_eq!(coord.artifact, "core");
        assert_eq!(coord.version, "1.2.3");
        assert_eq!(coord.extension, "jar");
        assert!(coord.classifier.is_none());
    }

    #[test]
    fn test_parse_with_classifier() {
        let coord: Coordinate = "org.example:core:jar:tests:1.0".parse().unwrap();
        assert_eq!(coord.classifier.as_deref(), Some("tests"));
        assert_eq!(coord.identity(), "org.example:core:1.0:tests");
        assert_eq!(coord.to_string(), "org.example:core:jar:tests:1.0");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("org.example:core".parse::<Coordinate>().is_err());
        assert!("org.example::1.0".parse::<Coordinate>().is_err());
    }

    #[test]
    fn test_file_name() {
        let coord = Coordinate::new("g", "widget", "2.0");
        assert_eq!(coord.file_name(), "widget-2.0.jar");
        let coord = coord.with_classifier("native");
        assert_eq!(coord.file_name(), "widget-2.0-native.jar");
    }

    #[test]
    fn test_symbolic_name() {
        assert_eq!(
            Coordinate::new("org.slf4j", "slf4j-api", "1.7").symbolic_name(),
            "org.slf4j.slf4j-api"
        );
        assert_eq!(Coordinate::new("", "solo", "1").symbolic_name(), "solo");
    }
}
