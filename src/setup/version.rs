//! Config version checking for setup migrations.
//!
//! The first line of the config file records which version wrote it;
//! setup re-runs when the installed binary is newer.

use anyhow::anyhow;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::path::Path;

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A semantic version (major.minor.patch).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
struct SemanticVersion {
    major: u32,
    minor: u32,
    patch: u32,
}

impl SemanticVersion {
    fn parse(version_str: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = version_str.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(anyhow!(
                "Invalid version format: '{}'. Expected 'major.minor.patch'",
                version_str
            ));
        }

        let component = |index: usize, name: &str| {
            parts[index]
                .parse::<u32>()
                .map_err(|_| anyhow!("Invalid {name} version: '{}'", parts[index]))
        };

        Ok(SemanticVersion {
            major: component(0, "major")?,
            minor: component(1, "minor")?,
            patch: component(2, "patch")?,
        })
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Reads the config version from the first line of the config file.
///
/// Expects the first line to match: `config_version = "X.Y.Z"`.
///
/// # Errors
/// Returns an error if the file can't be read.
fn read_config_version_from_file(config_path: &Path) -> anyhow::Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(config_path)?;
    let first_line = match content.lines().next() {
        Some(line) => line,
        None => return Ok(None),
    };

    let regex = Regex::new(r#"^\s*config_version\s*=\s*"([^"]+)""#)?;
    if let Some(caps) = regex.captures(first_line) {
        return Ok(Some(caps[1].to_string()));
    }

    Ok(None)
}

/// Determines if setup is needed by checking version and config file existence.
///
/// Setup is needed if:
/// 1. Config file doesn't exist, OR
/// 2. Config file exists but has no version (legacy config), OR
/// 3. Config file version is older than current version
///
/// Returns the version that the config file was at (None if file doesn't exist or has no version).
pub fn check_setup_needed(config_path: &Path) -> anyhow::Result<Option<String>> {
    if !config_path.exists() {
        return Ok(None);
    }

    let config_version_opt = read_config_version_from_file(config_path)?;
    match config_version_opt {
        Some(config_version) => {
            let config_parsed = SemanticVersion::parse(&config_version)?;
            let current_parsed = SemanticVersion::parse(CURRENT_VERSION)?;

            match config_parsed.cmp(&current_parsed) {
                Ordering::Less => Ok(Some(config_version)),
                Ordering::Equal => Ok(None),
                Ordering::Greater => {
                    // Config written by a newer binary; don't block startup.
                    tracing::warn!(
                        "Config version {} is newer than app version {}",
                        config_version,
                        CURRENT_VERSION
                    );
                    Ok(None)
                }
            }
        }
        None => Ok(Some("unknown (legacy config)".to_string())),
    }
}

/// Adds or updates the config_version line as the first line of the config file.
///
/// This preserves all existing content by reading the full file, removing any
/// existing config_version line, and prepending the new version line.
pub fn update_config_version(config_path: &Path) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(config_path)?;

    let lines: Vec<&str> = content
        .lines()
        .filter(|line| !line.trim().starts_with("config_version"))
        .collect();

    let version_line = format!(r#"config_version = "{}""#, CURRENT_VERSION);
    let new_content = if lines.is_empty() {
        version_line
    } else {
        format!("{}\n{}", version_line, lines.join("\n"))
    };

    std::fs::write(config_path, new_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_version_parse() {
        let v = SemanticVersion::parse("0.1.0").unwrap();
        assert_eq!(v.major, 0);
        assert_eq!(v.minor, 1);
        assert_eq!(v.patch, 0);
    }

    #[test]
    fn test_semantic_version_comparison() {
        let v1 = SemanticVersion::parse("0.0.4").unwrap();
        let v2 = SemanticVersion::parse("0.0.5").unwrap();
        let v3 = SemanticVersion::parse("0.1.0").unwrap();

        assert!(v1 < v2);
        assert!(v2 < v3);
        assert_eq!(v1, v1.clone());
    }

    #[test]
    fn test_invalid_version_format() {
        assert!(SemanticVersion::parse("0.0").is_err());
        assert!(SemanticVersion::parse("0.0.5.1").is_err());
        assert!(SemanticVersion::parse("invalid").is_err());
    }

    #[test]
    fn test_missing_config_needs_no_version_lookup() {
        let missing = std::env::temp_dir().join("auscult_no_such_config.toml");
        assert_eq!(check_setup_needed(&missing).unwrap(), None);
    }

    #[test]
    fn test_legacy_config_triggers_setup() {
        let path = std::env::temp_dir().join(format!(
            "auscult_legacy_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "[audio]\ndevice = \"default\"\n").unwrap();
        let result = check_setup_needed(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(result.is_some());
    }
}
