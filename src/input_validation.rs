//! Input validation
//!
//! Checks user-supplied values before they reach the backend.

use anyhow::{bail, Result};
use std::path::{Component, Path};

/// Maximum allowed path length
const MAX_PATH_LENGTH: usize = 4096;

/// Validate a project slug
///
/// Slugs are lowercase ASCII letters, digits and hyphens.
pub fn validate_project_slug(slug: &str) -> Result<()> {
    const MAX_SLUG_LENGTH: usize = 100;

    if slug.is_empty() {
        bail!("Project slug cannot be empty");
    }

    if slug.len() > MAX_SLUG_LENGTH {
        bail!(
            "Project slug too long: {} chars (max: {})",
            slug.len(),
            MAX_SLUG_LENGTH
        );
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        bail!("Project slug contains invalid characters: '{}'", slug);
    }

    Ok(())
}

/// Validate a burst gap in seconds
pub fn validate_burst_gap(secs: u64) -> Result<()> {
    const MAX_BURST_GAP_SECS: u64 = 3600;

    if secs == 0 {
        bail!("Burst gap must be at least 1 second");
    }

    if secs > MAX_BURST_GAP_SECS {
        bail!(
            "Burst gap too large: {}s (max: {}s)",
            secs,
            MAX_BURST_GAP_SECS
        );
    }

    Ok(())
}

/// Validate a source folder path before attaching it
pub fn validate_folder_path(path: &str) -> Result<()> {
    if path.trim().is_empty() {
        bail!("Folder path cannot be empty");
    }

    if path.len() > MAX_PATH_LENGTH {
        bail!("Path too long (max {MAX_PATH_LENGTH} bytes)");
    }

    if path.bytes().any(|b| b == 0) {
        bail!("Path contains null bytes");
    }

    if Path::new(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        bail!("Path traversal detected (..)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_project_slug() {
        assert!(validate_project_slug("iceland-2024").is_ok());
        assert!(validate_project_slug("trip2").is_ok());

        assert!(validate_project_slug("").is_err());
        assert!(validate_project_slug("Iceland").is_err());
        assert!(validate_project_slug("a/b").is_err());
        assert!(validate_project_slug(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_burst_gap() {
        assert!(validate_burst_gap(1).is_ok());
        assert!(validate_burst_gap(3).is_ok());
        assert!(validate_burst_gap(3600).is_ok());

        assert!(validate_burst_gap(0).is_err());
        assert!(validate_burst_gap(3601).is_err());
    }

    #[test]
    fn test_validate_folder_path() {
        assert!(validate_folder_path("/Users/me/Pictures/2024").is_ok());
        assert!(validate_folder_path("photos/raw").is_ok());

        assert!(validate_folder_path("").is_err());
        assert!(validate_folder_path("   ").is_err());
        assert!(validate_folder_path("/photos/../etc").is_err());
        assert!(validate_folder_path("bad\0path").is_err());
        assert!(validate_folder_path(&"a".repeat(5000)).is_err());
    }
}
