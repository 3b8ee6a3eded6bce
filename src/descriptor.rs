//! Third-party descriptors published next to dependencies

use crate::error::{LicenseError, Result};
use crate::properties::SortedProperties;
use crate::types::{Coordinates, ID_SEPARATOR};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Classifier of a per-dependency third-party descriptor
pub const DESCRIPTOR_CLASSIFIER: &str = "third-party";

/// Type of a per-dependency third-party descriptor
pub const DESCRIPTOR_TYPE: &str = "properties";

/// Type of a dependency that is itself a global license set
pub const LICENSE_SET_TYPE: &str = "license.properties";

/// Finds artifact content by coordinates
pub trait DescriptorLocator {
    /// Raw content of the artifact, `None` when it does not exist
    fn locate(&self, coordinates: &Coordinates) -> Result<Option<String>>;
}

/// Coordinates of the third-party descriptor of a dependency
pub fn descriptor_coordinates(coordinates: &Coordinates) -> Coordinates {
    Coordinates::new(
        coordinates.group_id.clone(),
        coordinates.artifact_id.clone(),
        coordinates.version.clone(),
    )
    .with_kind(DESCRIPTOR_TYPE)
    .with_classifier(DESCRIPTOR_CLASSIFIER)
}

/// Parse descriptor content into an `identity=license` mapping
///
/// Every key must be a dependency identity (`groupId--artifactId--version`
/// at least); anything else means the descriptor is not a third-party
/// descriptor and is rejected.
pub fn parse_descriptor(location: &str, content: &str) -> Result<SortedProperties> {
    let properties = SortedProperties::parse(content);
    if let Some(key) = properties
        .keys()
        .find(|key| key.split(ID_SEPARATOR).filter(|s| !s.is_empty()).count() < 3)
    {
        return Err(LicenseError::descriptor(
            location,
            format!("'{}' is not a dependency identity", key),
        ));
    }
    Ok(properties)
}

/// Local repository laid out as `group/path/artifact/version/artifact-version[-classifier].type`
#[derive(Debug, Clone, Default)]
pub struct LocalRepository {
    roots: Vec<PathBuf>,
}

impl LocalRepository {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    /// Path of an artifact relative to a repository root
    pub fn relative_path(coordinates: &Coordinates) -> PathBuf {
        let mut path: PathBuf = coordinates.group_id.split('.').collect();
        path.push(&coordinates.artifact_id);
        path.push(&coordinates.version);

        let mut file_name = format!("{}-{}", coordinates.artifact_id, coordinates.version);
        if let Some(classifier) = coordinates.classifier.as_deref().filter(|c| !c.is_empty()) {
            file_name.push('-');
            file_name.push_str(classifier);
        }
        file_name.push('.');
        file_name.push_str(&coordinates.kind);
        path.push(file_name);
        path
    }

    fn read(path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| LicenseError::file(path, e))?;
        String::from_utf8(bytes).map_err(|_| {
            LicenseError::descriptor(path.display().to_string(), "content is not valid UTF-8")
        })
    }
}

impl DescriptorLocator for LocalRepository {
    fn locate(&self, coordinates: &Coordinates) -> Result<Option<String>> {
        let relative = Self::relative_path(coordinates);
        for root in &self.roots {
            let candidate = root.join(&relative);
            if candidate.is_file() {
                debug!("Found {} at {}", coordinates.id(), candidate.display());
                return Self::read(&candidate).map(Some);
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path_layout() {
        let coords = descriptor_coordinates(&Coordinates::new("org.example.lib", "core", "1.2"));
        assert_eq!(
            LocalRepository::relative_path(&coords),
            PathBuf::from("org/example/lib/core/1.2/core-1.2-third-party.properties")
        );
    }

    #[test]
    fn test_locate_in_second_root() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let coords = descriptor_coordinates(&Coordinates::new("g", "a", "1"));
        let path = second.path().join(LocalRepository::relative_path(&coords));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "g--b--2=MIT\n").unwrap();

        let repository =
            LocalRepository::new(vec![first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(
            repository.locate(&coords).unwrap().as_deref(),
            Some("g--b--2=MIT\n")
        );
        let absent = descriptor_coordinates(&Coordinates::new("g", "other", "1"));
        assert!(repository.locate(&absent).unwrap().is_none());
    }

    #[test]
    fn test_parse_descriptor_rejects_foreign_keys() {
        assert!(parse_descriptor("x", "g--a--1=MIT\ng--b--2=\n").is_ok());
        assert!(matches!(
            parse_descriptor("x", "name=value\n"),
            Err(LicenseError::DescriptorError { .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let dir = TempDir::new().unwrap();
        let coords = descriptor_coordinates(&Coordinates::new("g", "a", "1"));
        let path = dir.path().join(LocalRepository::relative_path(&coords));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        let repository = LocalRepository::new(vec![dir.path().to_path_buf()]);
        assert!(matches!(
            repository.locate(&coords),
            Err(LicenseError::DescriptorError { .. })
        ));
    }
}
