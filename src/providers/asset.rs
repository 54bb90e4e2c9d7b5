use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;

/// Source of the provider ordering document.
pub trait ProviderAsset: Send + Sync {
    /// Human-readable origin used in error messages.
    fn name(&self) -> String;

    fn read(&self) -> Result<String, ConfigError>;
}

/// The document shipped inside the binary.
#[derive(Debug, Clone, Default)]
pub struct PackagedAsset;

impl PackagedAsset {
    const CONTENT: &'static str = include_str!("../../assets/providers.json");
}

impl ProviderAsset for PackagedAsset {
    fn name(&self) -> String {
        "packaged providers.json".to_string()
    }

    fn read(&self) -> Result<String, ConfigError> {
        Ok(Self::CONTENT.to_string())
    }
}

/// A document on disk, typically pointed to by `providers_path` in the config.
#[derive(Debug, Clone)]
pub struct FileAsset {
    path: PathBuf,
}

impl FileAsset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ProviderAsset for FileAsset {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn read(&self) -> Result<String, ConfigError> {
        std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Read {
            source_name: self.name(),
            message: e.to_string(),
        })
    }
}

/// An in-memory document, for embedders that fetch the asset themselves.
#[derive(Debug, Clone)]
pub struct InlineAsset {
    name: String,
    content: String,
}

impl InlineAsset {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

impl ProviderAsset for InlineAsset {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn read(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }
}

impl<T: ProviderAsset + ?Sized> ProviderAsset for Box<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn read(&self) -> Result<String, ConfigError> {
        (**self).read()
    }
}

impl<T: ProviderAsset + ?Sized> ProviderAsset for Arc<T> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn read(&self) -> Result<String, ConfigError> {
        (**self).read()
    }
}

/// The asset named by `providers_path`, or the packaged one when unset.
pub fn configured_asset(providers_path: Option<&Path>) -> Box<dyn ProviderAsset> {
    match providers_path {
        Some(path) => Box::new(FileAsset::new(path)),
        None => Box::new(PackagedAsset),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_asset_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let asset = FileAsset::new(dir.path().join("providers.json"));
        assert!(matches!(asset.read(), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_configured_asset() {
        assert_eq!(configured_asset(None).name(), PackagedAsset.name());
        assert_eq!(
            configured_asset(Some(Path::new("/etc/providers.json"))).name(),
            "/etc/providers.json"
        );
    }
}
