//! Image-file action configuration.
//!
//! ```yaml
//! - action: image-file
//!   imagename: "debian.img"
//!   imagesize: 1GB
//!   fs: ext4
//!   fsname: debian
//! ```

use std::path::{Path, PathBuf};

use diskforge_shared::constants::action::KIND;
use diskforge_shared::{ImageError, ImageResult};
use serde::{Deserialize, Serialize};

use crate::format::Filesystem;
use crate::size::parse_human_size;

/// Immutable per-action configuration. All four image fields are mandatory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Path of the image file.
    #[serde(rename = "imagename")]
    image_name: PathBuf,
    /// Human-readable size, e.g. `1GB`.
    #[serde(rename = "imagesize")]
    image_size: String,
    fs: Filesystem,
    /// Volume label.
    #[serde(rename = "fsname")]
    fs_name: String,
}

impl ImageSpec {
    pub fn new(
        image_name: impl Into<PathBuf>,
        image_size: impl Into<String>,
        fs: Filesystem,
        fs_name: impl Into<String>,
    ) -> Self {
        Self {
            action: Some(KIND.to_string()),
            description: None,
            image_name: image_name.into(),
            image_size: image_size.into(),
            fs,
            fs_name: fs_name.into(),
        }
    }

    /// Parse a single action mapping from YAML.
    pub fn from_yaml_str(content: &str) -> ImageResult<Self> {
        let spec: ImageSpec = serde_yaml::from_str(content)
            .map_err(|e| ImageError::Config(format!("invalid image-file action: {}", e)))?;
        spec.check_action()?;
        Ok(spec)
    }

    /// Load an action from a YAML file.
    ///
    /// The file may hold either a single mapping or a one-element list, the
    /// way actions appear in a recipe.
    pub fn from_file(path: &Path) -> ImageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ImageError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let value: serde_yaml::Value = serde_yaml::from_str(&content).map_err(|e| {
            ImageError::Config(format!("{}: invalid YAML: {}", path.display(), e))
        })?;

        let value = match value {
            serde_yaml::Value::Sequence(mut list) => {
                if list.len() != 1 {
                    return Err(ImageError::Config(format!(
                        "{}: expected exactly one action, found {}",
                        path.display(),
                        list.len()
                    )));
                }
                list.remove(0)
            }
            other => other,
        };

        Self::from_yaml_value(value)
    }

    fn from_yaml_value(value: serde_yaml::Value) -> ImageResult<Self> {
        let spec: ImageSpec = serde_yaml::from_value(value)
            .map_err(|e| ImageError::Config(format!("invalid image-file action: {}", e)))?;
        spec.check_action()?;
        Ok(spec)
    }

    fn check_action(&self) -> ImageResult<()> {
        match self.action.as_deref() {
            None | Some(KIND) => Ok(()),
            Some(other) => Err(ImageError::Config(format!(
                "unexpected action {:?}, expected {:?}",
                other, KIND
            ))),
        }
    }

    /// Check the fields and return the parsed image size.
    pub fn validate(&self) -> ImageResult<u64> {
        if self.image_name.as_os_str().is_empty() {
            return Err(ImageError::Config("imagename must not be empty".into()));
        }
        if self.fs_name.is_empty() {
            return Err(ImageError::Config("fsname must not be empty".into()));
        }
        parse_human_size(&self.image_size)
    }

    pub fn image_name(&self) -> &Path {
        &self.image_name
    }

    pub fn image_size(&self) -> &str {
        &self.image_size
    }

    pub fn fs(&self) -> &Filesystem {
        &self.fs
    }

    pub fn fs_name(&self) -> &str {
        &self.fs_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
