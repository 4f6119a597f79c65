//! Filesystem type tags and their mkfs command lines.

use std::fmt;
use std::str::FromStr;

use diskforge_shared::ImageError;
use serde::{Deserialize, Serialize};

/// Filesystem requested for the image (`fs:` in the action).
///
/// Any tag without a dedicated entry is passed through to a generic
/// `mkfs.<tag> -L <label>` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Filesystem {
    Vfat,
    Btrfs,
    Hfs,
    HfsPlus,
    /// Case-sensitive HFS+. Mounted as `hfsplus`.
    Hfsx,
    /// Leave the device unformatted.
    None,
    Other(String),
}

/// Builds mkfs arguments (without the device) for a label.
type MkfsBuilder = fn(&Filesystem, &str) -> Vec<String>;

/// Tag → command builder. Tags missing here use [`generic_mkfs`].
const MKFS_TABLE: &[(&str, MkfsBuilder)] = &[
    ("vfat", vfat_mkfs),
    ("btrfs", btrfs_mkfs),
    ("hfs", hfs_mkfs),
    ("hfsplus", hfsplus_mkfs),
    ("hfsx", hfsx_mkfs),
];

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn vfat_mkfs(_: &Filesystem, label: &str) -> Vec<String> {
    argv(&["mkfs.vfat", "-F32", "-n", label])
}

fn btrfs_mkfs(_: &Filesystem, label: &str) -> Vec<String> {
    // -f: overwrite a signature left by a previous build
    argv(&["mkfs.btrfs", "-L", label, "-f"])
}

fn hfs_mkfs(_: &Filesystem, label: &str) -> Vec<String> {
    argv(&["mkfs.hfs", "-h", "-v", label])
}

fn hfsplus_mkfs(_: &Filesystem, label: &str) -> Vec<String> {
    argv(&["mkfs.hfsplus", "-v", label])
}

fn hfsx_mkfs(_: &Filesystem, label: &str) -> Vec<String> {
    argv(&["mkfs.hfsplus", "-s", "-v", label])
}

fn generic_mkfs(fs: &Filesystem, label: &str) -> Vec<String> {
    vec![format!("mkfs.{}", fs.as_str()), "-L".to_string(), label.to_string()]
}

impl Filesystem {
    /// Tag as written in the action configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Filesystem::Vfat => "vfat",
            Filesystem::Btrfs => "btrfs",
            Filesystem::Hfs => "hfs",
            Filesystem::HfsPlus => "hfsplus",
            Filesystem::Hfsx => "hfsx",
            Filesystem::None => "none",
            Filesystem::Other(tag) => tag,
        }
    }

    /// The type used after formatting: `hfsx` becomes `hfsplus`, since
    /// it is not a distinct mountable type. Everything else is unchanged.
    pub fn normalized(&self) -> Filesystem {
        match self {
            Filesystem::Hfsx => Filesystem::HfsPlus,
            other => other.clone(),
        }
    }

    /// Type string to pass to mount(2).
    pub fn mount_type(&self) -> &str {
        match self {
            Filesystem::Hfsx => Filesystem::HfsPlus.as_str(),
            other => other.as_str(),
        }
    }

    /// mkfs argv (program first, device not included), `None` for `none`.
    pub fn mkfs_args(&self, label: &str) -> Option<Vec<String>> {
        if *self == Filesystem::None {
            return None;
        }

        let builder = MKFS_TABLE
            .iter()
            .find(|(tag, _)| *tag == self.as_str())
            .map(|(_, builder)| *builder)
            .unwrap_or(generic_mkfs as MkfsBuilder);

        Some(builder(self, label))
    }
}

/// Passthrough tags end up in a program name, so they must not be able to
/// name a path or an option.
fn is_plain_tag(tag: &str) -> bool {
    tag.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphanumeric())
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

impl FromStr for Filesystem {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "vfat" => Filesystem::Vfat,
            "btrfs" => Filesystem::Btrfs,
            "hfs" => Filesystem::Hfs,
            "hfsplus" => Filesystem::HfsPlus,
            "hfsx" => Filesystem::Hfsx,
            "none" => Filesystem::None,
            other if is_plain_tag(other) => Filesystem::Other(other.to_string()),
            other => {
                return Err(ImageError::Config(format!(
                    "invalid filesystem type: {:?}",
                    other
                )));
            }
        })
    }
}

impl TryFrom<String> for Filesystem {
    type Error = ImageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Filesystem> for String {
    fn from(fs: Filesystem) -> Self {
        fs.as_str().to_string()
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
