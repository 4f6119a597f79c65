//! Image lifecycle status and state machine.

use diskforge_shared::{ImageError, ImageResult};
use serde::{Deserialize, Serialize};

/// Where an image-file action is in its lifecycle.
///
/// ```text
/// prepare() → DeviceReady
/// run()     → Formatted → Mounted
/// cleanup() → Unmounted → Released
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageState {
    /// Nothing allocated yet.
    Unprepared,
    /// A block device for the image exists and is recorded in the context.
    DeviceReady,
    /// The device carries the requested filesystem (or was left raw).
    Formatted,
    /// The filesystem is mounted at the context's mount directory.
    Mounted,
    /// Unmounted; the device may still be attached.
    Unmounted,
    /// Cleanup finished. Terminal.
    Released,
}

impl ImageState {
    /// Whether cleanup has to unmount.
    pub fn is_mounted(&self) -> bool {
        matches!(self, ImageState::Mounted)
    }

    pub fn is_released(&self) -> bool {
        matches!(self, ImageState::Released)
    }

    /// Check if transition to target state is valid.
    pub fn can_transition_to(&self, target: ImageState) -> bool {
        use ImageState::*;
        matches!(
            (self, target),
            (Unprepared, DeviceReady) |
            (DeviceReady, Formatted) |
            (Formatted, Mounted) |
            (Mounted, Unmounted) |
            // Cleanup after a run that never mounted (or never ran)
            (Unprepared, Released) |
            (DeviceReady, Released) |
            (Formatted, Released) |
            (Unmounted, Released)
        )
    }

    /// Move to `target`, rejecting transitions the lifecycle does not allow.
    pub fn transition_to(&mut self, target: ImageState) -> ImageResult<()> {
        if !self.can_transition_to(target) {
            return Err(ImageError::InvalidState(format!(
                "Cannot transition from {} to {}",
                self, target
            )));
        }
        tracing::trace!(from = %self, to = %target, "Image state transition");
        *self = target;
        Ok(())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageState::Unprepared => "unprepared",
            ImageState::DeviceReady => "deviceready",
            ImageState::Formatted => "formatted",
            ImageState::Mounted => "mounted",
            ImageState::Unmounted => "unmounted",
            ImageState::Released => "released",
        }
    }
}

impl std::fmt::Display for ImageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = ImageState::Unprepared;
        for next in [
            ImageState::DeviceReady,
            ImageState::Formatted,
            ImageState::Mounted,
            ImageState::Unmounted,
            ImageState::Released,
        ] {
            state.transition_to(next).unwrap();
        }
        assert!(state.is_released());
    }

    #[test]
    fn test_cannot_skip_unmount() {
        let mut state = ImageState::Mounted;
        let err = state.transition_to(ImageState::Released).unwrap_err();
        assert!(err.to_string().contains("mounted"));
        assert_eq!(state, ImageState::Mounted);
    }

    #[test]
    fn test_cannot_mount_unformatted_state() {
        assert!(!ImageState::DeviceReady.can_transition_to(ImageState::Mounted));
        assert!(!ImageState::Unprepared.can_transition_to(ImageState::Formatted));
    }

    #[test]
    fn test_released_is_terminal() {
        for target in [
            ImageState::Unprepared,
            ImageState::DeviceReady,
            ImageState::Mounted,
            ImageState::Released,
        ] {
            assert!(!ImageState::Released.can_transition_to(target));
        }
    }

    #[test]
    fn test_release_without_mount() {
        assert!(ImageState::DeviceReady.can_transition_to(ImageState::Released));
        assert!(ImageState::Formatted.can_transition_to(ImageState::Released));
    }
}
