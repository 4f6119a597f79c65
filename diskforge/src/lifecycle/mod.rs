//! Image-file action lifecycle.
//!
//! One of two preparation paths produces a block device, the run phase
//! formats and mounts it, and cleanup unmounts and releases it:
//!
//! ```text
//! Direct:    size → allocate → loop attach ─┐
//!                                           ├→ lock → mkfs → mount ─→ unmount → release
//! Delegated: size → delegate.create_image ──┘
//! ```

mod action;
mod context;
mod state;

use std::sync::Arc;

use crate::delegate::ImageDelegate;
use crate::format::{CommandRunner, HostCommandRunner};
use crate::loopdev::{KernelLoopBackend, LoopBackend, RetryPolicy};
use crate::mount::{Mounter, SysMounter};

pub use action::ImageFileAction;
pub use context::ImageContext;
pub use state::ImageState;

/// OS-facing collaborators of an action.
#[derive(Clone)]
pub struct HostOps {
    pub loops: Arc<dyn LoopBackend>,
    pub mounter: Arc<dyn Mounter>,
    pub runner: Arc<dyn CommandRunner>,
    /// Policy for loop device removal.
    pub retry: RetryPolicy,
}

impl Default for HostOps {
    fn default() -> Self {
        Self {
            loops: Arc::new(KernelLoopBackend::new()),
            mounter: Arc::new(SysMounter),
            runner: Arc::new(HostCommandRunner),
            retry: RetryPolicy::default(),
        }
    }
}

/// How the block device is obtained. Chosen once, before preparation.
pub enum Preparation<'a> {
    /// Allocate the file and attach it to a loop device owned by the action.
    Direct,
    /// Let a delegate create the device. `args` is the command line of the
    /// sandboxed run and receives `--internal-image <device>`.
    Delegated {
        delegate: &'a mut dyn ImageDelegate,
        args: &'a mut Vec<String>,
    },
}
