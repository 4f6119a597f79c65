use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use diskforge::{HostOps, ImageContext, ImageFileAction, ImageResult, ImageSpec, Preparation};

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// YAML file holding the image-file action
    pub action: PathBuf,

    /// Scratch directory; the image is mounted under <dir>/mnt
    #[arg(long, env = "DISKFORGE_SCRATCH_DIR")]
    pub scratch_dir: PathBuf,

    /// Use an existing block device instead of creating the image file
    #[arg(long, value_name = "DEVICE")]
    pub internal_image: Option<PathBuf>,
}

pub fn execute(args: CreateArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let spec = ImageSpec::from_file(&args.action)?;
    std::fs::create_dir_all(&args.scratch_dir).with_context(|| {
        format!(
            "failed to create scratch dir {}",
            args.scratch_dir.display()
        )
    })?;

    let mut ctx = ImageContext::new(&args.scratch_dir);
    let mut action = ImageFileAction::new(spec, HostOps::default())?;

    match args.internal_image {
        Some(device) => action.adopt_device(device, &mut ctx)?,
        None => action.prepare(Preparation::Direct, &mut ctx)?,
    }

    // Release the device even when formatting or mounting failed.
    let run_result = action.run(&mut ctx);
    let mount_dir = ctx.image_mnt_dir().map(PathBuf::from);
    let cleanup_result = action.cleanup(&mut ctx);

    combine_results(run_result, cleanup_result)?;

    println!("{}", action.spec().image_name().display());
    if let Some(dir) = mount_dir {
        tracing::info!(mount_dir = %dir.display(), fs = %action.filesystem(), "Image complete");
    }
    Ok(())
}

/// Merge the run and cleanup outcomes so neither error is lost.
fn combine_results(run: ImageResult<()>, cleanup: ImageResult<()>) -> anyhow::Result<()> {
    match (run, cleanup) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(run_err), Ok(())) => Err(run_err.into()),
        (Ok(()), Err(cleanup_err)) if cleanup_err.is_cleanup() => {
            Err(cleanup_err).context("image may be incomplete")
        }
        (Ok(()), Err(cleanup_err)) => Err(cleanup_err.into()),
        (Err(run_err), Err(cleanup_err)) => Err(anyhow::Error::from(run_err).context(format!(
            "cleanup also failed, image may be incomplete: {}",
            cleanup_err
        ))),
    }
}
