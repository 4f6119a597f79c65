use clap::{Args, Parser, Subcommand};

use crate::commands::{create::CreateArgs, plan::PlanArgs, size::SizeArgs};

#[derive(Parser, Debug)]
#[command(name = "diskforge", author, version, about = "Create, format and mount disk image files")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create, format and mount an image file, then unmount and release it
    Create(CreateArgs),

    /// Show what an image-file action would do without touching the system
    Plan(PlanArgs),

    /// Convert a human-readable size into bytes
    Size(SizeArgs),
}
