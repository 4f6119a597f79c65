use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};
use diskforge::ImageSpec;
use diskforge::format::format_command;
use diskforge::size::format_human_size;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// YAML file holding the image-file action
    pub action: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = PlanFormat::Text)]
    pub format: PlanFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlanFormat {
    Text,
    Json,
}

/// Device path shown in the mkfs command line.
const DEVICE_PLACEHOLDER: &str = "<device>";

#[derive(Serialize, Debug)]
struct Plan {
    image: PathBuf,
    size_bytes: u64,
    size: String,
    filesystem: String,
    label: String,
    mkfs: Option<Vec<String>>,
    mount_type: String,
}

impl Plan {
    fn from_spec(spec: &ImageSpec) -> anyhow::Result<Self> {
        let size_bytes = spec.validate()?;
        let fs = spec.fs();
        let mkfs = format_command(fs, spec.fs_name(), Path::new(DEVICE_PLACEHOLDER)).map(|argv| {
            argv.iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect()
        });

        Ok(Self {
            image: spec.image_name().to_path_buf(),
            size_bytes,
            size: format_human_size(size_bytes),
            filesystem: fs.to_string(),
            label: spec.fs_name().to_string(),
            mkfs,
            mount_type: fs.normalized().mount_type().to_string(),
        })
    }

    fn print_text(&self) {
        println!("image:      {}", self.image.display());
        println!("size:       {} ({} bytes)", self.size, self.size_bytes);
        println!("filesystem: {}", self.filesystem);
        println!("label:      {}", self.label);
        match &self.mkfs {
            Some(argv) => println!("mkfs:       {}", argv.join(" ")),
            None => println!("mkfs:       (none)"),
        }
        println!("mount type: {}", self.mount_type);
    }
}

pub fn execute(args: PlanArgs, _global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let spec = ImageSpec::from_file(&args.action)?;
    let plan = Plan::from_spec(&spec)?;

    match args.format {
        PlanFormat::Text => plan.print_text(),
        PlanFormat::Json => println!("{}", serde_json::to_string_pretty(&plan)?),
    }
    Ok(())
}
