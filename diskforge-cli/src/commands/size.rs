use clap::Args;

#[derive(Args, Debug)]
pub struct SizeArgs {
    /// Size such as 512MB, 1GiB or 4096
    pub size: String,
}

pub fn execute(args: SizeArgs) -> anyhow::Result<()> {
    let bytes = diskforge::parse_human_size(&args.size)?;
    println!("{}", bytes);
    Ok(())
}
