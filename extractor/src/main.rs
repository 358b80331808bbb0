use std::path::PathBuf;

use anyhow::{Context, Result};
use bunpack_core::{HostImage, ModuleMatcher};
use clap::Parser;

/// Extract one embedded module's contents from a standalone executable.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the standalone executable.
    executable: PathBuf,

    /// Where to write the extracted module contents.
    #[arg(default_value = "/tmp/native-cli.js")]
    output: PathBuf,

    /// Base name of the embedded module to extract; matched exactly or as a
    /// path suffix, with or without a `.exe` extension.
    #[arg(long, default_value = "claude")]
    module: String,
}

/// Help and version requests exit 0; every parse failure prints the usage
/// text and exits 1.
fn exit_code(err: &clap::Error) -> i32 {
    if err.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        std::process::exit(exit_code(&err));
    });

    println!("extracting from: {}", args.executable.display());
    let image = HostImage::load(&args.executable)
        .with_context(|| format!("failed to load {}", args.executable.display()))?;
    log::debug!("host wrapper: {:?}", image.kind());

    let matcher = ModuleMatcher::new(&args.module);
    let contents = image.extract(&matcher)?;
    std::fs::write(&args.output, &contents)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "extracted to: {} ({} bytes)",
        args.output.display(),
        contents.len()
    );
    Ok(())
}
