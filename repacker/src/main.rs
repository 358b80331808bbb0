use std::path::PathBuf;

use anyhow::{Context, Result};
use bunpack_core::{HostImage, ModuleMatcher};
use clap::Parser;

/// Replace one embedded module's contents inside a standalone executable.
///
/// The rest of the container (every other module, string and metadata field)
/// is preserved; only offsets are renumbered.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the standalone executable to patch.
    executable: PathBuf,

    /// File holding the replacement module contents.
    new_contents: PathBuf,

    /// Where to write the patched executable.
    output: PathBuf,

    /// Base name of the embedded module to replace; matched exactly or as a
    /// path suffix, with or without a `.exe` extension.
    #[arg(long, default_value = "claude")]
    module: String,
}

/// Help and version requests exit 0; every parse failure (missing positional,
/// unknown flag) prints the usage text and exits 1.
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

    let image = HostImage::load(&args.executable)
        .with_context(|| format!("failed to load {}", args.executable.display()))?;
    println!("host wrapper: {:?}", image.kind());

    let new_contents = std::fs::read(&args.new_contents)
        .with_context(|| format!("failed to read {}", args.new_contents.display()))?;
    println!("replacement contents: {} bytes", new_contents.len());

    let matcher = ModuleMatcher::new(&args.module);
    let container_len = image
        .repack(&matcher, &new_contents, &args.output)
        .with_context(|| format!("failed to repack {}", args.executable.display()))?;
    println!("new container: {container_len} bytes");
    println!("written to: {}", args.output.display());
    Ok(())
}
