//! Ad-hoc re-signing of a rewritten Mach-O via the platform `codesign` tool.

use std::path::Path;
use std::process::Command;

/// Best effort: a missing or failing `codesign` leaves the output usable on
/// platforms that do not enforce signatures, so this only ever warns.
pub(super) fn resign(path: &Path) {
    let status = Command::new("codesign")
        .args(["-s", "-", "-f"])
        .arg(path)
        .status();
    match status {
        Ok(status) if status.success() => log::info!("code signed {}", path.display()),
        Ok(status) => log::warn!(
            "codesign exited with {status}; {} may not run on signature-enforcing systems",
            path.display()
        ),
        Err(err) => log::warn!(
            "codesign could not be invoked ({err}); {} may not run on signature-enforcing systems",
            path.display()
        ),
    }
}
