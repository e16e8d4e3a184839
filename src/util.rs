use std::path::PathBuf;
use std::process::Command;

use crate::error::CorralError;

/// Print and run an external command, echoing it first so the user can
/// replay it by hand. Dry-run mode only prints. A non-zero exit is fatal;
/// the surrounding operation cannot continue half-done.
pub fn execute(cmd: &[String], dry_run: bool) -> Result<(), CorralError> {
    let Some((program, args)) = cmd.split_first() else {
        return Ok(());
    };

    println!("{}", cmd.join(" "));
    if dry_run {
        return Ok(());
    }

    tracing::debug!(command = %cmd.join(" "), "running external command");
    let status = Command::new(program)
        .args(args)
        .status()
        .map_err(|source| CorralError::CommandSpawn {
            command: program.clone(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CorralError::CommandFailed {
            command: program.clone(),
            code: status.code().unwrap_or(-1),
        })
    }
}

/// Scratch directory for generated seed files: the user runtime dir when
/// available, the system temp dir otherwise.
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir().unwrap_or_else(std::env::temp_dir)
}
