pub mod export;
pub mod init;
pub mod run;
pub mod validate;

use anyhow::Result;

/// Split a `--format` value into its parts, expanding `all`.
pub(crate) fn parse_formats<'a>(format: &'a str, all: &[&'a str]) -> Vec<&'a str> {
    if format.trim() == "all" {
        all.to_vec()
    } else {
        format
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Reject formats this command cannot write.
pub(crate) fn ensure_known_formats(formats: &[&str], known: &[&str]) -> Result<()> {
    anyhow::ensure!(!formats.is_empty(), "at least one output format is required");
    for fmt in formats {
        anyhow::ensure!(
            known.contains(fmt),
            "unknown output format '{fmt}' (expected one of: {}, all)",
            known.join(", ")
        );
    }
    Ok(())
}
