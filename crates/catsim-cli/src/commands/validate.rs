//! The `catsim validate` command.

use std::path::PathBuf;

use anyhow::Result;

use catsim_core::parser::{load_config, validate_config};

pub fn execute(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path)?;

    println!(
        "Config: {} ({} items, {} examinees x {} replications, {}, {})",
        config_path.display(),
        config.pool.len(),
        config.abilities.len(),
        config.replications,
        config.method.to_string().to_uppercase(),
        config.stopping_rule,
    );

    let warnings = validate_config(&config);
    for w in &warnings {
        println!("  WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Config valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
