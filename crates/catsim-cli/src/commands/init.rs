//! The `catsim init` command.

use anyhow::{Context, Result};

pub fn execute() -> Result<()> {
    let path = std::path::Path::new("catsim.toml");
    if path.exists() {
        println!("catsim.toml already exists, skipping.");
    } else {
        std::fs::write(path, SAMPLE_CONFIG).context("failed to write catsim.toml")?;
        println!("Created catsim.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit catsim.toml with your item pool and examinees");
    println!("  2. Run: catsim validate --config catsim.toml");
    println!("  3. Run: catsim run --config catsim.toml --format all");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# catsim configuration

[simulation]
method = "mle"            # or "wle"
seed = 42                 # omit for a random seed (recorded in the report)
replications = 1
parallelism = 4
# time_budget_secs = 60

[stopping]
rule = "fixed-length"     # or "target-sem"
length = 7
# target = 0.3            # for target-sem

[examinees]
abilities = [0.7]
# list = "0.7, -1.2, 1.5"

[pool]
difficulties = "-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5"

# Items with their own discrimination can be listed explicitly:
# [[pool.items]]
# id = 11
# difficulty = 0.25
# discrimination = 1.6
"#;
