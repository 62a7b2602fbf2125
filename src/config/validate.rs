// src/config/validate.rs

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::config::model::ConfigFile;

/// Run semantic validation against a loaded pipeline.
///
/// This checks:
/// - there is at least one function
/// - every function has a nonempty `cmd` and at least one output
/// - `scatter >= 1`; `gather_cmd` only appears together with `scatter > 1`
/// - a scattered function with several outputs declares a `gather_cmd`
///   (the default `cat` gather only handles a single output file)
/// - no two functions declare an identical output set
/// - no function lists one of its own outputs as an input
///
/// It does **not** detect cycles across functions; that happens on the
/// built graph, where mapping edges between file sets are visible.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_functions(cfg)?;
    validate_functions(cfg)?;
    validate_output_sets(cfg)?;
    Ok(())
}

fn ensure_has_functions(cfg: &ConfigFile) -> Result<()> {
    if cfg.function.is_empty() {
        return Err(anyhow!(
            "pipeline must contain at least one [function.<name>] section"
        ));
    }
    Ok(())
}

fn validate_functions(cfg: &ConfigFile) -> Result<()> {
    for (name, func) in cfg.function.iter() {
        if func.cmd.trim().is_empty() {
            return Err(anyhow!("function '{}' has an empty `cmd`", name));
        }
        if func.outputs.is_empty() {
            return Err(anyhow!("function '{}' declares no outputs", name));
        }

        let scatter = func.effective_scatter();
        if scatter == 0 {
            return Err(anyhow!("function '{}' has `scatter = 0` (must be >= 1)", name));
        }
        if func.gather_cmd.is_some() && scatter <= 1 {
            return Err(anyhow!(
                "function '{}' sets `gather_cmd` but is not scattered (`scatter` <= 1)",
                name
            ));
        }
        if scatter > 1 && func.outputs.len() > 1 && func.gather_cmd.is_none() {
            return Err(anyhow!(
                "function '{}' scatters {} outputs; declare a `gather_cmd` \
                 (the default gather only concatenates a single output)",
                name,
                func.outputs.len()
            ));
        }

        let outputs: BTreeSet<&PathBuf> = func.outputs.iter().collect();
        for input in func.inputs.iter() {
            if outputs.contains(input) {
                return Err(anyhow!(
                    "function '{}' lists {:?} as both an input and an output",
                    name,
                    input
                ));
            }
        }
    }
    Ok(())
}

fn validate_output_sets(cfg: &ConfigFile) -> Result<()> {
    let mut seen: HashMap<BTreeSet<PathBuf>, &str> = HashMap::new();

    for (name, func) in cfg.function.iter() {
        let outputs: BTreeSet<PathBuf> = func.outputs.iter().cloned().collect();
        if let Some(other) = seen.insert(outputs, name) {
            return Err(anyhow!(
                "functions '{}' and '{}' declare the same output set",
                other,
                name
            ));
        }
    }
    Ok(())
}
