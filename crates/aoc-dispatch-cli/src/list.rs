//! List and resolve commands.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use aoc_dispatch_core::{DispatchConfig, DylibLoader, Part, SolverKey};

use crate::colors;

/// Years scanned when none is given.
pub const YEARS: RangeInclusive<u16> = 2015..=2025;

/// Print every solver module found in the modules directory.
pub fn execute(config: &DispatchConfig, year: Option<u16>) -> anyhow::Result<()> {
    let loader = DylibLoader::new(&config.modules_dir);
    let years = match year {
        Some(year) => year..=year,
        None => YEARS,
    };

    let keys = loader.available(years);
    if keys.is_empty() {
        println!(
            "{}No solver modules found in {}{}",
            colors::YELLOW,
            config.modules_dir.display(),
            colors::RESET
        );
        return Ok(());
    }

    let mut by_day: BTreeMap<(u16, u8), Vec<Part>> = BTreeMap::new();
    for key in &keys {
        by_day.entry((key.year, key.day)).or_default().push(key.part);
    }

    let mut current_year = None;
    for ((year, day), parts) in by_day {
        if current_year != Some(year) {
            println!("\n{}{}{}", colors::BOLD, year, colors::RESET);
            current_year = Some(year);
        }
        let parts: Vec<String> = parts.iter().map(|part| part.to_string()).collect();
        println!(
            "  day {:>2}  {}parts {}{}",
            day,
            colors::DIM,
            parts.join(", "),
            colors::RESET
        );
    }
    println!("\n{} modules", keys.len());

    Ok(())
}

/// Print where the module for `key` is expected.
pub fn resolve(config: &DispatchConfig, key: SolverKey) -> anyhow::Result<()> {
    let loader = DylibLoader::new(&config.modules_dir);
    let path = loader.artifact_path(&key);
    let marker = if path.exists() {
        format!("{}present{}", colors::GREEN, colors::RESET)
    } else {
        format!("{}missing{}", colors::YELLOW, colors::RESET)
    };
    println!("{}  {}  {}", key.artifact_name(), path.display(), marker);
    Ok(())
}
