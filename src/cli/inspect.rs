// src/cli/inspect.rs — `inspect`: debug a saved API response

use anyhow::Context;
use std::path::Path;

use crate::slots::normalize::{describe_shape, MissingFieldPolicy, ResponseNormalizer};

pub fn run_inspect(file: &Path, listing_id: &str, policy: MissingFieldPolicy) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let payload: serde_json::Value = if content.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&content).with_context(|| format!("parsing {}", file.display()))?
    };

    print!("{}", describe_shape(&payload));
    println!();

    let normalized = ResponseNormalizer::new(policy).normalize_detailed(listing_id, &payload)?;
    println!("{} slot(s):", normalized.records.len());
    for r in &normalized.records {
        let party = r.party_size.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        let price = r.price.map(|p| p.to_string()).unwrap_or_else(|| "-".into());
        println!("  {} {}  seats={party}  price={price}", r.date_str(), r.time_str());
    }
    if !normalized.skipped.is_empty() {
        println!("{} object(s) skipped:", normalized.skipped.len());
        for e in &normalized.skipped {
            println!("  {e}");
        }
    }
    Ok(())
}
