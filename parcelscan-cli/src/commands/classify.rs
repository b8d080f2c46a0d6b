use super::read_input;
use anyhow::{bail, Context, Result};
use colored::*;
use parcelscan_core::carrier::{detect, CarrierMatch};
use tracing::info;

/// Codes from the command line followed by non-blank lines of `input`
pub fn collect_codes(codes: &[String], input: Option<&str>) -> Result<Vec<String>> {
    let mut all: Vec<String> = codes
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    if let Some(path) = input {
        let text = read_input(path)?;
        all.extend(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }

    Ok(all)
}

/// Classify every code
pub fn classify_all(codes: &[String]) -> Vec<CarrierMatch> {
    codes.iter().map(|code| detect(code)).collect()
}

pub fn execute(codes: &[String], input: Option<&str>, json: bool) -> Result<()> {
    let codes = collect_codes(codes, input)?;
    if codes.is_empty() {
        bail!("No tracking codes given");
    }

    info!("Classifying {} tracking codes", codes.len());
    let matches = classify_all(&codes);

    if json {
        let out = serde_json::to_string_pretty(&matches)
            .with_context(|| "Failed to serialize classification results")?;
        println!("{}", out);
        return Ok(());
    }

    for m in &matches {
        let (r, g, b) = m.carrier.rgb();
        let carrier = format!("{} {}", m.carrier.icon(), m.carrier.name);
        let marker = if m.carrier.is_unknown() {
            "?".yellow()
        } else {
            "✓".green()
        };
        println!(
            "{} {:<24} {}",
            marker,
            m.tracking_code,
            carrier.truecolor(r, g, b).bold()
        );
        if let Some(url) = &m.track_url {
            println!("  {}", url.dimmed());
        }
    }

    let unknown = matches.iter().filter(|m| m.carrier.is_unknown()).count();
    println!(
        "\n{} classified, {} unknown",
        matches.len() - unknown,
        unknown
    );

    Ok(())
}
