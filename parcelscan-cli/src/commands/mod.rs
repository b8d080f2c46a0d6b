//! `parcelscan` subcommands

pub mod classify;
pub mod config;
pub mod simulate;

use anyhow::{Context, Result};
use std::fs;
use std::io::{self, Read};

/// Read a whole file, or stdin when `path` is `-`
pub(crate) fn read_input(path: &str) -> Result<String> {
    if path == "-" {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed to read input file: {}", path))
    }
}
