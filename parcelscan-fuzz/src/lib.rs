//! Fuzzing entry points for parcelscan-core
//!
//! To use with cargo-fuzz:
//! 1. Install cargo-fuzz: cargo install cargo-fuzz
//! 2. Call these from fuzz targets, e.g. `cargo fuzz run fuzz_classify`

use parcelscan_core::carrier::{detect, normalize};
use parcelscan_core::debounce::CandidateDebouncer;

pub fn fuzz_classify(data: &[u8]) {
    let text = String::from_utf8_lossy(data);

    // Should never panic, and must agree with itself on the normalized form
    let first = detect(&text);
    let second = detect(&normalize(&text));
    assert_eq!(first.carrier.code, second.carrier.code);
}

/// First byte picks the threshold; the rest is split into readings on `\n`
pub fn fuzz_debounce(data: &[u8]) {
    let Some((&threshold, rest)) = data.split_first() else {
        return;
    };
    let threshold = u32::from(threshold % 8);
    let mut debouncer = CandidateDebouncer::new(threshold);

    for reading in String::from_utf8_lossy(rest).split('\n') {
        if let Some(accepted) = debouncer.push(reading) {
            assert_eq!(accepted, reading.trim());
            assert_eq!(debouncer.state().consecutive_hits, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fuzz_classify_empty() {
        fuzz_classify(&[]);
    }

    #[test]
    fn test_fuzz_classify_random() {
        fuzz_classify(&[0x31, 0x5A, 0xFF, 0x00, 0xC3, 0x28]);
        fuzz_classify("1z 999 aa1 0123 456 784".as_bytes());
    }

    #[test]
    fn test_fuzz_debounce_empty() {
        fuzz_debounce(&[]);
        fuzz_debounce(&[0]);
    }

    #[test]
    fn test_fuzz_debounce_random() {
        fuzz_debounce(b"\x02A\nA\n\nB\n B \nB");
        fuzz_debounce(&[0xFF; 1024]);
    }
}
