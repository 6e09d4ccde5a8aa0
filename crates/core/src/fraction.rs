//! Fraction Extraction
//!
//! Finds the first `numerator/denominator` pair written in free text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static FRACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\s*/\s*([0-9]+)").expect("fraction pattern is a valid regex")
});

/// A fraction that can be drawn: the denominator is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FractionParameters {
    numerator: u32,
    denominator: u32,
}

impl FractionParameters {
    /// Returns `None` when the denominator is zero. A zero numerator is allowed.
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        (denominator > 0).then_some(Self {
            numerator,
            denominator,
        })
    }

    /// Accepts classifier output, where values arrive as signed JSON integers.
    pub fn from_signed(numerator: i64, denominator: i64) -> Option<Self> {
        let numerator = u32::try_from(numerator).ok()?;
        let denominator = u32::try_from(denominator).ok()?;
        Self::new(numerator, denominator)
    }

    pub fn numerator(&self) -> u32 {
        self.numerator
    }

    pub fn denominator(&self) -> u32 {
        self.denominator
    }
}

impl fmt::Display for FractionParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Parses the first `digits / digits` occurrence in `text`.
///
/// Only the first occurrence is considered: if it has a zero denominator or a
/// number that does not fit, the result is `None` even when a later
/// occurrence would be valid.
pub fn extract_fraction(text: &str) -> Option<FractionParameters> {
    let captures = FRACTION_PATTERN.captures(text)?;
    let numerator = captures[1].parse::<u32>().ok()?;
    let denominator = captures[2].parse::<u32>().ok()?;
    FractionParameters::new(numerator, denominator)
}
