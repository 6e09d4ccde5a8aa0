//! Diagram Prompt Builder
//!
//! Turns a diagram type and a fraction into the exact text sent to the image
//! model. The output is a pure function of its inputs.

use crate::fraction::FractionParameters;
use serde::{Deserialize, Serialize};
use std::fmt;

const STYLE_PREAMBLE: &str = "Clean educational diagram, white background.";
const STYLE_SUFFIX: &str = "Minimal style, high contrast.";

/// The two supported renderings of a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramType {
    #[default]
    NumberLine,
    AreaModel,
}

impl DiagramType {
    /// Parses a classifier label. Anything other than `areamodel` draws a number line.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        if normalized == "areamodel" {
            DiagramType::AreaModel
        } else {
            DiagramType::NumberLine
        }
    }
}

impl fmt::Display for DiagramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagramType::NumberLine => f.write_str("numberline"),
            DiagramType::AreaModel => f.write_str("areamodel"),
        }
    }
}

pub fn build_diagram_prompt(diagram: DiagramType, fraction: FractionParameters) -> String {
    let n = fraction.numerator();
    let d = fraction.denominator();
    match diagram {
        DiagramType::AreaModel => format!(
            "{STYLE_PREAMBLE} A rectangle representing 1 whole divided into {d} equal parts. \
             Shade {n} parts to represent {n}/{d}. Label \"{n}/{d}\". {STYLE_SUFFIX}"
        ),
        DiagramType::NumberLine => format!(
            "{STYLE_PREAMBLE} A number line from 0 to 1 divided into {d} equal intervals. \
             Highlight {n}/{d} with a segment from 0 to {n}/{d} and label \"{n}/{d}\". {STYLE_SUFFIX}"
        ),
    }
}
