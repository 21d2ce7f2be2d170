/*! Element tables with natural isotopic abundances.

An element table is plain text, one element per line:

```text
# symbol  mass:abundance  mass:abundance ...
C   12.0000000000:0.9893   13.0033548378:0.0107
```

Isotopes are ordered by mass, with the lightest isotope taken as the monoisotopic
reference. The nominal offset of every other isotope is its rounded mass difference
from that reference, which is the index it contributes to in an isotopic distribution.
*/
use std::collections::btree_map::{self, BTreeMap};
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

/// The tolerance allowed on the sum of an element's isotopic abundances
const ABUNDANCE_SUM_TOLERANCE: f64 = 0.01;

/// An error that may occur while reading an element table or a chemical formula
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Line {line}: malformed element symbol {symbol:?}")]
    InvalidSymbol { line: usize, symbol: String },
    #[error("Line {line}: malformed isotope entry {entry:?}, expected `mass:abundance`")]
    InvalidIsotope { line: usize, entry: String },
    #[error("Line {line}: element {symbol} lists no isotopes")]
    NoIsotopes { line: usize, symbol: String },
    #[error("Line {line}: isotope abundances of {symbol} sum to {total}")]
    AbundanceSum {
        line: usize,
        symbol: String,
        total: f64,
    },
    #[error("Line {line}: element {symbol} is defined more than once")]
    DuplicateElement { line: usize, symbol: String },
    #[error("Malformed chemical formula {formula:?} at offset {offset}")]
    InvalidFormula { formula: String, offset: usize },
    #[error("Element {0:?} is not present in the element table")]
    UnknownElement(String),
    #[error("The count of {symbol} in formula {formula:?} overflows")]
    CountOverflow { formula: String, symbol: String },
    #[error("Formula {formula} has a negative count for {symbol}")]
    NegativeCount { formula: String, symbol: String },
}

/// A single natural isotope of an element
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Isotope {
    /// The exact mass of the isotope
    pub mass: f64,
    /// The natural fractional abundance of the isotope
    pub abundance: f64,
    /// The nominal mass offset from the element's lightest isotope
    pub nominal_offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element {
    pub symbol: String,
    /// Isotopes sorted by mass, the first being the monoisotopic reference
    pub isotopes: Vec<Isotope>,
}

impl Element {
    fn new(symbol: String, mut pairs: Vec<(f64, f64)>) -> Self {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        let lightest = pairs.first().map(|p| p.0).unwrap_or_default();
        let isotopes = pairs
            .into_iter()
            .map(|(mass, abundance)| Isotope {
                mass,
                abundance,
                nominal_offset: (mass - lightest).round() as usize,
            })
            .collect();
        Self { symbol, isotopes }
    }

    pub fn monoisotopic_mass(&self) -> f64 {
        self.isotopes.first().map(|i| i.mass).unwrap_or_default()
    }

    /// The per-atom probability of each nominal isotope offset, truncated to `max_offset`
    pub fn probability_vector(&self, max_offset: usize) -> Vec<f64> {
        let width = self
            .isotopes
            .iter()
            .map(|i| i.nominal_offset)
            .max()
            .unwrap_or_default()
            .min(max_offset);
        let mut probabilities = vec![0.0; width + 1];
        for iso in self.isotopes.iter() {
            if iso.nominal_offset <= width {
                probabilities[iso.nominal_offset] += iso.abundance;
            }
        }
        probabilities
    }
}

/// Elemental isotope data keyed by element symbol
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementTable {
    elements: BTreeMap<String, Element>,
}

/// IUPAC natural isotopic compositions for the elements found in common lipid ions
pub const DEFAULT_ELEMENT_TABLE: &str = "\
# symbol  mass:abundance ...
H   1.00782503207:0.999885  2.0141017778:0.000115
C   12.0000000000:0.9893    13.0033548378:0.0107
N   14.0030740048:0.99636   15.0001088982:0.00364
O   15.99491461956:0.99757  16.99913170:0.00038  17.9991610:0.00205
P   30.97376163:1.0
S   31.97207100:0.9499      32.97145876:0.0075   33.96786690:0.0425   35.96708076:0.0001
Na  22.9897692809:1.0
K   38.96370668:0.932581    39.96399848:0.000117 40.96182576:0.067302
Li  6.015122795:0.0759      7.01600455:0.9241
Cl  34.96885268:0.7576      36.96590259:0.2424
";

fn is_valid_symbol(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_lowercase()),
        _ => false,
    }
}

impl ElementTable {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut elements = BTreeMap::new();
        for (i, raw) in text.lines().enumerate() {
            let line = i + 1;
            let content = raw.split('#').next().unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }
            let mut tokens = content.split_whitespace();
            let symbol = tokens.next().unwrap_or_default();
            if !is_valid_symbol(symbol) {
                return Err(ParseError::InvalidSymbol {
                    line,
                    symbol: symbol.to_string(),
                });
            }
            let mut pairs = Vec::new();
            for entry in tokens {
                let invalid = || ParseError::InvalidIsotope {
                    line,
                    entry: entry.to_string(),
                };
                let (mass, abundance) = entry.split_once(':').ok_or_else(invalid)?;
                let mass: f64 = mass.parse().map_err(|_| invalid())?;
                let abundance: f64 = abundance.parse().map_err(|_| invalid())?;
                if mass <= 0.0 || !(0.0..=1.0).contains(&abundance) {
                    return Err(invalid());
                }
                pairs.push((mass, abundance));
            }
            if pairs.is_empty() {
                return Err(ParseError::NoIsotopes {
                    line,
                    symbol: symbol.to_string(),
                });
            }
            let total: f64 = pairs.iter().map(|p| p.1).sum();
            if (total - 1.0).abs() > ABUNDANCE_SUM_TOLERANCE {
                return Err(ParseError::AbundanceSum {
                    line,
                    symbol: symbol.to_string(),
                    total,
                });
            }
            if elements.contains_key(symbol) {
                return Err(ParseError::DuplicateElement {
                    line,
                    symbol: symbol.to_string(),
                });
            }
            elements.insert(symbol.to_string(), Element::new(symbol.to_string(), pairs));
        }
        Ok(Self { elements })
    }

    pub fn get(&self, symbol: &str) -> Option<&Element> {
        self.elements.get(symbol)
    }

    /// Look up an element, failing with [`ParseError::UnknownElement`] if it is absent
    pub fn require(&self, symbol: &str) -> Result<&Element, ParseError> {
        self.get(symbol)
            .ok_or_else(|| ParseError::UnknownElement(symbol.to_string()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.elements.contains_key(symbol)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Element> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl FromStr for ElementTable {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for ElementTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (symbol, element) in self.iter() {
            write!(f, "{symbol}")?;
            for iso in element.isotopes.iter() {
                write!(f, " {}:{}", iso.mass, iso.abundance)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
