/*! Integer elemental compositions */
use std::collections::btree_map::{self, BTreeMap};
use std::fmt::Display;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

use nom::combinator::all_consuming;

use crate::elements::{ElementTable, ParseError};
use crate::parsers::{chemical_formula, error_offset};

/// A mapping from element symbol to a signed atom count.
///
/// Zero counts are never stored, so two formulas with the same composition always
/// compare equal. Negative counts are representable so that formula arithmetic
/// can express losses, but [`ChemicalFormula::is_valid`] rejects them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChemicalFormula {
    counts: BTreeMap<String, i32>,
}

impl ChemicalFormula {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> i32 {
        self.counts.get(symbol).copied().unwrap_or_default()
    }

    pub fn set(&mut self, symbol: &str, count: i32) {
        if count == 0 {
            self.counts.remove(symbol);
        } else {
            self.counts.insert(symbol.to_string(), count);
        }
    }

    /// Add `count` atoms of `symbol`, which may be negative. The total saturates at the
    /// bounds of `i32`.
    pub fn increment(&mut self, symbol: &str, count: i32) {
        let total = self.get(symbol).saturating_add(count);
        self.set(symbol, total);
    }

    /// As [`ChemicalFormula::increment`], returning `None` and leaving the formula unchanged
    /// if the total would overflow
    pub fn checked_increment(&mut self, symbol: &str, count: i32) -> Option<i32> {
        let total = self.get(symbol).checked_add(count)?;
        self.set(symbol, total);
        Some(total)
    }

    /// Accumulate parsed `(symbol, count)` pairs from `text`
    pub(crate) fn from_atomic_offsets(text: &str, offsets: &[(&str, i32)]) -> Result<Self, ParseError> {
        let mut formula = Self::new();
        for (symbol, count) in offsets {
            formula
                .checked_increment(symbol, *count)
                .ok_or_else(|| ParseError::CountOverflow {
                    formula: text.to_string(),
                    symbol: symbol.to_string(),
                })?;
        }
        Ok(formula)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, i32> {
        self.counts.iter()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `true` if no element has a negative count
    pub fn is_valid(&self) -> bool {
        self.counts.values().all(|c| *c >= 0)
    }

    /// Fail with [`ParseError::NegativeCount`] naming the first element with a negative count
    pub fn validate(&self) -> Result<(), ParseError> {
        match self.counts.iter().find(|(_, c)| **c < 0) {
            Some((symbol, _)) => Err(ParseError::NegativeCount {
                formula: self.to_string(),
                symbol: symbol.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The monoisotopic mass, the sum of each element's lightest isotope mass times its count
    pub fn mass(&self, table: &ElementTable) -> Result<f64, ParseError> {
        let mut total = 0.0;
        for (symbol, count) in self.iter() {
            total += table.require(symbol)?.monoisotopic_mass() * (*count as f64);
        }
        Ok(total)
    }

    /// Symbols in Hill order, carbon then hydrogen then the rest alphabetically when carbon
    /// is present, otherwise purely alphabetical.
    fn hill_order(&self) -> Vec<(&str, i32)> {
        let mut entries: Vec<(&str, i32)> =
            self.counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        if self.counts.contains_key("C") {
            entries.sort_by_key(|(symbol, _)| match *symbol {
                "C" => (0, *symbol),
                "H" => (1, *symbol),
                _ => (2, *symbol),
            });
        }
        entries
    }
}

impl Display for ChemicalFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (symbol, count) in self.hill_order() {
            if count == 1 {
                write!(f, "{symbol}")?;
            } else {
                write!(f, "{symbol}{count}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for ChemicalFormula {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, offsets) =
            all_consuming(chemical_formula)(s).map_err(|e| ParseError::InvalidFormula {
                formula: s.to_string(),
                offset: error_offset(s, &e),
            })?;
        Self::from_atomic_offsets(s, &offsets)
    }
}

impl TryFrom<&str> for ChemicalFormula {
    type Error = ParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<'a> FromIterator<(&'a str, i32)> for ChemicalFormula {
    fn from_iter<T: IntoIterator<Item = (&'a str, i32)>>(iter: T) -> Self {
        let mut this = Self::new();
        for (symbol, count) in iter {
            this.increment(symbol, count);
        }
        this
    }
}

impl AddAssign<&ChemicalFormula> for ChemicalFormula {
    fn add_assign(&mut self, rhs: &ChemicalFormula) {
        for (symbol, count) in rhs.iter() {
            self.increment(symbol, *count);
        }
    }
}

impl SubAssign<&ChemicalFormula> for ChemicalFormula {
    fn sub_assign(&mut self, rhs: &ChemicalFormula) {
        for (symbol, count) in rhs.iter() {
            self.increment(symbol, -*count);
        }
    }
}

impl Add<&ChemicalFormula> for &ChemicalFormula {
    type Output = ChemicalFormula;

    fn add(self, rhs: &ChemicalFormula) -> Self::Output {
        let mut out = self.clone();
        out += rhs;
        out
    }
}

impl Add for ChemicalFormula {
    type Output = ChemicalFormula;

    fn add(mut self, rhs: ChemicalFormula) -> Self::Output {
        self += &rhs;
        self
    }
}

impl Sub<&ChemicalFormula> for &ChemicalFormula {
    type Output = ChemicalFormula;

    fn sub(self, rhs: &ChemicalFormula) -> Self::Output {
        let mut out = self.clone();
        out -= rhs;
        out
    }
}

impl Sub for ChemicalFormula {
    type Output = ChemicalFormula;

    fn sub(mut self, rhs: ChemicalFormula) -> Self::Output {
        self -= &rhs;
        self
    }
}

impl Mul<i32> for &ChemicalFormula {
    type Output = ChemicalFormula;

    fn mul(self, rhs: i32) -> Self::Output {
        self.iter()
            .map(|(k, v)| (k.as_str(), v.saturating_mul(rhs)))
            .collect()
    }
}

impl Neg for &ChemicalFormula {
    type Output = ChemicalFormula;

    fn neg(self) -> Self::Output {
        self * -1
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ChemicalFormula {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for ChemicalFormula {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::elements::DEFAULT_ELEMENT_TABLE;

    #[test]
    fn test_parse_forms() {
        let spaced: ChemicalFormula = "C6 H12 O6".parse().unwrap();
        let packed: ChemicalFormula = "C6H12O6".parse().unwrap();
        assert_eq!(spaced, packed);
        assert_eq!(packed.get("C"), 6);
        assert_eq!(packed.get("N"), 0);
        assert_eq!(packed.to_string(), "C6H12O6");

        let loss: ChemicalFormula = "H-1".parse().unwrap();
        assert_eq!(loss.get("H"), -1);
        assert!(!loss.is_valid());
        assert!(loss.validate().is_err());

        let salt: ChemicalFormula = "NaCl".parse().unwrap();
        assert_eq!(salt.to_string(), "ClNa");
        let repeated: ChemicalFormula = "CH3CH2OH".parse().unwrap();
        assert_eq!(repeated.to_string(), "C2H6O");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "c6h12".parse::<ChemicalFormula>(),
            Err(ParseError::InvalidFormula { offset: 0, .. })
        ));
        assert!(matches!(
            "C6-".parse::<ChemicalFormula>(),
            Err(ParseError::InvalidFormula { offset: 2, .. })
        ));
        assert!(matches!(
            "C6(H2O)".parse::<ChemicalFormula>(),
            Err(ParseError::InvalidFormula { offset: 2, .. })
        ));
    }

    #[test]
    fn test_arithmetic() {
        let glucose: ChemicalFormula = "C6H12O6".parse().unwrap();
        let water: ChemicalFormula = "H2O".parse().unwrap();
        let anhydro = &glucose - &water;
        assert_eq!(anhydro.to_string(), "C6H10O5");

        let dimer = &(&anhydro * 2) + &water;
        assert_eq!(dimer.to_string(), "C12H22O11");

        let nothing = &water - &water;
        assert!(nothing.is_empty());
        assert_eq!(nothing, ChemicalFormula::new());
        assert_eq!((-&water).get("O"), -1);
    }

    #[test]
    fn test_mass() {
        let table: ElementTable = DEFAULT_ELEMENT_TABLE.parse().unwrap();
        let water: ChemicalFormula = "H2O".parse().unwrap();
        let mass = water.mass(&table).unwrap();
        assert!((mass - 18.0105646837).abs() < 1e-6, "{mass}");

        let unknown: ChemicalFormula = "Fe2".parse().unwrap();
        assert_eq!(
            unknown.mass(&table),
            Err(ParseError::UnknownElement("Fe".into()))
        );
    }

    #[test]
    fn test_count_overflow() {
        assert_eq!(
            "C2000000000C2000000000".parse::<ChemicalFormula>(),
            Err(ParseError::CountOverflow {
                formula: "C2000000000C2000000000".into(),
                symbol: "C".into(),
            })
        );
        assert!(matches!(
            "C99999999999".parse::<ChemicalFormula>(),
            Err(ParseError::InvalidFormula { offset: 1, .. })
        ));

        let mut formula: ChemicalFormula = "C2147483647".parse().unwrap();
        assert_eq!(formula.checked_increment("C", 1), None);
        assert_eq!(formula.get("C"), i32::MAX);
        formula.increment("C", 1);
        assert_eq!(formula.get("C"), i32::MAX);
    }
}
