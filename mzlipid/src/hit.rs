/*! Candidate lipid species detected at the precursor stage */
use std::fmt::Display;
use std::str::FromStr;

use thiserror::Error;

use crate::formula::ChemicalFormula;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed sum composition {0:?}, expected `carbons:double_bonds`")]
pub struct SumCompositionParseError(pub String);

/// The total number of chain carbons and double bonds, written `34:1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SumComposition {
    pub carbons: u32,
    pub double_bonds: u32,
}

impl SumComposition {
    pub fn new(carbons: u32, double_bonds: u32) -> Self {
        Self {
            carbons,
            double_bonds,
        }
    }
}

impl Display for SumComposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.carbons, self.double_bonds)
    }
}

impl FromStr for SumComposition {
    type Err = SumCompositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || SumCompositionParseError(s.to_string());
        let (c, d) = s.trim().split_once(':').ok_or_else(err)?;
        Ok(Self {
            carbons: c.trim().parse().map_err(|_| err())?,
            double_bonds: d.trim().parse().map_err(|_| err())?,
        })
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for SumComposition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SumComposition {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An MS1-level detection of a lipid species, awaiting structural confirmation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Ms1Hit {
    pub id: String,
    pub lipid_class: String,
    pub adduct: String,
    /// The observed precursor m/z
    pub mz: f64,
    /// The apex retention time, in minutes
    pub retention_time: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rt_lower: Option<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rt_upper: Option<f64>,
    pub charge: i32,
    /// The neutral molecular formula
    pub formula: ChemicalFormula,
    #[cfg_attr(feature = "serde", serde(default))]
    pub sum_composition: Option<SumComposition>,
}

impl Ms1Hit {
    pub fn new(
        id: &str,
        lipid_class: &str,
        adduct: &str,
        mz: f64,
        retention_time: f64,
        charge: i32,
        formula: ChemicalFormula,
    ) -> Self {
        Self {
            id: id.to_string(),
            lipid_class: lipid_class.to_string(),
            adduct: adduct.to_string(),
            mz,
            retention_time,
            rt_lower: None,
            rt_upper: None,
            charge,
            formula,
            sum_composition: None,
        }
    }

    pub fn with_sum_composition(mut self, sum_composition: SumComposition) -> Self {
        self.sum_composition = Some(sum_composition);
        self
    }

    pub fn with_rt_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.rt_lower = Some(lower.min(upper));
        self.rt_upper = Some(upper.max(lower));
        self
    }

    /// The explicit retention time bounds, if both are present
    pub fn rt_bounds(&self) -> Option<(f64, f64)> {
        match (self.rt_lower, self.rt_upper) {
            (Some(lo), Some(hi)) => Some((lo, hi)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sum_composition() {
        let sc: SumComposition = "34:1".parse().unwrap();
        assert_eq!(sc, SumComposition::new(34, 1));
        assert_eq!(sc.to_string(), "34:1");
        assert!("34".parse::<SumComposition>().is_err());
        assert!("34:x".parse::<SumComposition>().is_err());
    }

    #[test]
    fn test_bounds() {
        let hit = Ms1Hit::new("a", "PC", "H", 760.585, 10.0, 1, "C42H82NO8P".parse().unwrap());
        assert!(hit.rt_bounds().is_none());
        let hit = hit.with_rt_bounds(10.5, 9.5);
        assert_eq!(hit.rt_bounds(), Some((9.5, 10.5)));
    }
}
