//! Analysis parameters, loaded once and shared by reference with every identification
use std::fmt::Display;

use mzpeaks::Tolerance;

use crate::elements::{ElementTable, ParseError, DEFAULT_ELEMENT_TABLE};
use crate::peak_finder::PeakFinderConfig;
use crate::scoring::ChainBounds;
use crate::smoothing::SmoothingConfig;

/// A mass accuracy window, either relative or absolute
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum MassTolerance {
    Ppm(f64),
    Da(f64),
}

impl MassTolerance {
    pub fn to_tolerance(&self) -> Tolerance {
        match self {
            Self::Ppm(v) => Tolerance::PPM(*v),
            Self::Da(v) => Tolerance::Da(*v),
        }
    }
}

impl From<MassTolerance> for Tolerance {
    fn from(value: MassTolerance) -> Self {
        value.to_tolerance()
    }
}

impl Display for MassTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ppm(v) => write!(f, "{v}ppm"),
            Self::Da(v) => write!(f, "{v}Da"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnalysisConfig {
    /// The highest isotope index searched for precursors
    pub max_isotope: usize,
    pub ms1_tolerance: MassTolerance,
    /// Used for fragments whose definition carries no tolerance of its own
    pub fragment_tolerance: MassTolerance,
    /// Half-width of the precursor isolation window, in m/z
    pub precursor_isolation: f64,
    /// Half-width of the retention window when the rule set gives none, in minutes
    pub rt_tolerance: f64,
    pub min_isotopes_required: usize,
    pub smoothing: SmoothingConfig,
    pub peak_finder: PeakFinderConfig,
    pub chain_bounds: ChainBounds,
    pub near_tie_delta: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_isotope: 3,
            ms1_tolerance: MassTolerance::Ppm(10.0),
            fragment_tolerance: MassTolerance::Ppm(20.0),
            precursor_isolation: 0.7,
            rt_tolerance: 0.5,
            min_isotopes_required: 2,
            smoothing: SmoothingConfig::default(),
            peak_finder: PeakFinderConfig::default(),
            chain_bounds: ChainBounds::default(),
            near_tie_delta: 0.05,
        }
    }
}

/// The configuration and element table, immutable for the lifetime of a run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisContext {
    pub config: AnalysisConfig,
    pub element_table: ElementTable,
}

impl AnalysisContext {
    pub fn new(config: AnalysisConfig, element_table: ElementTable) -> Self {
        Self {
            config,
            element_table,
        }
    }

    pub fn with_default_table(config: AnalysisConfig) -> Result<Self, ParseError> {
        let element_table = DEFAULT_ELEMENT_TABLE.parse()?;
        Ok(Self::new(config, element_table))
    }

    /// The retention half-width in effect, preferring the rule set's own
    pub fn rt_tolerance(&self, rule_tolerance: Option<f64>) -> f64 {
        rule_tolerance.unwrap_or(self.config.rt_tolerance)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_context() -> Result<(), ParseError> {
        let context = AnalysisContext::with_default_table(AnalysisConfig::default())?;
        assert!(context.element_table.contains("C"));
        assert_eq!(context.rt_tolerance(None), 0.5);
        assert_eq!(context.rt_tolerance(Some(0.2)), 0.2);
        assert_eq!(context.config.fragment_tolerance.to_string(), "20ppm");
        Ok(())
    }
}
