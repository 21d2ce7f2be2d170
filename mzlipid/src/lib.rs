pub mod adduct;
pub mod chromatogram;
pub mod elements;
pub mod enumerate;
pub mod formula;
pub mod hit;
pub mod isotopic_model;
mod parsers;
pub mod peak_finder;
pub mod smoothing;

pub mod rules;
pub mod scoring;

pub mod api;
pub mod config;

pub use api::{identify, LipidIdentifier};
pub use chromatogram::{CachedScan, ChromatogramAccessError, InMemoryScanCache, ScanProvider};
pub use config::{AnalysisConfig, AnalysisContext, MassTolerance};
pub use elements::{ElementTable, ParseError};
pub use formula::ChemicalFormula;
pub use hit::{Ms1Hit, SumComposition};
pub use rules::{DirectoryRuleSource, MemoryRuleSource, RuleLoadError, RuleRepository, RuleSource};
pub use scoring::{Classification, IdentificationResult, IdentificationState};
