use std::fmt::Display;

use super::chains::{ChainCombination, CombinationId, FattyAcid};
use super::ledger::EvidenceLedger;
use crate::peak_finder::{Probe, RetentionWindow};

/// How far identification of a hit progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IdentificationState {
    NoMsnPresent,
    HeadGroupDetected,
    FragmentsDetected,
    DiscardHit,
}

impl IdentificationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::NoMsnPresent | Self::DiscardHit)
    }
}

/// The level of structural detail supported by the evidence, ordered from least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Classification {
    NotFound,
    Ms1Only,
    ChainFound,
    ChainCorrect,
    PositionCorrect,
}

impl Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotFound => "not-found",
            Self::Ms1Only => "ms1-only",
            Self::ChainFound => "chain-found",
            Self::ChainCorrect => "chain-correct",
            Self::PositionCorrect => "position-correct",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PositionAssignment {
    /// Chains in sn-position order
    Resolved(Vec<FattyAcid>),
    /// The equally supported orderings
    Ambiguous(Vec<Vec<FattyAcid>>),
}

impl PositionAssignment {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn orderings(&self) -> Vec<&[FattyAcid]> {
        match self {
            Self::Resolved(o) => vec![o.as_slice()],
            Self::Ambiguous(os) => os.iter().map(|o| o.as_slice()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CandidateStructure {
    pub id: CombinationId,
    pub label: String,
    pub combination: ChainCombination,
    /// The fraction of all chain evidence attributed to this combination
    pub share: f64,
    /// Whether some chain rule was satisfied
    pub supported: bool,
    pub positions: PositionAssignment,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FragmentEvidence {
    pub name: String,
    pub chain: Option<FattyAcid>,
    /// Absent when the fragment formula could not be formed
    pub mz: Option<f64>,
    pub area: f64,
    pub detected: bool,
}

/// The outcome of identifying one MS1 hit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IdentificationResult {
    pub hit_id: String,
    pub lipid_class: String,
    pub adduct: String,
    pub state: IdentificationState,
    pub classification: Classification,
    pub false_positive: bool,
    pub retention_window: Option<RetentionWindow>,
    pub ms1_probe: Option<Probe>,
    /// Ranked by share, then label
    pub candidates: Vec<CandidateStructure>,
    pub leading: Vec<CombinationId>,
    pub fragments: Vec<FragmentEvidence>,
    pub ledger: EvidenceLedger,
}

impl IdentificationResult {
    pub fn new(hit_id: &str, lipid_class: &str, adduct: &str) -> Self {
        Self {
            hit_id: hit_id.to_string(),
            lipid_class: lipid_class.to_string(),
            adduct: adduct.to_string(),
            state: IdentificationState::NoMsnPresent,
            classification: Classification::NotFound,
            false_positive: false,
            retention_window: None,
            ms1_probe: None,
            candidates: Vec::new(),
            leading: Vec::new(),
            fragments: Vec::new(),
            ledger: EvidenceLedger::new(),
        }
    }

    pub fn candidate(&self, id: CombinationId) -> Option<&CandidateStructure> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn leading_candidates(&self) -> impl Iterator<Item = &CandidateStructure> {
        self.leading.iter().filter_map(|id| self.candidate(*id))
    }

    pub fn total_share(&self) -> f64 {
        self.candidates.iter().map(|c| c.share).sum()
    }
}
