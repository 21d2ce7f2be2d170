//! Structural scoring of MS/MS fragment evidence against a rule set
mod chains;
mod engine;
mod ledger;
mod positions;
mod result;

pub use chains::{
    enumerate_combinations, ChainBounds, ChainCombination, CombinationArena, CombinationId,
    FattyAcid,
};
pub use engine::{FragmentObservation, ObservedFragments, ScoringOutcome, StructuralScorer};
pub use ledger::{Diagnostic, DiscardReason, DiscardedFragment, EvidenceLedger, Violation};
pub use positions::PositionPermutations;
pub use result::{
    CandidateStructure, Classification, FragmentEvidence, IdentificationResult,
    IdentificationState, PositionAssignment,
};
