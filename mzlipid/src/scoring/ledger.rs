//! The record of every rule violation, discarded fragment and failure met while scoring a hit
use std::fmt::Display;

use super::chains::{CombinationId, FattyAcid};
use crate::rules::{RuleId, RuleOutcome};

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Violation {
    MissingHeadFragment {
        fragment: String,
    },
    HeadRule {
        rule: RuleId,
        mandatory: bool,
        outcome: RuleOutcome,
    },
    ChainRule {
        combination: CombinationId,
        chain: FattyAcid,
        rule: RuleId,
        outcome: RuleOutcome,
    },
    /// Every ordering of the combination violated this mandatory position rule
    PositionRule {
        combination: CombinationId,
        rule: RuleId,
    },
    /// Both rules are satisfiable, but never by the same ordering
    Contradiction {
        combination: CombinationId,
        first: RuleId,
        second: RuleId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiscardReason {
    NegativeStoichiometry,
    BelowChainCutoff,
    BelowBasePeakCutoff,
    NoConsistentCombination,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscardedFragment {
    pub fragment: String,
    pub chain: Option<FattyAcid>,
    pub reason: DiscardReason,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Diagnostic {
    Violation(Violation),
    Discarded(DiscardedFragment),
    RuleSetUnavailable(String),
    ChromatogramUnavailable(String),
    InvalidFormula(String),
    UnknownAdduct(String),
    /// The hit's charge disagrees with the adduct it is identified as, or is zero
    ChargeMismatch { hit: i32, adduct: i32 },
    /// No isotope-consistent precursor peak was found near the hit
    Ms1NotConfirmed,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::Violation(v) => match v {
                Violation::MissingHeadFragment { fragment } => {
                    write!(f, "mandatory head fragment {fragment} not detected")
                }
                Violation::HeadRule { rule, outcome, .. } => write!(f, "head rule {rule} {outcome:?}"),
                Violation::ChainRule {
                    combination,
                    chain,
                    rule,
                    outcome,
                } => write!(f, "chain rule {rule} {outcome:?} for {chain} in {combination}"),
                Violation::PositionRule { combination, rule } => {
                    write!(f, "position rule {rule} excludes every ordering of {combination}")
                }
                Violation::Contradiction {
                    combination,
                    first,
                    second,
                } => write!(f, "position rules {first} and {second} contradict for {combination}"),
            },
            Diagnostic::Discarded(d) => match d.chain {
                Some(chain) => write!(f, "fragment {} of {chain} discarded: {:?}", d.fragment, d.reason),
                None => write!(f, "fragment {} discarded: {:?}", d.fragment, d.reason),
            },
            Diagnostic::RuleSetUnavailable(e) => write!(f, "rules unavailable: {e}"),
            Diagnostic::ChromatogramUnavailable(e) => write!(f, "chromatogram unavailable: {e}"),
            Diagnostic::InvalidFormula(e) => write!(f, "invalid formula: {e}"),
            Diagnostic::UnknownAdduct(e) => write!(f, "unknown adduct: {e}"),
            Diagnostic::ChargeMismatch { hit, adduct } => {
                write!(f, "hit charge {hit} does not match adduct charge {adduct}")
            }
            Diagnostic::Ms1NotConfirmed => f.write_str("no MS1 peak found"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EvidenceLedger {
    pub entries: Vec<Diagnostic>,
}

impl EvidenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn violation(&mut self, violation: Violation) {
        self.push(Diagnostic::Violation(violation));
    }

    pub fn discard(&mut self, fragment: &str, chain: Option<FattyAcid>, reason: DiscardReason) {
        self.push(Diagnostic::Discarded(DiscardedFragment {
            fragment: fragment.to_string(),
            chain,
            reason,
        }));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::Violation(v) => Some(v),
            _ => None,
        })
    }

    pub fn discarded(&self) -> impl Iterator<Item = &DiscardedFragment> {
        self.entries.iter().filter_map(|d| match d {
            Diagnostic::Discarded(d) => Some(d),
            _ => None,
        })
    }

    pub fn contradictions(&self) -> impl Iterator<Item = &Violation> {
        self.violations()
            .filter(|v| matches!(v, Violation::Contradiction { .. }))
    }

    /// The violations attributed to `combination`
    pub fn violations_for(&self, combination: CombinationId) -> impl Iterator<Item = &Violation> {
        self.violations().filter(move |v| match v {
            Violation::ChainRule { combination: c, .. }
            | Violation::PositionRule { combination: c, .. }
            | Violation::Contradiction { combination: c, .. } => *c == combination,
            _ => false,
        })
    }
}
