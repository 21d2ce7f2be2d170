/*! Rule-based scoring of fragment evidence.

The [`StructuralScorer`] takes the measured areas of every head and chain fragment
for one hit and works through the rule set in tiers: head group rules first, then
chain rules per candidate chain combination, then position rules per ordering of
each surviving combination. Every rejection is written to the [`EvidenceLedger`].
*/
use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use super::chains::{ChainCombination, CombinationArena, CombinationId, FattyAcid};
use super::ledger::{DiscardReason, EvidenceLedger, Violation};
use super::positions::PositionPermutations;
use super::result::{
    CandidateStructure, Classification, FragmentEvidence, IdentificationState, PositionAssignment,
};
use crate::rules::{FragmentRef, IntensityRule, RuleOutcome, RuleScope, RuleSet};

/// The measured area of one fragment, for one chain when the fragment is chain specific
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentObservation {
    pub name: String,
    pub chain: Option<FattyAcid>,
    pub mz: Option<f64>,
    pub area: f64,
}

impl FragmentObservation {
    pub fn head(name: &str, mz: Option<f64>, area: f64) -> Self {
        Self {
            name: name.to_string(),
            chain: None,
            mz,
            area,
        }
    }

    pub fn chain(name: &str, chain: FattyAcid, mz: Option<f64>, area: f64) -> Self {
        Self {
            name: name.to_string(),
            chain: Some(chain),
            mz,
            area,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedFragments {
    observations: Vec<FragmentObservation>,
}

impl ObservedFragments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observation: FragmentObservation) {
        self.observations.push(observation);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FragmentObservation> {
        self.observations.iter()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn head_area(&self, name: &str) -> f64 {
        self.observations
            .iter()
            .find(|o| o.chain.is_none() && o.name == name)
            .map(|o| o.area)
            .unwrap_or_default()
    }

    pub fn chain_area(&self, chain: &FattyAcid, name: &str) -> f64 {
        self.observations
            .iter()
            .find(|o| o.chain.as_ref() == Some(chain) && o.name == name)
            .map(|o| o.area)
            .unwrap_or_default()
    }

    /// The summed area of every fragment of `chain`
    pub fn chain_total(&self, chain: &FattyAcid) -> f64 {
        self.observations
            .iter()
            .filter(|o| o.chain.as_ref() == Some(chain))
            .map(|o| o.area)
            .sum()
    }

    /// The largest fragment area, `$BASEPEAK` in rule equations
    pub fn base_peak(&self) -> f64 {
        self.observations.iter().map(|o| o.area).fold(0.0, f64::max)
    }

    fn any_detected(&self) -> bool {
        self.observations.iter().any(|o| o.area > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub state: IdentificationState,
    pub classification: Classification,
    pub false_positive: bool,
    pub candidates: Vec<CandidateStructure>,
    pub leading: Vec<CombinationId>,
    pub fragments: Vec<FragmentEvidence>,
}

impl ScoringOutcome {
    fn terminal(state: IdentificationState, fragments: Vec<FragmentEvidence>) -> Self {
        Self {
            state,
            classification: Classification::Ms1Only,
            false_positive: state == IdentificationState::DiscardHit,
            candidates: Vec::new(),
            leading: Vec::new(),
            fragments,
        }
    }
}

struct OrderingScore {
    ordering: Vec<FattyAcid>,
    outcomes: Vec<RuleOutcome>,
    satisfied: usize,
    violated: usize,
}

pub struct StructuralScorer<'a> {
    rules: &'a RuleSet,
    near_tie_delta: f64,
}

impl<'a> StructuralScorer<'a> {
    /// `near_tie_delta` applies unless the rule set carries its own
    pub fn new(rules: &'a RuleSet, near_tie_delta: f64) -> Self {
        Self {
            rules,
            near_tie_delta: rules.general.near_tie_delta.unwrap_or(near_tie_delta),
        }
    }

    pub fn near_tie_delta(&self) -> f64 {
        self.near_tie_delta
    }

    pub fn score(
        &self,
        arena: &CombinationArena,
        input: &ObservedFragments,
        ledger: &mut EvidenceLedger,
    ) -> ScoringOutcome {
        let mut observed = input.clone();
        let base_peak = observed.base_peak();
        self.apply_base_peak_cutoff(&mut observed, base_peak, ledger);

        if !observed.any_detected() {
            let fragments = self.evidence(input, &observed);
            return ScoringOutcome::terminal(IdentificationState::NoMsnPresent, fragments);
        }

        if self.head_discards(&observed, base_peak, ledger) {
            let fragments = self.evidence(input, &observed);
            return ScoringOutcome::terminal(IdentificationState::DiscardHit, fragments);
        }

        self.apply_chain_cutoff(&mut observed, ledger);

        let viable = self.viable_combinations(arena, &observed, ledger);
        let mut survivors: Vec<(CombinationId, &ChainCombination, bool, PositionAssignment)> = Vec::new();
        for (id, combination) in viable {
            let Some(supported) = self.chain_support(id, combination, &observed, base_peak, ledger) else {
                continue;
            };
            let Some(positions) = self.assign_positions(id, combination, &observed, base_peak, ledger) else {
                continue;
            };
            survivors.push((id, combination, supported, positions));
        }

        let candidates = self.rank(survivors, arena, &observed);
        let leading = self.leading(&candidates);
        let fragments = self.evidence(input, &observed);

        let head_detected = self
            .rules
            .get_head_fragments()
            .iter()
            .any(|f| observed.head_area(&f.name) > 0.0);

        if leading.is_empty() {
            let state = if head_detected {
                IdentificationState::HeadGroupDetected
            } else {
                IdentificationState::DiscardHit
            };
            let mut outcome = ScoringOutcome::terminal(state, fragments);
            outcome.candidates = candidates;
            return outcome;
        }

        let classification = if leading.len() > 1 {
            Classification::ChainFound
        } else {
            match candidates.iter().find(|c| c.id == leading[0]) {
                Some(c) if c.positions.is_resolved() => Classification::PositionCorrect,
                _ => Classification::ChainCorrect,
            }
        };
        ScoringOutcome {
            state: IdentificationState::FragmentsDetected,
            classification,
            false_positive: false,
            candidates,
            leading,
            fragments,
        }
    }

    fn apply_base_peak_cutoff(&self, observed: &mut ObservedFragments, base_peak: f64, ledger: &mut EvidenceLedger) {
        let cutoff = self.rules.general.base_peak_cutoff;
        if cutoff <= 0.0 {
            return;
        }
        for o in observed.observations.iter_mut() {
            if o.area > 0.0 && o.area < cutoff * base_peak {
                ledger.discard(&o.name, o.chain, DiscardReason::BelowBasePeakCutoff);
                o.area = 0.0;
            }
        }
    }

    fn apply_chain_cutoff(&self, observed: &mut ObservedFragments, ledger: &mut EvidenceLedger) {
        let cutoff = self.rules.general.chain_cutoff;
        if cutoff <= 0.0 {
            return;
        }
        let strongest = observed
            .iter()
            .filter(|o| o.chain.is_some())
            .map(|o| o.area)
            .fold(0.0, f64::max);
        for o in observed.observations.iter_mut() {
            if o.chain.is_some() && o.area > 0.0 && o.area < cutoff * strongest {
                ledger.discard(&o.name, o.chain, DiscardReason::BelowChainCutoff);
                o.area = 0.0;
            }
        }
    }

    /// Check mandatory head fragments and head rules, returning `true` if the hit must be discarded
    fn head_discards(&self, observed: &ObservedFragments, base_peak: f64, ledger: &mut EvidenceLedger) -> bool {
        let mut discard = false;
        for fragment in self.rules.get_head_fragments() {
            if fragment.mandatory && observed.head_area(&fragment.name) <= 0.0 {
                ledger.violation(Violation::MissingHeadFragment {
                    fragment: fragment.name.clone(),
                });
                discard = true;
            }
        }
        let lookup = |r: &FragmentRef| match r {
            FragmentRef::Fragment { name, .. } => observed.head_area(name),
            FragmentRef::BasePeak => base_peak,
        };
        for rule in self.rules.get_intensity_rules(RuleScope::Head) {
            let outcome = rule.expression.evaluate(lookup);
            if outcome.is_violation(rule.mandatory) {
                ledger.violation(Violation::HeadRule {
                    rule: rule.id,
                    mandatory: rule.mandatory,
                    outcome,
                });
                discard |= rule.mandatory;
            }
        }
        discard
    }

    fn chain_detected(&self, chain: &FattyAcid, observed: &ObservedFragments) -> bool {
        let fragments = self.rules.get_chain_fragments();
        fragments
            .iter()
            .any(|f| observed.chain_area(chain, &f.name) > 0.0)
            && fragments
                .iter()
                .filter(|f| f.mandatory)
                .all(|f| observed.chain_area(chain, &f.name) > 0.0)
    }

    /// Combinations whose every chain was detected
    fn viable_combinations<'b>(
        &self,
        arena: &'b CombinationArena,
        observed: &ObservedFragments,
        ledger: &mut EvidenceLedger,
    ) -> Vec<(CombinationId, &'b ChainCombination)> {
        let detected: BTreeSet<FattyAcid> = arena
            .distinct_chains()
            .into_iter()
            .filter(|c| self.chain_detected(c, observed))
            .collect();
        let viable: Vec<(CombinationId, &ChainCombination)> = arena
            .iter()
            .filter(|(_, c)| c.chains.iter().all(|fa| detected.contains(fa)))
            .collect();
        for chain in detected.iter() {
            if viable.iter().any(|(_, c)| c.contains(chain)) {
                continue;
            }
            for fragment in self.rules.get_chain_fragments() {
                if observed.chain_area(chain, &fragment.name) > 0.0 {
                    ledger.discard(&fragment.name, Some(*chain), DiscardReason::NoConsistentCombination);
                }
            }
        }
        trace!(
            "{} chains detected, {} of {} combinations viable",
            detected.len(),
            viable.len(),
            arena.len()
        );
        viable
    }

    /// Evaluate the chain rules for each distinct chain of a combination. `None` if any
    /// rule was violated, otherwise whether the combination is supported.
    fn chain_support(
        &self,
        id: CombinationId,
        combination: &ChainCombination,
        observed: &ObservedFragments,
        base_peak: f64,
        ledger: &mut EvidenceLedger,
    ) -> Option<bool> {
        let rules = self.rules.get_intensity_rules(RuleScope::Chain);
        let mut supported = rules.is_empty();
        let mut violated = false;
        for chain in combination.distinct() {
            let lookup = |r: &FragmentRef| match r {
                FragmentRef::Fragment { name, .. } => {
                    if self.rules.get_chain_fragments().iter().any(|f| f.name == *name) {
                        observed.chain_area(&chain, name)
                    } else {
                        observed.head_area(name)
                    }
                }
                FragmentRef::BasePeak => base_peak,
            };
            for rule in rules.iter() {
                let outcome = rule.expression.evaluate(lookup);
                if outcome == RuleOutcome::Satisfied {
                    supported = true;
                }
                if outcome.is_violation(rule.mandatory) {
                    ledger.violation(Violation::ChainRule {
                        combination: id,
                        chain,
                        rule: rule.id,
                        outcome,
                    });
                    violated = true;
                }
            }
        }
        if violated {
            None
        } else {
            Some(supported)
        }
    }

    fn evaluate_position(
        rule: &IntensityRule,
        ordering: &[FattyAcid],
        observed: &ObservedFragments,
        base_peak: f64,
    ) -> RuleOutcome {
        rule.expression.evaluate(|r| match r {
            FragmentRef::Fragment {
                name,
                position: Some(k),
            } => ordering
                .get(k.saturating_sub(1))
                .map(|c| observed.chain_area(c, name))
                .unwrap_or_default(),
            FragmentRef::Fragment { name, position: None } => observed.head_area(name),
            FragmentRef::BasePeak => base_peak,
        })
    }

    /// `None` when every ordering of the combination is excluded by mandatory position rules
    fn assign_positions(
        &self,
        id: CombinationId,
        combination: &ChainCombination,
        observed: &ObservedFragments,
        base_peak: f64,
        ledger: &mut EvidenceLedger,
    ) -> Option<PositionAssignment> {
        let rules = self.rules.get_intensity_rules(RuleScope::Position);
        if rules.is_empty() || combination.len() < 2 {
            let mut orderings: Vec<Vec<FattyAcid>> =
                PositionPermutations::new(combination.chains.clone(), |_: &[FattyAcid]| true).collect();
            return Some(if orderings.len() == 1 {
                PositionAssignment::Resolved(orderings.remove(0))
            } else {
                PositionAssignment::Ambiguous(orderings)
            });
        }

        let mandatory: Vec<(&IntensityRule, usize)> = rules
            .iter()
            .filter(|r| r.mandatory)
            .map(|r| (*r, r.positions().last().copied().unwrap_or_default()))
            .collect();
        let accept = |prefix: &[FattyAcid]| {
            mandatory.iter().all(|(rule, needed)| {
                *needed > prefix.len()
                    || !Self::evaluate_position(rule, prefix, observed, base_peak).is_violation(true)
            })
        };
        let scored: Vec<OrderingScore> = PositionPermutations::new(combination.chains.clone(), accept)
            .map(|ordering| {
                let outcomes: Vec<RuleOutcome> = rules
                    .iter()
                    .map(|r| Self::evaluate_position(r, &ordering, observed, base_peak))
                    .collect();
                let satisfied = outcomes.iter().filter(|o| **o == RuleOutcome::Satisfied).count();
                let violated = outcomes
                    .iter()
                    .zip(rules.iter())
                    .filter(|(o, r)| o.is_violation(r.mandatory))
                    .count();
                OrderingScore {
                    ordering,
                    outcomes,
                    satisfied,
                    violated,
                }
            })
            .collect();

        if scored.is_empty() {
            let all: Vec<Vec<FattyAcid>> =
                PositionPermutations::new(combination.chains.clone(), |_: &[FattyAcid]| true).collect();
            for (rule, _) in mandatory.iter() {
                if all
                    .iter()
                    .any(|o| Self::evaluate_position(rule, o, observed, base_peak).is_violation(true))
                {
                    ledger.violation(Violation::PositionRule {
                        combination: id,
                        rule: rule.id,
                    });
                }
            }
            return None;
        }

        let mut contradicted = false;
        for i in 0..rules.len() {
            for j in (i + 1)..rules.len() {
                let satisfies = |k: usize| {
                    scored
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.outcomes[k] == RuleOutcome::Satisfied)
                        .map(|(n, _)| n)
                        .collect::<BTreeSet<usize>>()
                };
                let (a, b) = (satisfies(i), satisfies(j));
                if !a.is_empty() && !b.is_empty() && a.is_disjoint(&b) {
                    ledger.violation(Violation::Contradiction {
                        combination: id,
                        first: rules[i].id,
                        second: rules[j].id,
                    });
                    contradicted = true;
                }
            }
        }

        if scored.len() == 1 {
            return scored
                .into_iter()
                .next()
                .map(|s| PositionAssignment::Resolved(s.ordering));
        }
        let best = scored
            .iter()
            .filter(|s| s.violated == 0)
            .map(|s| s.satisfied)
            .max();
        let mut top: Vec<Vec<FattyAcid>> = match best {
            Some(best) if !contradicted => scored
                .into_iter()
                .filter(|s| s.violated == 0 && s.satisfied == best)
                .map(|s| s.ordering)
                .collect(),
            _ => scored.into_iter().map(|s| s.ordering).collect(),
        };
        Some(if top.len() == 1 {
            PositionAssignment::Resolved(top.remove(0))
        } else {
            PositionAssignment::Ambiguous(top)
        })
    }

    /// Split each chain's evidence evenly among the survivors that contain it and rank them
    fn rank(
        &self,
        survivors: Vec<(CombinationId, &ChainCombination, bool, PositionAssignment)>,
        arena: &CombinationArena,
        observed: &ObservedFragments,
    ) -> Vec<CandidateStructure> {
        let totals: BTreeMap<FattyAcid, f64> = arena
            .distinct_chains()
            .into_iter()
            .map(|c| (c, observed.chain_total(&c)))
            .collect();
        let evidence: f64 = totals.values().sum();
        let mut holders: BTreeMap<FattyAcid, usize> = BTreeMap::new();
        for (_, combination, _, _) in survivors.iter() {
            for chain in combination.distinct() {
                *holders.entry(chain).or_default() += 1;
            }
        }

        let mut candidates: Vec<CandidateStructure> = survivors
            .into_iter()
            .map(|(id, combination, supported, positions)| {
                let attributed: f64 = combination
                    .distinct()
                    .iter()
                    .map(|c| {
                        let n = holders.get(c).copied().unwrap_or(1).max(1);
                        totals.get(c).copied().unwrap_or_default() / n as f64
                    })
                    .sum();
                let share = if evidence > 0.0 { attributed / evidence } else { 0.0 };
                CandidateStructure {
                    id,
                    label: combination.label(),
                    combination: combination.clone(),
                    share,
                    supported,
                    positions,
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.share.total_cmp(&a.share).then_with(|| a.label.cmp(&b.label)));
        candidates
    }

    fn leading(&self, candidates: &[CandidateStructure]) -> Vec<CombinationId> {
        let Some(best) = candidates
            .iter()
            .filter(|c| c.supported)
            .map(|c| c.share)
            .reduce(f64::max)
        else {
            return Vec::new();
        };
        candidates
            .iter()
            .filter(|c| c.supported && c.share > 0.0 && best - c.share <= self.near_tie_delta + 1e-12)
            .map(|c| c.id)
            .collect()
    }

    fn evidence(&self, measured: &ObservedFragments, kept: &ObservedFragments) -> Vec<FragmentEvidence> {
        measured
            .iter()
            .zip(kept.iter())
            .map(|(m, k)| FragmentEvidence {
                name: m.name.clone(),
                chain: m.chain,
                mz: m.mz,
                area: m.area,
                detected: k.area > 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hit::SumComposition;
    use crate::rules::{parse_rule_set, RuleKey};
    use crate::scoring::ChainBounds;

    const RULES: &str = "\
[GENERAL]
AmountOfChains=2

[HEAD]
!FRAGMENTS
Name=Head_184 Formula=C5H15NO4P Charge=1 mandatory=true
!INTENSITIES
Equation=Head_184>0.05*$BASEPEAK mandatory=true

[CHAINS]
!FRAGMENTS
Name=NL_FA Formula=$PRECURSOR-$CHAIN Charge=1 mandatory=false
!INTENSITIES
Equation=NL_FA>0.01*Head_184 mandatory=false
";

    fn fa(s: &str) -> FattyAcid {
        s.parse().unwrap()
    }

    fn arena() -> CombinationArena {
        CombinationArena::from_sum_composition(&SumComposition::new(34, 1), 2, &ChainBounds::default())
    }

    fn observed(head: f64, chains: &[(&str, f64)]) -> ObservedFragments {
        let mut observed = ObservedFragments::new();
        observed.push(FragmentObservation::head("Head_184", Some(184.0733), head));
        for (chain, area) in chains {
            observed.push(FragmentObservation::chain("NL_FA", fa(chain), None, *area));
        }
        observed
    }

    fn score(rules: &str, observed: &ObservedFragments) -> (ScoringOutcome, EvidenceLedger) {
        let rules = parse_rule_set(rules, &RuleKey::new("PC", "H")).unwrap();
        let scorer = StructuralScorer::new(&rules, 0.05);
        let mut ledger = EvidenceLedger::new();
        let outcome = scorer.score(&arena(), observed, &mut ledger);
        (outcome, ledger)
    }

    const POSITION_RULE: &str = "
[POSITION]
!INTENSITIES
Equation=NL_FA[2]>NL_FA[1] mandatory=false
";

    #[test]
    fn test_resolved_positions() {
        let rules = format!("{RULES}{POSITION_RULE}");
        let (outcome, ledger) = score(&rules, &observed(1000.0, &[("16:0", 100.0), ("18:1", 300.0)]));
        assert_eq!(outcome.state, IdentificationState::FragmentsDetected);
        assert_eq!(outcome.classification, Classification::PositionCorrect);
        assert_eq!(outcome.candidates.len(), 1);
        let leader = &outcome.candidates[0];
        assert_eq!(leader.label, "16:0_18:1");
        assert!((leader.share - 1.0).abs() < 1e-12);
        assert_eq!(leader.positions, PositionAssignment::Resolved(vec![fa("16:0"), fa("18:1")]));
        assert_eq!(ledger.violations().count(), 0);
    }

    #[test]
    fn test_ambiguous_combinations() {
        let (outcome, _) = score(
            RULES,
            &observed(
                1000.0,
                &[("16:0", 200.0), ("18:1", 200.0), ("16:1", 200.0), ("18:0", 200.0)],
            ),
        );
        assert_eq!(outcome.state, IdentificationState::FragmentsDetected);
        assert_eq!(outcome.classification, Classification::ChainFound);
        assert_eq!(outcome.leading.len(), 2);
        let labels: Vec<&str> = outcome.candidates.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["16:0_18:1", "16:1_18:0"]);
        for c in outcome.candidates.iter() {
            assert!((c.share - 0.5).abs() < 1e-12);
            assert!(matches!(&c.positions, PositionAssignment::Ambiguous(o) if o.len() == 2));
        }
        assert!(outcome.candidates.iter().map(|c| c.share).sum::<f64>() <= 1.0 + 1e-12);
    }

    #[test]
    fn test_mandatory_head_rule_discards() {
        let (outcome, ledger) = score(RULES, &observed(10.0, &[("16:0", 500.0), ("18:1", 500.0)]));
        assert_eq!(outcome.state, IdentificationState::DiscardHit);
        assert!(outcome.false_positive);
        assert!(outcome.candidates.is_empty());
        assert!(ledger
            .violations()
            .any(|v| matches!(v, Violation::HeadRule { mandatory: true, .. })));

        let (outcome, ledger) = score(RULES, &observed(0.0, &[("16:0", 500.0), ("18:1", 500.0)]));
        assert_eq!(outcome.state, IdentificationState::DiscardHit);
        assert!(ledger
            .violations()
            .any(|v| matches!(v, Violation::MissingHeadFragment { fragment } if fragment == "Head_184")));
    }

    #[test]
    fn test_without_chain_evidence() {
        let (outcome, _) = score(RULES, &observed(1000.0, &[("16:0", 0.0)]));
        assert_eq!(outcome.state, IdentificationState::HeadGroupDetected);
        assert_eq!(outcome.classification, Classification::Ms1Only);

        let (outcome, _) = score(RULES, &observed(0.0, &[]));
        assert_eq!(outcome.state, IdentificationState::NoMsnPresent);
        assert!(!outcome.false_positive);
    }

    #[test]
    fn test_contradiction_is_reported() {
        let rules = format!(
            "{RULES}{POSITION_RULE}Equation=NL_FA[1]>NL_FA[2] mandatory=false\n"
        );
        let (outcome, ledger) = score(&rules, &observed(1000.0, &[("16:0", 100.0), ("18:1", 300.0)]));
        assert_eq!(outcome.state, IdentificationState::FragmentsDetected);
        assert_eq!(outcome.classification, Classification::ChainCorrect);
        assert!(matches!(&outcome.candidates[0].positions, PositionAssignment::Ambiguous(o) if o.len() == 2));
        assert_eq!(ledger.contradictions().count(), 1);
    }

    #[test]
    fn test_mandatory_position_rule_eliminates() {
        let rules = format!(
            "{RULES}\n[POSITION]\n!INTENSITIES\nEquation=NL_FA[1]>2*NL_FA[2] mandatory=true\n"
        );
        let (outcome, ledger) = score(&rules, &observed(1000.0, &[("16:0", 200.0), ("18:1", 200.0)]));
        assert_eq!(outcome.state, IdentificationState::HeadGroupDetected);
        assert!(outcome.candidates.is_empty());
        assert!(ledger
            .violations()
            .any(|v| matches!(v, Violation::PositionRule { .. })));
    }

    #[test]
    fn test_cutoffs_and_inconsistent_chains() {
        let rules = RULES.replace("AmountOfChains=2", "AmountOfChains=2\nChainCutoff=10%");
        let (outcome, ledger) = score(
            &rules,
            &observed(1000.0, &[("16:0", 400.0), ("18:1", 400.0), ("16:1", 10.0), ("15:0", 50.0)]),
        );
        assert_eq!(outcome.classification, Classification::ChainCorrect);
        assert!(ledger.discarded().any(|d| d.chain == Some(fa("16:1"))
            && d.reason == DiscardReason::BelowChainCutoff));
        assert!(ledger.discarded().any(|d| d.chain == Some(fa("15:0"))
            && d.reason == DiscardReason::NoConsistentCombination));
        let leader = &outcome.candidates[0];
        assert!((leader.share - 800.0 / 850.0).abs() < 1e-9);
        let evidence = outcome
            .fragments
            .iter()
            .find(|f| f.chain == Some(fa("16:1")))
            .unwrap();
        assert_eq!(evidence.area, 10.0);
        assert!(!evidence.detected);
    }
}
