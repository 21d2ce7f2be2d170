//! Identification of lipid species from MS1 hits, the entry point tying peak finding,
//! rule loading and structural scoring together.
use mzpeaks::Tolerance;
use thiserror::Error;
use tracing::{debug, trace};

use crate::{
    adduct::{Adduct, UnknownAdduct},
    chromatogram::{ChromatogramAccessError, ScanProvider},
    config::AnalysisContext,
    elements::ParseError,
    formula::ChemicalFormula,
    hit::Ms1Hit,
    isotopic_model::{mass_to_mz, CachingIsotopicModel, IsotopeDistributionGenerator},
    peak_finder::{PeakFinder, PeakSearchParams, PeakSearchResult, RetentionWindow},
    rules::{FragmentDefinition, RuleRepository, RuleSet},
    scoring::{
        CombinationArena, Diagnostic, DiscardReason, FattyAcid, FragmentObservation,
        Classification, IdentificationResult, IdentificationState, ObservedFragments,
        StructuralScorer,
    },
};

/// Failures that end the identification of one hit early. They never escape
/// [`LipidIdentifier::identify`] and are written into the result's ledger instead.
#[derive(Debug, Error)]
enum IdentificationError {
    #[error(transparent)]
    Adduct(#[from] UnknownAdduct),
    #[error(transparent)]
    Chromatogram(#[from] ChromatogramAccessError),
    #[error(transparent)]
    Formula(#[from] ParseError),
    #[error("Hit charge {hit} does not match adduct charge {adduct}")]
    Charge { hit: i32, adduct: i32 },
}

impl IdentificationError {
    fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::Adduct(e) => Diagnostic::UnknownAdduct(e.0.clone()),
            Self::Chromatogram(e) => Diagnostic::ChromatogramUnavailable(e.to_string()),
            Self::Formula(e) => Diagnostic::InvalidFormula(e.to_string()),
            Self::Charge { hit, adduct } => Diagnostic::ChargeMismatch {
                hit: *hit,
                adduct: *adduct,
            },
        }
    }
}

/// The nearest cluster's monoisotopic area, or zero when nothing was found
fn area_near(found: &PeakSearchResult, time: f64) -> f64 {
    found
        .nearest_cluster(time)
        .and_then(|c| found.monoisotopic(c))
        .map(|p| p.area)
        .unwrap_or_default()
}

/// Identifies MS1 hits against one scan provider, caching isotopic patterns across hits.
///
/// One instance is meant to be owned by each worker thread. The [`AnalysisContext`],
/// scan provider and [`RuleRepository`] are borrowed and may be shared freely.
#[derive(Debug)]
pub struct LipidIdentifier<'a, P: ScanProvider + ?Sized> {
    pub context: &'a AnalysisContext,
    pub provider: &'a P,
    pub rules: &'a RuleRepository,
    model: CachingIsotopicModel<'a>,
}

impl<'a, P: ScanProvider + ?Sized> LipidIdentifier<'a, P> {
    pub fn new(context: &'a AnalysisContext, provider: &'a P, rules: &'a RuleRepository) -> Self {
        Self {
            context,
            provider,
            rules,
            model: CachingIsotopicModel::new(&context.element_table),
        }
    }

    fn peak_finder(&self) -> PeakFinder<'a, P> {
        PeakFinder::new(self.provider, self.context.config.peak_finder)
    }

    /// Identify `hit` using the class and adduct it was detected as
    pub fn identify_hit(&mut self, hit: &Ms1Hit) -> IdentificationResult {
        self.identify(hit, &hit.lipid_class, &hit.adduct)
    }

    /// Identify `hit` as a `lipid_class` ion formed with `adduct`.
    ///
    /// Rule, formula and chromatogram failures are recorded in the result's ledger and
    /// leave the result in the state reached before the failure.
    #[tracing::instrument(level = "debug", skip_all, fields(hit = %hit.id, class = lipid_class, adduct = adduct))]
    pub fn identify(&mut self, hit: &Ms1Hit, lipid_class: &str, adduct: &str) -> IdentificationResult {
        let mut result = IdentificationResult::new(&hit.id, lipid_class, adduct);
        if let Err(e) = self.identify_into(hit, lipid_class, adduct, &mut result) {
            debug!("Identification of {} stopped: {e}", hit.id);
            result.ledger.push(e.diagnostic());
            result.state = IdentificationState::NoMsnPresent;
            result.classification = Classification::NotFound;
            result.false_positive = false;
        }
        debug!(
            "{} is {:?} ({}), {} candidates",
            hit.id,
            result.state,
            result.classification,
            result.candidates.len()
        );
        result
    }

    fn identify_into(
        &mut self,
        hit: &Ms1Hit,
        lipid_class: &str,
        adduct_name: &str,
        result: &mut IdentificationResult,
    ) -> Result<(), IdentificationError> {
        let adduct: Adduct = adduct_name.parse()?;
        if hit.charge != adduct.charge {
            return Err(IdentificationError::Charge {
                hit: hit.charge,
                adduct: adduct.charge,
            });
        }
        let precursor = adduct.ion_formula(&hit.formula);
        precursor.validate()?;

        let rules = self.rules.load_rules(lipid_class, adduct_name);
        let rule_tolerance = rules
            .as_ref()
            .ok()
            .and_then(|r| r.general.retention_time_tolerance);

        let Some(window) = self.retention_window(hit, &precursor, rule_tolerance, result)? else {
            result.ledger.push(Diagnostic::Ms1NotConfirmed);
            return Ok(());
        };
        result.retention_window = Some(window);
        result.classification = Classification::Ms1Only;

        let rules = match rules {
            Ok(rules) => rules,
            Err(e) => {
                result.ledger.push(Diagnostic::RuleSetUnavailable(e.to_string()));
                return Ok(());
            }
        };

        if !self
            .provider
            .has_spectra_in_region(window.start, window.end, rules.general.ms_level)?
        {
            trace!("No MS{} spectra in {:0.3}-{:0.3}", rules.general.ms_level, window.start, window.end);
            return Ok(());
        }

        let arena = match hit.sum_composition.as_ref() {
            Some(sum) => CombinationArena::from_sum_composition(
                sum,
                rules.general.amount_of_chains,
                &self.context.config.chain_bounds,
            ),
            None => CombinationArena::new(),
        };

        let observed = self.observe_fragments(hit, &precursor, &rules, &arena, window, result)?;

        let scorer = StructuralScorer::new(&rules, self.context.config.near_tie_delta);
        let outcome = scorer.score(&arena, &observed, &mut result.ledger);
        result.state = outcome.state;
        result.classification = outcome.classification;
        result.false_positive = outcome.false_positive;
        result.candidates = outcome.candidates;
        result.leading = outcome.leading;
        result.fragments = outcome.fragments;
        Ok(())
    }

    /// Explicit hit bounds win. Otherwise the precursor must be confirmed by an isotope-consistent
    /// MS1 peak near the hit, whose extent becomes the window.
    fn retention_window(
        &mut self,
        hit: &Ms1Hit,
        precursor: &ChemicalFormula,
        rule_tolerance: Option<f64>,
        result: &mut IdentificationResult,
    ) -> Result<Option<RetentionWindow>, IdentificationError> {
        if let Some((lower, upper)) = hit.rt_bounds() {
            return Ok(Some(RetentionWindow::new(lower, upper)));
        }
        let config = &self.context.config;
        let distribution = self.model.isotope_distribution(precursor, config.max_isotope, 0)?;
        let search = RetentionWindow::around(hit.retention_time, self.context.rt_tolerance(rule_tolerance));
        let params = PeakSearchParams::new(
            hit.mz,
            hit.charge,
            distribution.clone(),
            config.ms1_tolerance.to_tolerance(),
        )
        .with_must_match(distribution)
        .with_min_isotopes(config.min_isotopes_required)
        .with_smoothing(config.smoothing)
        .with_ms_level(1)
        .with_retention_window(search);

        let found = self.peak_finder().find_peaks(&params)?;
        let probe = found
            .nearest_cluster(hit.retention_time)
            .and_then(|c| found.monoisotopic(c))
            .copied();
        match probe {
            Some(probe) => {
                result.ms1_probe = Some(probe);
                Ok(Some(RetentionWindow::new(probe.rt_lower, probe.rt_upper)))
            }
            None => {
                trace!(
                    "No MS1 peak for {} at {:0.4} near {:0.3}",
                    hit.id,
                    hit.mz,
                    hit.retention_time
                );
                Ok(None)
            }
        }
    }

    fn observe_fragments(
        &mut self,
        hit: &Ms1Hit,
        precursor: &ChemicalFormula,
        rules: &RuleSet,
        arena: &CombinationArena,
        window: RetentionWindow,
        result: &mut IdentificationResult,
    ) -> Result<ObservedFragments, IdentificationError> {
        let mut observed = ObservedFragments::new();
        for def in rules.get_head_fragments() {
            let formula = def.formula.resolve(precursor, None);
            let (mz, area) = self.measure(hit, def, None, &formula, window, result)?;
            observed.push(FragmentObservation::head(&def.name, mz, area));
        }
        for chain in arena.distinct_chains() {
            let chain_formula = chain.formula();
            for def in rules.get_chain_fragments() {
                let formula = def.formula.resolve(precursor, Some(&chain_formula));
                let (mz, area) = self.measure(hit, def, Some(chain), &formula, window, result)?;
                observed.push(FragmentObservation::chain(&def.name, chain, mz, area));
            }
        }
        Ok(observed)
    }

    /// The m/z and area of one fragment ion. Unformable fragments are recorded and count as absent.
    fn measure(
        &self,
        hit: &Ms1Hit,
        def: &FragmentDefinition,
        chain: Option<FattyAcid>,
        formula: &ChemicalFormula,
        window: RetentionWindow,
        result: &mut IdentificationResult,
    ) -> Result<(Option<f64>, f64), IdentificationError> {
        if !formula.is_valid() {
            result
                .ledger
                .discard(&def.name, chain, DiscardReason::NegativeStoichiometry);
            return Ok((None, 0.0));
        }
        let config = &self.context.config;
        let mz = mass_to_mz(self.model.mass(formula)?, def.charge);
        let tolerance = def
            .tolerance
            .map(Tolerance::Da)
            .unwrap_or_else(|| config.fragment_tolerance.to_tolerance());
        let params = PeakSearchParams::single_isotope(mz, def.charge, tolerance)
            .with_retention_window(window)
            .with_precursor(hit.mz, config.precursor_isolation)
            .with_smoothing(config.smoothing)
            .with_ms_level(def.ms_level);
        let found = self.peak_finder().find_peaks(&params)?;
        Ok((Some(mz), area_near(&found, hit.retention_time)))
    }
}

/// A single-shot identification of one hit.
///
/// # Note
/// When identifying many hits, create a [`LipidIdentifier`] and call its methods instead, so
/// that isotopic patterns are cached for the lifetime of that instance.
pub fn identify<P: ScanProvider + ?Sized>(
    context: &AnalysisContext,
    provider: &P,
    rules: &RuleRepository,
    hit: &Ms1Hit,
) -> IdentificationResult {
    LipidIdentifier::new(context, provider, rules).identify_hit(hit)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chromatogram::{CachedScan, InMemoryScanCache};
    use crate::config::AnalysisConfig;
    use crate::rules::MemoryRuleSource;

    fn context() -> AnalysisContext {
        AnalysisContext::with_default_table(AnalysisConfig::default()).unwrap()
    }

    fn hit() -> Ms1Hit {
        Ms1Hit::new("h1", "PC", "H", 760.5851, 10.0, 1, "C42H82NO8P".parse().unwrap())
    }

    #[test]
    fn test_unknown_adduct() {
        let context = context();
        let scans = InMemoryScanCache::default();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let mut identifier = LipidIdentifier::new(&context, &scans, &rules);
        let result = identifier.identify(&hit(), "PC", "Xe");
        assert_eq!(result.state, IdentificationState::NoMsnPresent);
        assert_eq!(result.classification, Classification::NotFound);
        assert!(matches!(result.ledger.entries[0], Diagnostic::UnknownAdduct(_)));
        assert_eq!(rules.compilations(), 0);
    }

    #[test]
    fn test_charge_checked_against_adduct() {
        let context = context();
        let scans = InMemoryScanCache::default();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let mut identifier = LipidIdentifier::new(&context, &scans, &rules);

        let result = identifier.identify(&hit(), "PC", "-H");
        assert_eq!(result.classification, Classification::NotFound);
        assert_eq!(
            result.ledger.entries,
            vec![Diagnostic::ChargeMismatch { hit: 1, adduct: -1 }]
        );

        let mut neutral = hit();
        neutral.charge = 0;
        let result = identifier.identify_hit(&neutral);
        assert_eq!(result.state, IdentificationState::NoMsnPresent);
        assert_eq!(
            result.ledger.entries,
            vec![Diagnostic::ChargeMismatch { hit: 0, adduct: 1 }]
        );
        assert_eq!(rules.compilations(), 0);
    }

    #[test]
    fn test_missing_rules_with_bounds() {
        let context = context();
        let scans: InMemoryScanCache = (0..20)
            .map(|i| CachedScan::from_arrays(9.0 + i as f64 * 0.1, 2, Some(760.59), &[184.07], &[100.0]).unwrap())
            .collect();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let hit = hit().with_rt_bounds(9.5, 10.5);
        let result = identify(&context, &scans, &rules, &hit);
        assert_eq!(result.state, IdentificationState::NoMsnPresent);
        assert_eq!(result.classification, Classification::Ms1Only);
        assert!(matches!(result.ledger.entries[0], Diagnostic::RuleSetUnavailable(_)));
        assert_eq!(result.retention_window, Some(RetentionWindow::new(9.5, 10.5)));
    }

    #[test]
    fn test_unconfirmed_precursor() {
        let context = context();
        let scans: InMemoryScanCache = (0..20)
            .map(|i| CachedScan::from_arrays(9.0 + i as f64 * 0.1, 1, None, &[500.0], &[100.0]).unwrap())
            .collect();
        let rules = RuleRepository::new(MemoryRuleSource::new());
        let result = identify(&context, &scans, &rules, &hit());
        assert_eq!(result.classification, Classification::NotFound);
        assert_eq!(result.state, IdentificationState::NoMsnPresent);
        assert_eq!(result.ledger.entries, vec![Diagnostic::Ms1NotConfirmed]);
        assert!(result.retention_window.is_none());
    }
}
