use rayon::prelude::*;

use mzlipid::adduct::Adduct;
use mzlipid::isotopic_model::{compute_isotope_distribution, isotopic_shift, mass_to_mz};
use mzlipid::scoring::{Diagnostic, PositionAssignment, Violation};
use mzlipid::{
    AnalysisConfig, AnalysisContext, CachedScan, ChemicalFormula, Classification,
    IdentificationResult, IdentificationState, InMemoryScanCache, LipidIdentifier,
    MemoryRuleSource, Ms1Hit, RuleRepository, SumComposition,
};

const PC_RULES: &str = "\
[GENERAL]
AmountOfChains=2
ChainCutoff=10%
RetentionTimeTolerance=0.5

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

const POSITION_RULES: &str = "
[POSITION]
!INTENSITIES
Equation=NL_FA[2]>NL_FA[1] mandatory=false
";

const PG_BROKEN: &str = "\
[GENERAL]
AmountOfChains=2

[HEAD]
!FRAGMENTS
Name=Head_PG Formula=C3H9O6P Charge=1 mandatory=true
!INTENSITIES
Equation=Head_PG>>$BASEPEAK mandatory=true
";

const APEX: f64 = 10.0;
const SIGMA: f64 = 0.05;

fn gaussian(t: f64, center: f64, sigma: f64, area: f64) -> f64 {
    let height = area / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    height * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp()
}

fn context() -> AnalysisContext {
    AnalysisContext::with_default_table(AnalysisConfig::default()).unwrap()
}

fn pc_hit() -> Ms1Hit {
    let context = context();
    let formula: ChemicalFormula = "C42H82NO8P".parse().unwrap();
    let adduct: Adduct = "H".parse().unwrap();
    let mz = adduct.ion_mz(&context.element_table, &formula).unwrap();
    Ms1Hit::new("PC 34:1", "PC", "H", mz, APEX, 1, formula).with_sum_composition(SumComposition::new(34, 1))
}

fn fragment_mz(context: &AnalysisContext, formula: &ChemicalFormula) -> f64 {
    mass_to_mz(formula.mass(&context.element_table).unwrap(), 1)
}

fn head_mz(context: &AnalysisContext) -> f64 {
    fragment_mz(context, &"C5H15NO4P".parse().unwrap())
}

fn neutral_loss_mz(context: &AnalysisContext, hit: &Ms1Hit, chain: &str) -> f64 {
    let adduct: Adduct = hit.adduct.parse().unwrap();
    let precursor = adduct.ion_formula(&hit.formula);
    let chain: mzlipid::scoring::FattyAcid = chain.parse().unwrap();
    fragment_mz(context, &(&precursor - &chain.formula()))
}

/// MS1 scans carrying the precursor's isotopic envelope and MS2 scans of that precursor
/// carrying `fragments`, all eluting at the same apex.
fn synthetic_run(context: &AnalysisContext, hit: &Ms1Hit, ms1_area: f64, fragments: &[(f64, f64)]) -> InMemoryScanCache {
    let adduct: Adduct = hit.adduct.parse().unwrap();
    let precursor = adduct.ion_formula(&hit.formula);
    let dist = compute_isotope_distribution(&context.element_table, &precursor, 3, 0).unwrap();
    let isotope_mzs: Vec<f64> = (0..dist.len())
        .map(|i| hit.mz + i as f64 * isotopic_shift(hit.charge))
        .collect();
    let mut fragments = fragments.to_vec();
    fragments.sort_by(|a, b| a.0.total_cmp(&b.0));
    let fragment_mzs: Vec<f64> = fragments.iter().map(|f| f.0).collect();

    let mut scans = Vec::new();
    for i in 0..=100 {
        let t = 9.0 + i as f64 * 0.02;
        let mono = gaussian(t, APEX, SIGMA, ms1_area);
        let intensities: Vec<f32> = (0..dist.len()).map(|k| (mono * dist.ratio(k)) as f32).collect();
        scans.push(CachedScan::from_arrays(t, 1, None, &isotope_mzs, &intensities).unwrap());

        let t2 = t + 0.01;
        let intensities: Vec<f32> = fragments
            .iter()
            .map(|(_, area)| gaussian(t2, APEX, SIGMA, *area) as f32)
            .collect();
        scans.push(CachedScan::from_arrays(t2, 2, Some(hit.mz), &fragment_mzs, &intensities).unwrap());
    }
    InMemoryScanCache::new(scans)
}

fn repository(pc_rules: &str) -> RuleRepository {
    RuleRepository::new(
        MemoryRuleSource::new()
            .with_rules("PC", "H", pc_rules)
            .with_rules("PG", "Na", PG_BROKEN),
    )
}

fn identify(scans: &InMemoryScanCache, rules: &RuleRepository, hit: &Ms1Hit) -> IdentificationResult {
    let context = context();
    let mut identifier = LipidIdentifier::new(&context, scans, rules);
    identifier.identify_hit(hit)
}

#[test_log::test]
fn test_resolved_structure() {
    let context = context();
    let hit = pc_hit();
    let fragments = [
        (head_mz(&context), 1e6),
        (neutral_loss_mz(&context, &hit, "16:0"), 1e5),
        (neutral_loss_mz(&context, &hit, "18:1"), 3e5),
    ];
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let rules = repository(&format!("{PC_RULES}{POSITION_RULES}"));
    let result = identify(&scans, &rules, &hit);

    assert_eq!(result.state, IdentificationState::FragmentsDetected);
    assert_eq!(result.classification, Classification::PositionCorrect);
    assert!(!result.false_positive);
    let probe = result.ms1_probe.expect("confirmed precursor");
    assert!((probe.apex_time - APEX).abs() < 0.03);
    let window = result.retention_window.unwrap();
    assert!(window.contains(APEX));

    let leading: Vec<_> = result.leading_candidates().collect();
    assert_eq!(leading.len(), 1);
    assert_eq!(leading[0].label, "16:0_18:1");
    assert!((leading[0].share - 1.0).abs() < 1e-9);
    assert_eq!(
        leading[0].positions,
        PositionAssignment::Resolved(vec!["16:0".parse().unwrap(), "18:1".parse().unwrap()])
    );

    let head = result.fragments.iter().find(|f| f.name == "Head_184").unwrap();
    assert!(head.detected);
    assert!((head.area - 1e6).abs() / 1e6 < 0.05, "{}", head.area);
    assert!(result.total_share() <= 1.0 + 1e-12);
}

#[test]
fn test_order_ambiguous_combinations() {
    let context = context();
    let hit = pc_hit();
    let mut fragments = vec![(head_mz(&context), 1e6)];
    for chain in ["16:0", "18:1", "16:1", "18:0"] {
        fragments.push((neutral_loss_mz(&context, &hit, chain), 2e5));
    }
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let rules = repository(PC_RULES);
    let result = identify(&scans, &rules, &hit);

    assert_eq!(result.state, IdentificationState::FragmentsDetected);
    assert_eq!(result.classification, Classification::ChainFound);
    let labels: Vec<&str> = result.leading_candidates().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["16:0_18:1", "16:1_18:0"]);
    for candidate in result.leading_candidates() {
        assert!(!candidate.positions.is_resolved());
        assert_eq!(candidate.positions.orderings().len(), 2);
    }
    assert!(result.total_share() <= 1.0 + 1e-9);
}

#[test]
fn test_unparseable_rules_degrade_one_pair() {
    let context = context();
    let hit = pc_hit();
    let fragments = [
        (head_mz(&context), 1e6),
        (neutral_loss_mz(&context, &hit, "16:0"), 1e5),
        (neutral_loss_mz(&context, &hit, "18:1"), 3e5),
    ];
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let rules = repository(PC_RULES);

    let pg = Ms1Hit::new("PG 34:1", "PG", "Na", 771.5, APEX, 1, "C40H77O10P".parse().unwrap())
        .with_rt_bounds(9.8, 10.2);
    let degraded = identify(&scans, &rules, &pg);
    assert_eq!(degraded.state, IdentificationState::NoMsnPresent);
    assert_eq!(degraded.classification, Classification::Ms1Only);
    assert!(matches!(&degraded.ledger.entries[0], Diagnostic::RuleSetUnavailable(e) if e.contains("PG")));
    assert!(rules.load_rules("PG", "Na").is_err());

    let result = identify(&scans, &rules, &hit);
    assert_eq!(result.state, IdentificationState::FragmentsDetected);
    assert!(result.classification >= Classification::ChainFound);
}

#[test]
fn test_missing_head_discards() {
    let context = context();
    let hit = pc_hit();
    let fragments = [
        (neutral_loss_mz(&context, &hit, "16:0"), 1e5),
        (neutral_loss_mz(&context, &hit, "18:1"), 3e5),
    ];
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let result = identify(&scans, &repository(PC_RULES), &hit);
    assert_eq!(result.state, IdentificationState::DiscardHit);
    assert!(result.false_positive);
    assert!(result.leading.is_empty());
    assert!(result
        .ledger
        .violations()
        .any(|v| matches!(v, Violation::MissingHeadFragment { fragment } if fragment == "Head_184")));
}

#[test]
fn test_head_without_chains() {
    let context = context();
    let hit = pc_hit();
    let scans = synthetic_run(&context, &hit, 1e7, &[(head_mz(&context), 1e6)]);
    let rules = repository(PC_RULES);
    let result = identify(&scans, &rules, &hit);
    assert_eq!(result.state, IdentificationState::HeadGroupDetected);
    assert!(result.leading.is_empty());

    let silent = synthetic_run(&context, &hit, 1e7, &[]);
    let result = identify(&silent, &rules, &hit);
    assert_eq!(result.state, IdentificationState::NoMsnPresent);
    assert_eq!(result.classification, Classification::Ms1Only);
    assert!(!result.false_positive);
}

#[test]
fn test_identification_is_repeatable() {
    let context = context();
    let hit = pc_hit();
    let mut fragments = vec![(head_mz(&context), 1e6)];
    for chain in ["16:0", "18:1", "16:1", "18:0"] {
        fragments.push((neutral_loss_mz(&context, &hit, chain), 2e5));
    }
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let rules = repository(PC_RULES);
    let mut identifier = LipidIdentifier::new(&context, &scans, &rules);
    let first = identifier.identify_hit(&hit);
    let second = identifier.identify_hit(&hit);
    assert_eq!(first, second);
}

#[cfg(feature = "serde")]
#[test]
fn test_result_serialization() {
    let context = context();
    let hit = pc_hit();
    let fragments = [
        (head_mz(&context), 1e6),
        (neutral_loss_mz(&context, &hit, "16:0"), 1e5),
        (neutral_loss_mz(&context, &hit, "18:1"), 3e5),
    ];
    let scans = synthetic_run(&context, &hit, 1e7, &fragments);
    let result = identify(&scans, &repository(PC_RULES), &hit);
    let text = serde_json::to_string(&result).unwrap();
    let parsed: IdentificationResult = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, result);
}

#[test]
fn test_rules_compile_once_under_rayon() {
    let context = context();
    let hit = pc_hit();
    let scans = synthetic_run(&context, &hit, 1e7, &[(head_mz(&context), 1e6)]);
    let rules = repository(PC_RULES);
    let hits: Vec<Ms1Hit> = (0..32)
        .map(|i| {
            let mut h = hit.clone();
            h.id = format!("hit-{i}");
            h
        })
        .collect();
    let states: Vec<IdentificationState> = hits
        .par_iter()
        .map_init(
            || LipidIdentifier::new(&context, &scans, &rules),
            |identifier, hit| identifier.identify_hit(hit).state,
        )
        .collect();
    assert!(states.iter().all(|s| *s == IdentificationState::HeadGroupDetected));
    assert_eq!(rules.compilations(), 1);
}
