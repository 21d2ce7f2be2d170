/*! Isotope-consistent chromatographic peak detection.

For each isotopologue of a target ion, the [`PeakFinder`] extracts an intensity trace
from a [`ScanProvider`], smooths it, and splits it into peaks at the valleys between
prominent local maxima. Peaks from higher isotopes are grouped with the monoisotopic
peak they co-elute with, and each group is checked against the theoretical
isotopic distribution before it is reported.
*/
use std::collections::BTreeMap;

use mzpeaks::feature::{SplittableFeatureLike, TimeArray, TimeInterval};
use mzpeaks::Tolerance;
use tracing::trace;

use crate::chromatogram::{ChromatogramAccessError, ScanProvider, TracePoint, TraceQuery};
use crate::isotopic_model::{isotopic_shift, IsotopeDistribution};
use crate::smoothing::{SmoothingConfig, TraceFeature};

/// An inclusive retention time interval, in minutes
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetentionWindow {
    pub start: f64,
    pub end: f64,
}

impl RetentionWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start: start.min(end),
            end: end.max(start),
        }
    }

    pub fn around(center: f64, half_width: f64) -> Self {
        Self::new(center - half_width.abs(), center + half_width.abs())
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn widen(&self, margin: f64) -> Self {
        Self::new(self.start - margin.abs(), self.end + margin.abs())
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProbeStatus {
    #[default]
    Ok,
    /// A co-eluting neighbor or an excess of isotopic signal suggests interference
    OverlapSuspected,
    /// The isotopic ratio fell short of the theoretical expectation
    BelowThreshold,
}

/// A located and quantified chromatographic peak for one isotopologue
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Probe {
    pub mz: f64,
    pub apex_time: f64,
    pub rt_lower: f64,
    pub rt_upper: f64,
    /// Background-subtracted area, in intensity × minutes
    pub area: f64,
    pub background: f64,
    pub apex_intensity: f64,
    pub isotope_index: usize,
    pub status: ProbeStatus,
}

impl Probe {
    pub fn contains_time(&self, time: f64) -> bool {
        self.rt_lower <= time && time <= self.rt_upper
    }

    fn with_status(mut self, status: ProbeStatus) -> Self {
        self.status = status;
        self
    }
}

pub type ClusterId = usize;

/// Detected peaks keyed by isotope index, then by co-elution cluster
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeakSearchResult {
    pub isotopes: BTreeMap<usize, BTreeMap<ClusterId, Vec<Probe>>>,
}

impl PeakSearchResult {
    /// `true` if no peak was found
    pub fn is_empty(&self) -> bool {
        self.isotopes.values().all(|c| c.values().all(|p| p.is_empty()))
    }

    pub fn get(&self, isotope_index: usize) -> Option<&BTreeMap<ClusterId, Vec<Probe>>> {
        self.isotopes.get(&isotope_index)
    }

    /// The identifiers of every cluster with a monoisotopic peak
    pub fn cluster_ids(&self) -> Vec<ClusterId> {
        self.isotopes
            .get(&0)
            .map(|c| c.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn monoisotopic(&self, cluster: ClusterId) -> Option<&Probe> {
        self.isotopes.get(&0)?.get(&cluster)?.first()
    }

    /// Every probe in `cluster` ordered by isotope index
    pub fn cluster(&self, cluster: ClusterId) -> Vec<&Probe> {
        self.isotopes
            .values()
            .filter_map(|c| c.get(&cluster))
            .flatten()
            .collect()
    }

    /// The number of distinct isotopes observed in `cluster`
    pub fn isotope_count(&self, cluster: ClusterId) -> usize {
        self.isotopes
            .values()
            .filter(|c| c.get(&cluster).is_some_and(|p| !p.is_empty()))
            .count()
    }

    /// The cluster whose monoisotopic apex is closest to `time`, preferring the earlier
    /// cluster on ties
    pub fn nearest_cluster(&self, time: f64) -> Option<ClusterId> {
        self.isotopes.get(&0)?.iter().fold(None, |best, (id, probes)| {
            let Some(p) = probes.first() else {
                return best;
            };
            let d = (p.apex_time - time).abs();
            match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((*id, d)),
            }
        }).map(|(id, _)| id)
    }

    pub fn probes(&self) -> impl Iterator<Item = &Probe> {
        self.isotopes.values().flat_map(|c| c.values()).flatten()
    }

    pub fn len(&self) -> usize {
        self.probes().count()
    }
}

/// Tuning parameters for peak detection, independent of the target
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PeakFinderConfig {
    /// How far beyond the retention window to read the trace, in minutes
    pub rt_margin: f64,
    /// Peaks whose smoothed apex falls below this fraction of the strongest apex are dropped
    pub min_relative_intensity: f64,
    /// Maxima whose prominence is below this fraction of their height are not peaks
    pub min_prominence_ratio: f64,
    /// The relative deviation from the theoretical isotope ratio that is accepted
    pub ratio_tolerance: f64,
    /// A valley above this fraction of the lower neighboring apex marks both peaks as overlapping
    pub overlap_valley_ratio: f64,
    /// The quantile of the raw trace used as the background level
    pub background_quantile: f64,
}

impl Default for PeakFinderConfig {
    fn default() -> Self {
        Self {
            rt_margin: 0.5,
            min_relative_intensity: 0.05,
            min_prominence_ratio: 0.1,
            ratio_tolerance: 0.5,
            overlap_valley_ratio: 0.5,
            background_quantile: 0.1,
        }
    }
}

/// The target of a single peak search
#[derive(Debug, Clone)]
pub struct PeakSearchParams {
    pub target_mz: f64,
    pub charge: i32,
    pub retention_window: Option<RetentionWindow>,
    /// When present, observed isotope area ratios must agree with this distribution
    pub must_match_distribution: Option<IsotopeDistribution>,
    /// Its length is the number of isotopes searched
    pub full_distribution: IsotopeDistribution,
    pub min_isotopes_required: usize,
    pub smoothing: SmoothingConfig,
    pub tolerance: Tolerance,
    pub ms_level: u8,
    pub precursor: Option<(f64, f64)>,
}

impl PeakSearchParams {
    pub fn new(target_mz: f64, charge: i32, full_distribution: IsotopeDistribution, tolerance: Tolerance) -> Self {
        Self {
            target_mz,
            charge,
            retention_window: None,
            must_match_distribution: None,
            full_distribution,
            min_isotopes_required: 1,
            smoothing: SmoothingConfig::default(),
            tolerance,
            ms_level: 1,
            precursor: None,
        }
    }

    /// Search only the monoisotopic peak, as for fragment ions
    pub fn single_isotope(target_mz: f64, charge: i32, tolerance: Tolerance) -> Self {
        Self::new(target_mz, charge, IsotopeDistribution::new(vec![1.0]), tolerance)
    }

    pub fn with_retention_window(mut self, window: RetentionWindow) -> Self {
        self.retention_window = Some(window);
        self
    }

    pub fn with_must_match(mut self, distribution: IsotopeDistribution) -> Self {
        self.must_match_distribution = Some(distribution);
        self
    }

    pub fn with_min_isotopes(mut self, count: usize) -> Self {
        self.min_isotopes_required = count;
        self
    }

    pub fn with_smoothing(mut self, smoothing: SmoothingConfig) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_ms_level(mut self, ms_level: u8) -> Self {
        self.ms_level = ms_level;
        self
    }

    pub fn with_precursor(mut self, precursor_mz: f64, isolation_tolerance: f64) -> Self {
        self.precursor = Some((precursor_mz, isolation_tolerance));
        self
    }

    fn isotope_mz(&self, isotope_index: usize) -> f64 {
        self.target_mz + isotope_index as f64 * isotopic_shift(self.charge)
    }
}

fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let idx = (q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64).floor() as usize;
    sorted[idx]
}

fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    (0..n)
        .filter(|&i| {
            let x = signal[i];
            let left = if i == 0 { f64::NEG_INFINITY } else { signal[i - 1] };
            let right = if i + 1 == n { f64::NEG_INFINITY } else { signal[i + 1] };
            x > 0.0 && x > left && x >= right
        })
        .collect()
}

fn prominence(signal: &[f64], apex: usize) -> f64 {
    let height = signal[apex];
    let mut left_min = height;
    for j in (0..apex).rev() {
        if signal[j] > height {
            break;
        }
        left_min = left_min.min(signal[j]);
    }
    let mut right_min = height;
    for x in signal.iter().skip(apex + 1) {
        if *x > height {
            break;
        }
        right_min = right_min.min(*x);
    }
    height - left_min.max(right_min)
}

fn argmin(signal: &[f64], start: usize, end: usize) -> usize {
    let mut best = start;
    for i in start..=end {
        if signal[i] < signal[best] {
            best = i;
        }
    }
    best
}

/// Trapezoid area of the background-subtracted trace between two indices. A peak of one
/// scan has no width to integrate over, so its net intensity is its area.
fn net_area(net: &TraceFeature, lower: usize, upper: usize) -> f64 {
    if lower == upper {
        return net.intensity_view()[lower] as f64;
    }
    net.slice(lower..=upper).area() as f64
}

/// Split one trace into peaks. Returned probes are in retention time order.
pub fn detect_peaks(
    trace: &[TracePoint],
    smoothing: &SmoothingConfig,
    config: &PeakFinderConfig,
    window: Option<&RetentionWindow>,
    mz: f64,
    isotope_index: usize,
) -> Vec<Probe> {
    if trace.is_empty() {
        return Vec::new();
    }
    // Scans sharing an acquisition time are merged into one point
    let feature: TraceFeature = trace
        .iter()
        .map(|p| (mz, p.time, p.intensity as f32))
        .collect();
    let times = feature.time_view();
    let raw: Vec<f64> = feature.intensity_view().iter().map(|z| *z as f64).collect();
    let background = quantile(&raw, config.background_quantile);
    let net: TraceFeature = times
        .iter()
        .zip(raw.iter())
        .map(|(t, z)| (mz, *t, (z - background).max(0.0) as f32))
        .collect();
    let mut smoothed_feature = feature.clone();
    smoothing.apply(&mut smoothed_feature);
    let smoothed: Vec<f64> = smoothed_feature
        .intensity_view()
        .iter()
        .map(|z| *z as f64)
        .collect();

    let mut apexes: Vec<usize> = local_maxima(&smoothed)
        .into_iter()
        .filter(|&i| prominence(&smoothed, i) >= config.min_prominence_ratio * smoothed[i])
        .collect();
    let strongest = apexes.iter().map(|&i| smoothed[i]).fold(0.0, f64::max);
    apexes.retain(|&i| smoothed[i] >= config.min_relative_intensity * strongest);
    if apexes.is_empty() {
        return Vec::new();
    }

    let n = smoothed.len();
    let mut lower = vec![0usize; apexes.len()];
    let mut upper = vec![n - 1; apexes.len()];
    let mut overlapping = vec![false; apexes.len()];
    for k in 0..apexes.len().saturating_sub(1) {
        let (a, b) = (apexes[k], apexes[k + 1]);
        let valley = argmin(&smoothed, a, b);
        upper[k] = valley;
        lower[k + 1] = valley;
        if smoothed[valley] > config.overlap_valley_ratio * smoothed[a].min(smoothed[b]) {
            overlapping[k] = true;
            overlapping[k + 1] = true;
        }
    }
    if let Some(&first) = apexes.first() {
        let mut j = first;
        while j > 0 && smoothed[j] > background {
            j -= 1;
        }
        lower[0] = j;
    }
    if let Some(&last) = apexes.last() {
        let mut j = last;
        while j + 1 < n && smoothed[j] > background {
            j += 1;
        }
        upper[apexes.len() - 1] = j;
    }

    apexes
        .iter()
        .enumerate()
        .filter_map(|(k, &apex)| {
            let apex_time = times[apex];
            if let Some(w) = window {
                if !w.contains(apex_time) {
                    return None;
                }
            }
            let area = net_area(&net, lower[k], upper[k]);
            if area <= 0.0 {
                return None;
            }
            Some(Probe {
                mz,
                apex_time,
                rt_lower: times[lower[k]],
                rt_upper: times[upper[k]],
                area,
                background,
                apex_intensity: raw[apex],
                isotope_index,
                status: if overlapping[k] {
                    ProbeStatus::OverlapSuspected
                } else {
                    ProbeStatus::Ok
                },
            })
        })
        .collect()
}

/// Searches a [`ScanProvider`] for isotope-consistent peaks
#[derive(Debug, Clone)]
pub struct PeakFinder<'a, P: ScanProvider + ?Sized> {
    pub provider: &'a P,
    pub config: PeakFinderConfig,
}

impl<'a, P: ScanProvider + ?Sized> PeakFinder<'a, P> {
    pub fn new(provider: &'a P, config: PeakFinderConfig) -> Self {
        Self { provider, config }
    }

    fn search_range(&self, params: &PeakSearchParams) -> Option<(f64, f64)> {
        match params.retention_window {
            Some(w) => {
                let w = w.widen(self.config.rt_margin);
                Some((w.start, w.end))
            }
            None => self.provider.time_range(),
        }
    }

    fn probes_for_isotope(
        &self,
        params: &PeakSearchParams,
        isotope_index: usize,
        rt_low: f64,
        rt_high: f64,
    ) -> Result<Vec<Probe>, ChromatogramAccessError> {
        let mz = params.isotope_mz(isotope_index);
        let mut query = TraceQuery::new(mz, params.tolerance, rt_low, rt_high, params.ms_level);
        query.precursor = params.precursor;
        let trace = self.provider.intensity_trace(&query)?;
        let probes = detect_peaks(
            &trace,
            &params.smoothing,
            &self.config,
            params.retention_window.as_ref(),
            mz,
            isotope_index,
        );
        trace!(
            "Isotope {isotope_index} at {mz:0.4}: {} points, {} peaks",
            trace.len(),
            probes.len()
        );
        Ok(probes)
    }

    pub fn find_peaks(&self, params: &PeakSearchParams) -> Result<PeakSearchResult, ChromatogramAccessError> {
        let Some((rt_low, rt_high)) = self.search_range(params) else {
            return Ok(PeakSearchResult::default());
        };
        let n_isotopes = params.full_distribution.len().max(1);

        let monoisotopic = self.probes_for_isotope(params, 0, rt_low, rt_high)?;
        if monoisotopic.is_empty() {
            return Ok(PeakSearchResult::default());
        }

        let mut clusters: Vec<Vec<Vec<Probe>>> = monoisotopic
            .into_iter()
            .map(|p| {
                let mut isotopes = vec![Vec::new(); n_isotopes];
                isotopes[0].push(p);
                isotopes
            })
            .collect();

        for isotope_index in 1..n_isotopes {
            for probe in self.probes_for_isotope(params, isotope_index, rt_low, rt_high)? {
                if let Some(id) = assign_cluster(&clusters, &probe) {
                    clusters[id][isotope_index].push(probe);
                }
            }
        }

        let mut result = PeakSearchResult::default();
        for (id, mut isotopes) in clusters.into_iter().enumerate() {
            let Some(mono) = isotopes[0].first().copied() else {
                continue;
            };
            for group in isotopes.iter_mut().skip(1) {
                group.sort_by(|a, b| {
                    (a.apex_time - mono.apex_time)
                        .abs()
                        .total_cmp(&(b.apex_time - mono.apex_time).abs())
                });
            }
            if let Some(expected) = params.must_match_distribution.as_ref() {
                self.check_ratios(&mut isotopes, &mono, expected);
            }
            let confirmed = isotopes
                .iter()
                .take_while(|g| g.first().is_some_and(|p| p.status != ProbeStatus::BelowThreshold))
                .count();
            if confirmed < params.min_isotopes_required {
                trace!(
                    "Dropping cluster {id} at {:0.3}, {confirmed} of {} isotopes confirmed",
                    mono.apex_time,
                    params.min_isotopes_required
                );
                continue;
            }
            for (isotope_index, group) in isotopes.into_iter().enumerate().take(confirmed + 1) {
                if !group.is_empty() {
                    result
                        .isotopes
                        .entry(isotope_index)
                        .or_default()
                        .insert(id, group);
                }
            }
        }
        Ok(result)
    }

    fn check_ratios(&self, isotopes: &mut [Vec<Probe>], mono: &Probe, expected: &IsotopeDistribution) {
        let tol = self.config.ratio_tolerance;
        for (i, group) in isotopes.iter_mut().enumerate().skip(1) {
            if i >= expected.len() {
                break;
            }
            let theoretical = expected.ratio(i);
            for probe in group.iter_mut() {
                let observed = probe.area / mono.area;
                if observed < (1.0 - tol) * theoretical {
                    *probe = probe.with_status(ProbeStatus::BelowThreshold);
                } else if observed > (1.0 + tol) * theoretical {
                    *probe = probe.with_status(ProbeStatus::OverlapSuspected);
                }
            }
        }
    }
}

/// The cluster whose monoisotopic apex falls within `probe`'s bounds, the nearest if several do
fn assign_cluster(clusters: &[Vec<Vec<Probe>>], probe: &Probe) -> Option<ClusterId> {
    let mut best: Option<(ClusterId, f64)> = None;
    for (id, isotopes) in clusters.iter().enumerate() {
        let Some(mono) = isotopes[0].first() else {
            continue;
        };
        if !probe.contains_time(mono.apex_time) {
            continue;
        }
        let d = (mono.apex_time - probe.apex_time).abs();
        match best {
            Some((_, bd)) if bd <= d => {}
            _ => best = Some((id, d)),
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chromatogram::{CachedScan, InMemoryScanCache};

    fn gaussian(t: f64, center: f64, sigma: f64, area: f64) -> f64 {
        let height = area / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        height * (-(t - center).powi(2) / (2.0 * sigma * sigma)).exp()
    }

    fn trace_of(f: impl Fn(f64) -> f64) -> Vec<TracePoint> {
        (0..=400)
            .map(|i| {
                let t = i as f64 * 0.01;
                TracePoint::new(t, f(t))
            })
            .collect()
    }

    #[test]
    fn test_single_peak_area() {
        let trace = trace_of(|t| gaussian(t, 2.0, 0.05, 1e6));
        let probes = detect_peaks(
            &trace,
            &SmoothingConfig::default(),
            &PeakFinderConfig::default(),
            None,
            500.0,
            0,
        );
        assert_eq!(probes.len(), 1);
        let p = probes[0];
        assert!((p.apex_time - 2.0).abs() < 0.011);
        assert!((p.area - 1e6).abs() / 1e6 < 0.02, "{}", p.area);
        assert!(p.rt_lower < 1.9 && p.rt_upper > 2.1);
        assert_eq!(p.status, ProbeStatus::Ok);
    }

    #[test]
    fn test_overlap_flagged_not_merged() {
        let trace = trace_of(|t| gaussian(t, 2.0, 0.08, 1e6) + gaussian(t, 2.25, 0.08, 8e5));
        let probes = detect_peaks(
            &trace,
            &SmoothingConfig::none(),
            &PeakFinderConfig::default(),
            None,
            500.0,
            0,
        );
        assert_eq!(probes.len(), 2);
        assert!(probes.iter().all(|p| p.status == ProbeStatus::OverlapSuspected));
        assert_eq!(probes[0].rt_upper, probes[1].rt_lower);

        let resolved = trace_of(|t| gaussian(t, 1.0, 0.05, 1e6) + gaussian(t, 3.0, 0.05, 8e5));
        let probes = detect_peaks(
            &resolved,
            &SmoothingConfig::none(),
            &PeakFinderConfig::default(),
            None,
            500.0,
            0,
        );
        assert_eq!(probes.len(), 2);
        assert!(probes.iter().all(|p| p.status == ProbeStatus::Ok));
    }

    #[test]
    fn test_relative_and_window_filters() {
        let trace = trace_of(|t| gaussian(t, 1.0, 0.05, 1e6) + gaussian(t, 3.0, 0.05, 1e4));
        let config = PeakFinderConfig::default();
        let probes = detect_peaks(&trace, &SmoothingConfig::none(), &config, None, 500.0, 0);
        assert_eq!(probes.len(), 1);

        let window = RetentionWindow::new(2.5, 3.5);
        let both = trace_of(|t| gaussian(t, 1.0, 0.05, 1e6) + gaussian(t, 3.0, 0.05, 5e5));
        let probes = detect_peaks(&both, &SmoothingConfig::none(), &config, Some(&window), 500.0, 0);
        assert_eq!(probes.len(), 1);
        assert!(window.contains(probes[0].apex_time));
    }

    #[test]
    fn test_single_scan_peak() {
        let trace = vec![
            TracePoint::new(1.0, 0.0),
            TracePoint::new(1.1, 0.0),
            TracePoint::new(1.2, 500.0),
            TracePoint::new(1.3, 0.0),
            TracePoint::new(1.4, 0.0),
        ];
        let probes = detect_peaks(
            &trace,
            &SmoothingConfig::none(),
            &PeakFinderConfig::default(),
            None,
            500.0,
            0,
        );
        assert_eq!(probes.len(), 1);
        assert!((probes[0].area - 50.0).abs() < 1e-3);

        let lone = vec![TracePoint::new(1.0, 500.0)];
        let probes = detect_peaks(
            &lone,
            &SmoothingConfig::none(),
            &PeakFinderConfig {
                background_quantile: 0.0,
                ..Default::default()
            },
            None,
            500.0,
            0,
        );
        assert!(probes.is_empty());
        assert!(detect_peaks(&[], &SmoothingConfig::none(), &PeakFinderConfig::default(), None, 1.0, 0).is_empty());
    }

    #[test]
    fn test_coincident_scans_merge() {
        let trace = vec![
            TracePoint::new(1.0, 0.0),
            TracePoint::new(1.1, 0.0),
            TracePoint::new(1.2, 200.0),
            TracePoint::new(1.2, 300.0),
            TracePoint::new(1.3, 0.0),
            TracePoint::new(1.4, 0.0),
        ];
        let probes = detect_peaks(
            &trace,
            &SmoothingConfig::none(),
            &PeakFinderConfig::default(),
            None,
            500.0,
            0,
        );
        assert_eq!(probes.len(), 1);
        assert_eq!(probes[0].apex_intensity, 500.0);
        assert!((probes[0].area - 50.0).abs() < 1e-3);
    }

    fn isotope_cache(ratio: f32) -> InMemoryScanCache {
        (0..=400)
            .map(|i| {
                let t = i as f64 * 0.01;
                let mono = gaussian(t, 2.0, 0.05, 1e6) as f32;
                CachedScan::from_arrays(
                    t,
                    1,
                    None,
                    &[700.0, 700.0 + isotopic_shift(1)],
                    &[mono, mono * ratio],
                )
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_isotope_clustering() {
        let expected = IsotopeDistribution::new(vec![0.6, 0.3, 0.1]);
        let cache = isotope_cache(0.5);
        let finder = PeakFinder::new(&cache, PeakFinderConfig::default());
        let params = PeakSearchParams::new(700.0, 1, expected.clone(), Tolerance::PPM(10.0))
            .with_must_match(expected.clone())
            .with_min_isotopes(2);
        let result = finder.find_peaks(&params).unwrap();
        assert_eq!(result.cluster_ids(), vec![0]);
        assert_eq!(result.isotope_count(0), 2);
        assert!(result.get(2).is_none());
        let m1 = &result.get(1).unwrap()[&0][0];
        assert_eq!(m1.status, ProbeStatus::Ok);
        assert_eq!(result.nearest_cluster(2.3), Some(0));

        let params = params.with_min_isotopes(3);
        assert!(finder.find_peaks(&params).unwrap().is_empty());
    }

    #[test]
    fn test_ratio_below_threshold() {
        let expected = IsotopeDistribution::new(vec![0.6, 0.3]);
        let cache = isotope_cache(0.1);
        let finder = PeakFinder::new(&cache, PeakFinderConfig::default());
        let params = PeakSearchParams::new(700.0, 1, expected.clone(), Tolerance::PPM(10.0))
            .with_must_match(expected.clone());
        let result = finder.find_peaks(&params).unwrap();
        let m1 = &result.get(1).unwrap()[&0][0];
        assert_eq!(m1.status, ProbeStatus::BelowThreshold);

        let strict = params.with_min_isotopes(2);
        assert!(finder.find_peaks(&strict).unwrap().is_empty());
    }
}
