/*! Access to extracted ion chromatograms over a run's cached scans */
use mzpeaks::{prelude::*, CentroidPeak, MZPeakSetType, Tolerance};
use thiserror::Error;

/// A single (time, intensity) sample of an extracted ion chromatogram
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracePoint {
    pub time: f64,
    pub intensity: f64,
}

impl TracePoint {
    pub fn new(time: f64, intensity: f64) -> Self {
        Self { time, intensity }
    }
}

/// A request for an intensity trace around a single m/z
#[derive(Debug, Clone, Copy)]
pub struct TraceQuery {
    pub mz: f64,
    pub tolerance: Tolerance,
    pub rt_low: f64,
    pub rt_high: f64,
    pub ms_level: u8,
    /// Restrict to MSn scans whose precursor lies within `.1` Da of `.0`
    pub precursor: Option<(f64, f64)>,
}

impl TraceQuery {
    pub fn new(mz: f64, tolerance: Tolerance, rt_low: f64, rt_high: f64, ms_level: u8) -> Self {
        Self {
            mz,
            tolerance,
            rt_low,
            rt_high,
            ms_level,
            precursor: None,
        }
    }

    /// Build a query from explicit m/z bounds, centering on their midpoint
    pub fn from_bounds(mz_low: f64, mz_high: f64, rt_low: f64, rt_high: f64, ms_level: u8) -> Self {
        let mz = (mz_low + mz_high) / 2.0;
        let width = (mz_high - mz_low).abs() / 2.0;
        Self::new(mz, Tolerance::Da(width), rt_low, rt_high, ms_level)
    }

    pub fn with_precursor(mut self, precursor_mz: f64, isolation_tolerance: f64) -> Self {
        self.precursor = Some((precursor_mz, isolation_tolerance));
        self
    }

    pub fn mz_bounds(&self) -> (f64, f64) {
        self.tolerance.bounds(self.mz)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChromatogramAccessError {
    #[error("Invalid retention time range {low}-{high}")]
    InvalidTimeRange { low: f64, high: f64 },
    #[error("Invalid m/z query {0}")]
    InvalidMz(f64),
    #[error("Scan at {time} has {mz} m/z values but {intensity} intensities")]
    MalformedScan {
        time: f64,
        mz: usize,
        intensity: usize,
    },
    #[error("Scan cache unavailable: {0}")]
    Unavailable(String),
}

/// A source of intensity traces and spectrum availability for one LC-MS run
pub trait ScanProvider: Send + Sync {
    /// The summed intensity matching `query` in every eligible scan within its time range,
    /// in time order. Scans with no matching signal contribute a zero.
    fn intensity_trace(&self, query: &TraceQuery) -> Result<Vec<TracePoint>, ChromatogramAccessError>;

    /// Whether any spectrum of `ms_level` was acquired between `rt_low` and `rt_high`
    fn has_spectra_in_region(
        &self,
        rt_low: f64,
        rt_high: f64,
        ms_level: u8,
    ) -> Result<bool, ChromatogramAccessError>;

    /// The first and last acquisition times of the run
    fn time_range(&self) -> Option<(f64, f64)>;
}

/// A centroided spectrum and the acquisition metadata needed to build traces
#[derive(Debug, Clone)]
pub struct CachedScan {
    pub time: f64,
    pub ms_level: u8,
    pub precursor_mz: Option<f64>,
    pub peaks: MZPeakSetType<CentroidPeak>,
}

impl CachedScan {
    pub fn new(
        time: f64,
        ms_level: u8,
        precursor_mz: Option<f64>,
        peaks: MZPeakSetType<CentroidPeak>,
    ) -> Self {
        Self {
            time,
            ms_level,
            precursor_mz,
            peaks,
        }
    }

    pub fn from_arrays(
        time: f64,
        ms_level: u8,
        precursor_mz: Option<f64>,
        mz: &[f64],
        intensity: &[f32],
    ) -> Result<Self, ChromatogramAccessError> {
        if mz.len() != intensity.len() {
            return Err(ChromatogramAccessError::MalformedScan {
                time,
                mz: mz.len(),
                intensity: intensity.len(),
            });
        }
        let peaks: Vec<CentroidPeak> = mz
            .iter()
            .zip(intensity.iter())
            .enumerate()
            .map(|(i, (mz, inten))| CentroidPeak::new(*mz, *inten, i as u32))
            .collect();
        Ok(Self::new(time, ms_level, precursor_mz, MZPeakSetType::new(peaks)))
    }

    fn matches_precursor(&self, precursor: Option<(f64, f64)>) -> bool {
        match precursor {
            None => true,
            Some((target, width)) => self
                .precursor_mz
                .map(|p| (p - target).abs() <= width)
                .unwrap_or(false),
        }
    }

    fn intensity_near(&self, mz: f64, tolerance: Tolerance) -> f64 {
        self.peaks
            .all_peaks_for(mz, tolerance)
            .iter()
            .map(|p| p.intensity() as f64)
            .sum()
    }
}

/// Holds every scan of a run in memory, sorted by acquisition time
#[derive(Debug, Clone, Default)]
pub struct InMemoryScanCache {
    scans: Vec<CachedScan>,
}

impl InMemoryScanCache {
    pub fn new(mut scans: Vec<CachedScan>) -> Self {
        scans.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { scans }
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CachedScan> {
        self.scans.iter()
    }

    pub fn push(&mut self, scan: CachedScan) {
        let i = self.scans.partition_point(|s| s.time <= scan.time);
        self.scans.insert(i, scan);
    }

    fn scans_between(&self, rt_low: f64, rt_high: f64) -> &[CachedScan] {
        let start = self.scans.partition_point(|s| s.time < rt_low);
        let end = self.scans.partition_point(|s| s.time <= rt_high);
        &self.scans[start..end.max(start)]
    }
}

fn check_range(rt_low: f64, rt_high: f64) -> Result<(), ChromatogramAccessError> {
    if rt_low.is_nan() || rt_high.is_nan() || rt_low > rt_high {
        Err(ChromatogramAccessError::InvalidTimeRange {
            low: rt_low,
            high: rt_high,
        })
    } else {
        Ok(())
    }
}

impl FromIterator<CachedScan> for InMemoryScanCache {
    fn from_iter<T: IntoIterator<Item = CachedScan>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl ScanProvider for InMemoryScanCache {
    fn intensity_trace(&self, query: &TraceQuery) -> Result<Vec<TracePoint>, ChromatogramAccessError> {
        check_range(query.rt_low, query.rt_high)?;
        if !query.mz.is_finite() || query.mz <= 0.0 {
            return Err(ChromatogramAccessError::InvalidMz(query.mz));
        }
        let trace = self
            .scans_between(query.rt_low, query.rt_high)
            .iter()
            .filter(|s| s.ms_level == query.ms_level && s.matches_precursor(query.precursor))
            .map(|s| TracePoint::new(s.time, s.intensity_near(query.mz, query.tolerance)))
            .collect();
        Ok(trace)
    }

    fn has_spectra_in_region(
        &self,
        rt_low: f64,
        rt_high: f64,
        ms_level: u8,
    ) -> Result<bool, ChromatogramAccessError> {
        check_range(rt_low, rt_high)?;
        Ok(self
            .scans_between(rt_low, rt_high)
            .iter()
            .any(|s| s.ms_level == ms_level))
    }

    fn time_range(&self) -> Option<(f64, f64)> {
        match (self.scans.first(), self.scans.last()) {
            (Some(first), Some(last)) => Some((first.time, last.time)),
            _ => None,
        }
    }
}
