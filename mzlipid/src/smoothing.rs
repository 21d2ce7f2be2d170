//! Smoothing of extracted intensity traces
use mzpeaks::feature::Feature;
use mzpeaks::{Time, MZ};
use mzsignal::feature_statistics::FeatureTransform;

/// An extracted ion trace over retention time
pub type TraceFeature = Feature<MZ, Time>;

/// A moving average of `window` points, applied `repeats` times.
/// A window or repeat count of zero leaves the signal unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmoothingConfig {
    pub window: usize,
    pub repeats: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 1,
            repeats: 1,
        }
    }
}

impl SmoothingConfig {
    pub fn new(window: usize, repeats: usize) -> Self {
        Self { window, repeats }
    }

    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn is_identity(&self) -> bool {
        self.window == 0 || self.repeats == 0
    }

    /// Smooth the intensities of `feature` in place
    pub fn apply(&self, feature: &mut TraceFeature) {
        if self.is_identity() || feature.is_empty() {
            return;
        }
        for _ in 0..self.repeats {
            feature.smooth(self.window);
        }
    }
}

#[cfg(test)]
mod test {
    use mzpeaks::feature::TimeArray;

    use super::*;

    fn spike() -> TraceFeature {
        [0.0f32, 0.0, 0.0, 9.0, 0.0, 0.0, 0.0]
            .into_iter()
            .enumerate()
            .map(|(i, z)| (500.0, i as f64 * 0.1, z))
            .collect()
    }

    #[test]
    fn test_smoothing() {
        let raw = spike();
        let mut smoothed = raw.clone();
        SmoothingConfig::new(1, 1).apply(&mut smoothed);
        assert_eq!(smoothed.len(), raw.len());
        assert_eq!(smoothed.time_view(), raw.time_view());

        let ints = smoothed.intensity_view();
        assert!(ints[3] < 9.0);
        assert!(ints[2] > 0.0 && ints[4] > 0.0);
        let apex = ints
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(apex, Some(3));

        let mut twice = raw.clone();
        SmoothingConfig::new(1, 2).apply(&mut twice);
        assert!(twice.intensity_view()[3] <= ints[3]);
    }

    #[test]
    fn test_identity() {
        let raw = spike();
        for config in [SmoothingConfig::none(), SmoothingConfig::new(0, 3), SmoothingConfig::new(2, 0)] {
            let mut copy = raw.clone();
            config.apply(&mut copy);
            assert_eq!(copy.intensity_view(), raw.intensity_view());
        }
        let mut empty = TraceFeature::empty();
        SmoothingConfig::default().apply(&mut empty);
        assert!(empty.is_empty());
    }
}
