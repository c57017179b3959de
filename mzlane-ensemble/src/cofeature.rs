//! Correlation-based grouping of mass lanes.
//!
//! A reference [`FeaturePointer`] defines a scan window. Every lane whose apex inside
//! that window clears an intensity floor becomes a candidate, and candidates whose
//! intensity trace correlates with the reference's trace, over the scans where both
//! are non-zero, are reported as cofeatures. Matching against a second array resamples
//! the reference onto that array's retention time grid first.
use tracing::{debug, trace};

use mzlane::{FeaturePointer, SparseScanArray};

use crate::correlation::{interpolate_linear, normalize_to_max, pearson_nonzero, MIN_OVERLAP};
use crate::error::EnsembleError;

/// Thresholds that govern cofeature matching
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CofeatureParameters {
    /// The correlation an MS1 lane must exceed to match
    pub ms1_correlation_threshold: f64,
    /// The correlation an MS2 lane must exceed to match
    pub ms2_correlation_threshold: f64,
    /// A candidate lane's apex inside the window must exceed this
    pub min_intensity: f32,
    /// Scale every trace to its own maximum before comparison
    pub use_relative_intensity: bool,
    /// The fewest jointly non-zero scans a correlation is computed over
    pub min_overlap: usize,
}

impl Default for CofeatureParameters {
    fn default() -> Self {
        Self {
            ms1_correlation_threshold: 0.9,
            ms2_correlation_threshold: 0.9,
            min_intensity: 1000.0,
            use_relative_intensity: true,
            min_overlap: MIN_OVERLAP,
        }
    }
}

impl CofeatureParameters {
    pub fn ms1_matcher(&self) -> CofeatureMatcher {
        CofeatureMatcher::new(
            self.ms1_correlation_threshold,
            self.min_intensity,
            self.use_relative_intensity,
        )
        .with_min_overlap(self.min_overlap)
    }

    pub fn ms2_matcher(&self) -> CofeatureMatcher {
        CofeatureMatcher::new(
            self.ms2_correlation_threshold,
            self.min_intensity,
            self.use_relative_intensity,
        )
        .with_min_overlap(self.min_overlap)
    }
}

/// Finds lanes whose intensity traces correlate with a reference pointer's trace
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CofeatureMatcher {
    pub min_correlation: f64,
    pub min_intensity: f32,
    pub use_relative_intensity: bool,
    pub min_overlap: usize,
}

impl CofeatureMatcher {
    pub fn new(min_correlation: f64, min_intensity: f32, use_relative_intensity: bool) -> Self {
        Self {
            min_correlation,
            min_intensity,
            use_relative_intensity,
            min_overlap: MIN_OVERLAP,
        }
    }

    pub fn with_min_overlap(mut self, min_overlap: usize) -> Self {
        self.min_overlap = min_overlap;
        self
    }

    /// Lanes of `array` whose apex over `scans` exceeds the intensity floor
    fn candidate_lanes(&self, array: &SparseScanArray, scans: &[usize]) -> Vec<usize> {
        array
            .intensity_columns()
            .row_max(scans)
            .into_iter()
            .enumerate()
            .filter(|(_, v)| *v > self.min_intensity)
            .map(|(i, _)| i)
            .collect()
    }

    fn prepare(&self, values: impl Iterator<Item = f64>) -> Vec<f64> {
        let mut values: Vec<f64> = values.collect();
        if self.use_relative_intensity {
            normalize_to_max(&mut values);
        }
        values
    }

    /// Correlate each candidate lane's trace over `window` against `reference`, keeping
    /// those lanes that exceed the correlation threshold
    fn correlated_lanes(
        &self,
        array: &SparseScanArray,
        candidates: &[usize],
        window: std::ops::Range<usize>,
        reference: &[f64],
    ) -> Vec<usize> {
        let matrix = array.intensity_matrix();
        candidates
            .iter()
            .copied()
            .filter(|lane| {
                let row = self.prepare(
                    matrix
                        .row_dense(*lane, window.clone())
                        .into_iter()
                        .map(|v| v as f64),
                );
                let r = pearson_nonzero(reference, &row, self.min_overlap);
                trace!("Lane {lane} correlation {r:?}");
                matches!(r, Some(r) if r > self.min_correlation)
            })
            .collect()
    }

    /// Find the lanes of `array` that co-vary with `reference` over its window.
    ///
    /// The reference is always the first pointer in the result, and its own lane is
    /// never repeated. Every match shares the reference's scan indices.
    pub fn match_within(
        &self,
        array: &SparseScanArray,
        reference: &FeaturePointer,
    ) -> Result<Vec<FeaturePointer>, EnsembleError> {
        reference.validate(array)?;
        let scans = reference.scans();
        let window = reference.window();

        let candidates = self.candidate_lanes(array, scans);
        let ref_trace = self.prepare(
            reference
                .intensity_values(array)?
                .into_iter()
                .map(|v| v as f64),
        );

        let mut matches = vec![reference.clone()];
        for lane in self.correlated_lanes(array, &candidates, window, &ref_trace) {
            if lane == reference.lane() {
                continue;
            }
            matches.push(array.make_feature_pointer(lane, Some(scans.to_vec()))?);
        }
        debug!(
            "Matched {} cofeatures to lane {} from {} candidates",
            matches.len() - 1,
            reference.lane(),
            candidates.len()
        );
        Ok(matches)
    }

    /// Find the lanes of `target` that co-vary with `reference`, which belongs to `source`.
    ///
    /// The reference's retention time span selects the target scans, and the reference
    /// trace is linearly resampled onto their retention times before correlating. The
    /// reference itself is not part of the result. A span that covers no target scan
    /// yields no matches.
    pub fn match_across(
        &self,
        source: &SparseScanArray,
        target: &SparseScanArray,
        reference: &FeaturePointer,
    ) -> Result<Vec<FeaturePointer>, EnsembleError> {
        let source_times = reference.retention_times(source)?;
        let (rt_start, rt_end) = match (source_times.first(), source_times.last()) {
            (Some(a), Some(b)) => (*a, *b),
            _ => return Ok(Vec::new()),
        };
        let span = target.scan_span(Some((rt_start, rt_end)));
        if span.is_empty() {
            debug!("No target scans between {rt_start:0.3} and {rt_end:0.3}");
            return Ok(Vec::new());
        }
        let target_scans: Vec<usize> = span.clone().collect();
        let target_times = &target.retention_times()[span.clone()];

        let source_trace: Vec<f64> = reference
            .intensity_values(source)?
            .into_iter()
            .map(|v| v as f64)
            .collect();
        let resampled = interpolate_linear(&source_times, &source_trace, target_times);
        let ref_trace = self.prepare(resampled.into_iter());

        let candidates = self.candidate_lanes(target, &target_scans);
        let mut matches = Vec::new();
        for lane in self.correlated_lanes(target, &candidates, span, &ref_trace) {
            matches.push(target.make_feature_pointer(lane, Some(target_scans.clone()))?);
        }
        debug!(
            "Matched {} cross-array cofeatures to lane {} from {} candidates",
            matches.len(),
            reference.lane(),
            candidates.len()
        );
        Ok(matches)
    }
}

/// Find cofeatures of `reference` within `array`.
///
/// # See also
/// [`CofeatureMatcher::match_within`]
pub fn match_within(
    array: &SparseScanArray,
    reference: &FeaturePointer,
    min_correlation: f64,
    min_intensity: f32,
    use_relative_intensity: bool,
) -> Result<Vec<FeaturePointer>, EnsembleError> {
    CofeatureMatcher::new(min_correlation, min_intensity, use_relative_intensity)
        .match_within(array, reference)
}

/// Find cofeatures of `reference`, which belongs to `source`, within `target`.
///
/// # See also
/// [`CofeatureMatcher::match_across`]
pub fn match_across(
    source: &SparseScanArray,
    target: &SparseScanArray,
    reference: &FeaturePointer,
    min_correlation: f64,
    min_intensity: f32,
    use_relative_intensity: bool,
) -> Result<Vec<FeaturePointer>, EnsembleError> {
    CofeatureMatcher::new(min_correlation, min_intensity, use_relative_intensity)
        .match_across(source, target, reference)
}

/// Point at every lane of `array` whose apex between `rt_start` and `rt_end` exceeds
/// `min_intensity`, covering the scans nearest those two times
pub fn features_in_window(
    array: &SparseScanArray,
    rt_start: f64,
    rt_end: f64,
    min_intensity: f32,
) -> Result<Vec<FeaturePointer>, EnsembleError> {
    let a = array.retention_time_to_scan(rt_start);
    let b = array.retention_time_to_scan(rt_end);
    let scans: Vec<usize> = (a.min(b)..=a.max(b)).collect();
    let lane_max = array.intensity_columns().row_max(&scans);
    let mut pointers = Vec::new();
    for (lane, apex) in lane_max.into_iter().enumerate() {
        if apex > min_intensity {
            pointers.push(array.make_feature_pointer(lane, Some(scans.clone()))?);
        }
    }
    Ok(pointers)
}
