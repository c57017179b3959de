//! The lane x scan signal container.
//!
//! A [`SparseScanArray`] stacks every [`MassLane`] of an acquisition into a pair of
//! compressed sparse matrices, one holding m/z and one holding intensity, that
//! share a single sparsity pattern. A column-major copy of both is kept alongside
//! for fast single-scan access.
use std::fmt::Display;
use std::ops::Range;

use tracing::debug;
use uuid::Uuid;

use crate::error::{LaneError, PointerError};
use crate::frame::SpectrumFrame;
use crate::pointer::FeaturePointer;
use crate::series::{Chromatogram, IonChromatogram, SpectrumSeries};
use crate::sparse::{CompressedColumns, CompressedRows};
use crate::tracker::{track, MassLane};

/// An inclusive `(start, end)` interval over m/z or time
pub type Bounds = (f64, f64);

/// The identity of a [`SparseScanArray`]. Every [`FeaturePointer`] records the identity
/// of the array that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayId(Uuid);

impl ArrayId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ArrayId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ArrayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lane tracing parameters for one MS level
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanArrayParameters {
    /// The largest (exclusive) m/z difference a lane may move between assignments
    pub mz_tolerance: f64,
    /// The number of consecutive unmatched scans a lane survives
    pub scan_gap_tolerance: usize,
    /// Signals at or below this intensity are ignored
    pub min_intensity: f32,
}

impl Default for ScanArrayParameters {
    fn default() -> Self {
        Self {
            mz_tolerance: 0.01,
            scan_gap_tolerance: 2,
            min_intensity: 1000.0,
        }
    }
}

impl ScanArrayParameters {
    pub fn new(mz_tolerance: f64, scan_gap_tolerance: usize, min_intensity: f32) -> Self {
        Self {
            mz_tolerance,
            scan_gap_tolerance,
            min_intensity,
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "ScanArrayRecord", into = "ScanArrayRecord")
)]
pub struct SparseScanArray {
    id: ArrayId,
    mz: CompressedRows<f64>,
    intensity: CompressedRows<f32>,
    mz_columns: CompressedColumns<f64>,
    intensity_columns: CompressedColumns<f32>,
    time: Vec<f64>,
    scan_numbers: Vec<usize>,
    lane_labels: Vec<f64>,
}

/// The stored form of a [`SparseScanArray`]. The column-major index is rebuilt on load.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct ScanArrayRecord {
    id: ArrayId,
    mz: CompressedRows<f64>,
    intensity: CompressedRows<f32>,
    time: Vec<f64>,
    scan_numbers: Vec<usize>,
    lane_labels: Vec<f64>,
}

#[cfg(feature = "serde")]
impl From<ScanArrayRecord> for SparseScanArray {
    fn from(value: ScanArrayRecord) -> Self {
        let mz_columns = value.mz.to_columns();
        let intensity_columns = value.intensity.to_columns();
        Self {
            id: value.id,
            mz: value.mz,
            intensity: value.intensity,
            mz_columns,
            intensity_columns,
            time: value.time,
            scan_numbers: value.scan_numbers,
            lane_labels: value.lane_labels,
        }
    }
}

#[cfg(feature = "serde")]
impl From<SparseScanArray> for ScanArrayRecord {
    fn from(value: SparseScanArray) -> Self {
        Self {
            id: value.id,
            mz: value.mz,
            intensity: value.intensity,
            time: value.time,
            scan_numbers: value.scan_numbers,
            lane_labels: value.lane_labels,
        }
    }
}

impl SparseScanArray {
    /// Trace mass lanes over `frames` with `params` and stack them, numbering scans
    /// with the frames' own scan numbers
    pub fn from_frames(
        frames: &[SpectrumFrame],
        params: &ScanArrayParameters,
    ) -> Result<Self, LaneError> {
        let lanes = track(
            frames,
            params.mz_tolerance,
            params.scan_gap_tolerance,
            params.min_intensity,
        )?;
        let scan_numbers = frames.iter().map(|f| f.scan_number).collect();
        Self::build(lanes, Some(scan_numbers))
    }

    /// Stack traced lanes into a new array.
    ///
    /// When `scan_numbers` is `None`, scans are numbered from zero. The retention time
    /// of each scan is the latest time any lane reports for it, drawn from the lanes'
    /// shared acquisition time axis as well as their own cells.
    pub fn build(lanes: Vec<MassLane>, scan_numbers: Option<Vec<usize>>) -> Result<Self, LaneError> {
        let n_scans = match lanes.first() {
            Some(lane) => lane.n_scans(),
            None => return Err(LaneError::NoFeaturesFound),
        };
        let scan_numbers = match scan_numbers {
            Some(numbers) if numbers.len() != n_scans => {
                return Err(LaneError::ScanNumberMismatch {
                    expected: n_scans,
                    found: numbers.len(),
                })
            }
            Some(numbers) => numbers,
            None => (0..n_scans).collect(),
        };

        let mut mz = CompressedRows::new(n_scans);
        let mut intensity = CompressedRows::new(n_scans);
        let mut time = vec![0.0f64; n_scans];
        let mut lane_labels = Vec::with_capacity(lanes.len());

        for lane in lanes.iter() {
            // A cell is stored in both matrices exactly when its intensity is non-zero
            let cells: Vec<(usize, f64, f32, f64)> =
                lane.iter().filter(|(_, _, inten, _)| *inten != 0.0).collect();
            // A zero m/z would otherwise drop out of the m/z pattern
            mz.push_row(
                cells
                    .iter()
                    .map(|(s, m, _, _)| (*s, if *m == 0.0 { f64::MIN_POSITIVE } else { *m })),
            );
            intensity.push_row(cells.iter().map(|(s, _, i, _)| (*s, *i)));
            for (t, lt) in time.iter_mut().zip(lane.scan_times().iter()) {
                if *lt > *t {
                    *t = *lt;
                }
            }
            for (s, _, _, t) in lane.iter() {
                if t > time[s] {
                    time[s] = t;
                }
            }
            let label = cells
                .iter()
                .fold(None, |best: Option<(f32, f64)>, (_, m, i, _)| match best {
                    Some((b, _)) if !(*i > b) => best,
                    _ => Some((*i, *m)),
                })
                .map(|(_, m)| m)
                .unwrap_or_default();
            lane_labels.push(label);
        }

        let mz_columns = mz.to_columns();
        let intensity_columns = intensity.to_columns();
        let this = Self {
            id: ArrayId::new(),
            mz,
            intensity,
            mz_columns,
            intensity_columns,
            time,
            scan_numbers,
            lane_labels,
        };
        debug!(
            "Built scan array {} with {} lanes x {} scans, {} stored cells",
            this.id,
            this.n_lanes(),
            this.n_scans(),
            this.nnz()
        );
        Ok(this)
    }

    pub fn id(&self) -> ArrayId {
        self.id
    }

    pub fn n_lanes(&self) -> usize {
        self.mz.n_rows()
    }

    pub fn n_scans(&self) -> usize {
        self.mz.n_cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mz.shape()
    }

    /// The number of populated lane x scan cells
    pub fn nnz(&self) -> usize {
        self.intensity.nnz()
    }

    pub fn retention_times(&self) -> &[f64] {
        &self.time
    }

    pub fn scan_numbers(&self) -> &[usize] {
        &self.scan_numbers
    }

    /// The m/z of each lane at its most intense scan
    pub fn lane_labels(&self) -> &[f64] {
        &self.lane_labels
    }

    pub fn mz_matrix(&self) -> &CompressedRows<f64> {
        &self.mz
    }

    pub fn intensity_matrix(&self) -> &CompressedRows<f32> {
        &self.intensity
    }

    pub fn mz_columns(&self) -> &CompressedColumns<f64> {
        &self.mz_columns
    }

    pub fn intensity_columns(&self) -> &CompressedColumns<f32> {
        &self.intensity_columns
    }

    /// Whether the m/z and intensity matrices populate exactly the same cells
    pub fn has_consistent_pattern(&self) -> bool {
        self.mz.same_pattern(&self.intensity)
    }

    /// The lanes whose label falls in the inclusive `mz_range`, or every lane
    pub fn lanes_in_mz_range(&self, mz_range: Option<Bounds>) -> Vec<usize> {
        match mz_range {
            Some((start, end)) => self
                .lane_labels
                .iter()
                .enumerate()
                .filter(|(_, label)| start <= **label && **label <= end)
                .map(|(i, _)| i)
                .collect(),
            None => (0..self.n_lanes()).collect(),
        }
    }

    /// The scan index span whose retention times fall in the inclusive `rt_range`,
    /// or every scan. An inverted range gives an empty span.
    pub fn scan_span(&self, rt_range: Option<Bounds>) -> Range<usize> {
        match rt_range {
            Some((start, end)) if start > end => 0..0,
            Some((start, end)) => {
                let i = self.time.partition_point(|t| *t < start);
                let j = self.time.partition_point(|t| *t <= end);
                i..j
            }
            None => 0..self.n_scans(),
        }
    }

    /// The column-wise maximum intensity over the lanes whose labels fall in `mz_range`
    pub fn base_peak_chromatogram(
        &self,
        mz_range: Option<Bounds>,
        rt_range: Option<Bounds>,
    ) -> Chromatogram {
        let lanes = self.lanes_in_mz_range(mz_range);
        let intensity = self.intensity.column_max(&lanes);
        let span = self.scan_span(rt_range);
        Chromatogram::new(self.time[span.clone()].to_vec(), intensity[span].to_vec())
    }

    /// The column-wise summed intensity over the lanes whose labels fall in `mz_range`,
    /// with the m/z of the most intense of those lanes in each scan
    pub fn extracted_ion_chromatogram(
        &self,
        mz_range: Option<Bounds>,
        rt_range: Option<Bounds>,
    ) -> IonChromatogram {
        let lanes = self.lanes_in_mz_range(mz_range);
        let intensity = self.intensity.column_sum(&lanes);
        let tallest = self.intensity.column_argmax(&lanes);
        let mz: Vec<f64> = tallest
            .iter()
            .enumerate()
            .map(|(j, lane)| lane.map(|i| self.mz.get(i, j)).unwrap_or_default())
            .collect();
        let span = self.scan_span(rt_range);
        IonChromatogram {
            mz: mz[span.clone()].to_vec(),
            intensity: intensity[span.clone()].to_vec(),
            time: self.time[span].to_vec(),
        }
    }

    /// The full column of scan index `scan`, one entry per lane in lane order. Lanes
    /// with no signal in that scan hold zero m/z and intensity.
    pub fn spectrum(&self, scan: usize) -> Result<SpectrumSeries, PointerError> {
        if scan >= self.n_scans() {
            return Err(PointerError::ScanOutOfBounds {
                scan,
                scans: self.n_scans(),
            });
        }
        Ok(SpectrumSeries::new(
            self.mz_columns.column_dense(scan),
            self.intensity_columns.column_dense(scan),
        ))
    }

    /// The scan index whose retention time is nearest `rt`, preferring the lowest index on ties
    pub fn retention_time_to_scan(&self, rt: f64) -> usize {
        let mut best = 0;
        let mut best_delta = f64::INFINITY;
        for (i, t) in self.time.iter().enumerate() {
            let delta = (t - rt).abs();
            if delta < best_delta {
                best = i;
                best_delta = delta;
            }
        }
        best
    }

    /// Create a [`FeaturePointer`] into `lane` over `scan_indices`, or over every scan
    pub fn make_feature_pointer(
        &self,
        lane: usize,
        scan_indices: Option<Vec<usize>>,
    ) -> Result<FeaturePointer, PointerError> {
        let scans = scan_indices.unwrap_or_else(|| (0..self.n_scans()).collect());
        FeaturePointer::checked(lane, scans, self.id, self.shape())
    }

    /// Point at the lane nearest `target_mz` within `mz_window`, over the scans within
    /// `rt_window` of `target_rt`. Returns `None` when no lane label is close enough.
    pub fn extract_feature_pointer(
        &self,
        target_mz: f64,
        mz_window: f64,
        target_rt: f64,
        rt_window: f64,
    ) -> Result<Option<FeaturePointer>, PointerError> {
        let mut best: Option<(usize, f64)> = None;
        for (i, label) in self.lane_labels.iter().enumerate() {
            let delta = (label - target_mz).abs();
            if delta > mz_window {
                continue;
            }
            match best {
                Some((_, d)) if !(delta < d) => {}
                _ => best = Some((i, delta)),
            }
        }
        let Some((lane, _)) = best else {
            return Ok(None);
        };
        let span = self.scan_span(Some((target_rt - rt_window, target_rt + rt_window)));
        if span.is_empty() {
            return Err(PointerError::EmptyScanWindow);
        }
        self.make_feature_pointer(lane, Some(span.collect())).map(Some)
    }
}
