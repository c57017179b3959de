//! Greedy nearest-neighbor tracing of mass lanes across a sequence of scans.
//!
//! Each [`MassLane`] follows a single m/z trace through time. The tracker is
//! advanced one [`SpectrumFrame`] at a time with [`MassLaneTracker::step`]:
//! every active lane claims the closest unclaimed signal within tolerance of its
//! most recent m/z, unmatched lanes accumulate a gap, lanes whose gap exceeds the
//! gap tolerance are finalized, and left over signals seed new lanes. Between
//! frames, active lanes are re-ordered by their most recent intensity so that the
//! loudest lanes choose first.
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::LaneError;
use crate::frame::SpectrumFrame;

/// A single traced m/z lane. Only the scans where the lane was assigned a signal
/// are stored, in ascending scan order.
///
/// Once tracing finishes, every lane shares the retention time axis of the whole
/// acquisition, including frames that were skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct MassLane {
    n_scans: usize,
    scans: Vec<usize>,
    mz: Vec<f64>,
    intensity: Vec<f32>,
    time: Vec<f64>,
    scan_times: Arc<[f64]>,
    gap: usize,
}

impl MassLane {
    fn new(n_scans: usize, scan: usize, mz: f64, intensity: f32, time: f64) -> Self {
        Self {
            n_scans,
            scans: vec![scan],
            mz: vec![mz],
            intensity: vec![intensity],
            time: vec![time],
            scan_times: Arc::from(Vec::new()),
            gap: 0,
        }
    }

    fn assign(&mut self, scan: usize, mz: f64, intensity: f32, time: f64) {
        self.scans.push(scan);
        self.mz.push(mz);
        self.intensity.push(intensity);
        self.time.push(time);
        self.gap = 0;
    }

    /// The total number of scans in the acquisition this lane was traced over
    pub fn n_scans(&self) -> usize {
        self.n_scans
    }

    /// The number of scans with an assigned signal
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// The number of consecutive scans since the last assignment
    pub fn gap(&self) -> usize {
        self.gap
    }

    pub fn last_mz(&self) -> f64 {
        self.mz.last().copied().unwrap_or_default()
    }

    pub fn last_intensity(&self) -> f32 {
        self.intensity.last().copied().unwrap_or_default()
    }

    /// The mean m/z over the scans with an assigned signal
    pub fn mean_mz(&self) -> f64 {
        if self.mz.is_empty() {
            return 0.0;
        }
        self.mz.iter().sum::<f64>() / self.mz.len() as f64
    }

    /// Iterate over `(scan, mz, intensity, time)` for each assigned scan
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64, f32, f64)> + '_ {
        self.scans
            .iter()
            .zip(self.mz.iter())
            .zip(self.intensity.iter())
            .zip(self.time.iter())
            .map(|(((s, mz), i), t)| (*s, *mz, *i, *t))
    }

    fn dense<T: Copy + Default>(&self, values: &[T]) -> Vec<T> {
        let mut buffer = vec![T::default(); self.n_scans];
        for (s, v) in self.scans.iter().zip(values.iter()) {
            buffer[*s] = *v;
        }
        buffer
    }

    /// The intensity per scan, zero where the lane was not assigned
    pub fn dense_intensity(&self) -> Vec<f32> {
        self.dense(&self.intensity)
    }

    /// The retention time of every scan the lane was traced over. Empty until the
    /// tracker that produced this lane has finished.
    pub fn scan_times(&self) -> &[f64] {
        &self.scan_times
    }
}

/// Find the unclaimed signal closest to `target`. `signals` must be sorted by m/z.
/// On an exact tie the lower index wins.
fn nearest_unclaimed(signals: &[(f64, f32)], claimed: &[bool], target: f64) -> Option<usize> {
    let split = signals.partition_point(|(mz, _)| *mz < target);
    let mut left = (0..split).rev().find(|i| !claimed[*i]);
    // Walk back across unclaimed signals with the same m/z so the first index wins
    if let Some(mut i) = left {
        while i > 0 && !claimed[i - 1] && signals[i - 1].0 == signals[i].0 {
            i -= 1;
        }
        left = Some(i);
    }
    let right = (split..signals.len()).find(|i| !claimed[*i]);
    match (left, right) {
        (Some(l), Some(r)) => {
            if target - signals[l].0 <= signals[r].0 - target {
                Some(l)
            } else {
                Some(r)
            }
        }
        (l, r) => l.or(r),
    }
}

/// Incremental mass lane tracing over a known number of scans
#[derive(Debug, Clone)]
pub struct MassLaneTracker {
    mz_tolerance: f64,
    gap_tolerance: usize,
    min_intensity: f32,
    n_scans: usize,
    scan_index: usize,
    frames_skipped: usize,
    scan_times: Vec<f64>,
    active: Vec<MassLane>,
    finalized: Vec<MassLane>,
}

impl MassLaneTracker {
    pub fn new(
        mz_tolerance: f64,
        gap_tolerance: usize,
        min_intensity: f32,
        n_scans: usize,
    ) -> Result<Self, LaneError> {
        if min_intensity < 0.0 {
            return Err(LaneError::NegativeMinimumIntensity(min_intensity));
        }
        Ok(Self {
            mz_tolerance,
            gap_tolerance,
            min_intensity,
            n_scans,
            scan_index: 0,
            frames_skipped: 0,
            scan_times: Vec::with_capacity(n_scans),
            active: Vec::new(),
            finalized: Vec::new(),
        })
    }

    pub fn active_lanes(&self) -> &[MassLane] {
        &self.active
    }

    pub fn finalized_lanes(&self) -> &[MassLane] {
        &self.finalized
    }

    /// The number of frames consumed so far
    pub fn scans_seen(&self) -> usize {
        self.scan_index
    }

    pub fn frames_skipped(&self) -> usize {
        self.frames_skipped
    }

    /// Consume the next frame in the sequence
    pub fn step(&mut self, frame: &SpectrumFrame) {
        let scan = self.scan_index;
        self.scan_index += 1;
        self.scan_times.push(frame.time);
        if scan >= self.n_scans {
            self.n_scans = scan + 1;
            for lane in self.active.iter_mut() {
                lane.n_scans = self.n_scans;
            }
        }

        let signals = frame.signals_above(self.min_intensity);
        if scan == 0 {
            self.active.extend(
                signals
                    .iter()
                    .map(|(mz, inten)| MassLane::new(self.n_scans, 0, *mz, *inten, frame.time)),
            );
            self.active
                .sort_by(|a, b| b.last_intensity().total_cmp(&a.last_intensity()));
            return;
        }

        if signals.len() < 2 {
            self.frames_skipped += 1;
            trace!(
                "Skipping scan {scan} with {} signals above threshold",
                signals.len()
            );
            return;
        }

        let mut claimed = vec![false; signals.len()];
        let active = std::mem::take(&mut self.active);
        let mut still_active = Vec::with_capacity(active.len() + signals.len());
        for mut lane in active {
            let target = lane.last_mz();
            let hit = nearest_unclaimed(&signals, &claimed, target)
                .filter(|k| (signals[*k].0 - target).abs() < self.mz_tolerance);
            match hit {
                Some(k) => {
                    claimed[k] = true;
                    let (mz, inten) = signals[k];
                    lane.assign(scan, mz, inten, frame.time);
                    still_active.push(lane);
                }
                None => {
                    lane.gap += 1;
                    if lane.gap > self.gap_tolerance {
                        self.finalized.push(lane);
                    } else {
                        still_active.push(lane);
                    }
                }
            }
        }

        for ((mz, inten), taken) in signals.iter().zip(claimed.iter()) {
            if !taken {
                still_active.push(MassLane::new(self.n_scans, scan, *mz, *inten, frame.time));
            }
        }

        still_active.sort_by(|a, b| b.last_intensity().total_cmp(&a.last_intensity()));
        self.active = still_active;
        trace!(
            "Scan {scan}: {} active lanes, {} finalized lanes",
            self.active.len(),
            self.finalized.len()
        );
    }

    /// Finalize every remaining lane and return all lanes ordered by mean m/z
    pub fn finish(mut self) -> Result<Vec<MassLane>, LaneError> {
        let n_scans = self.n_scans;
        // Scans that were declared but never consumed repeat the last seen time
        let last_time = self.scan_times.last().copied().unwrap_or_default();
        self.scan_times.resize(n_scans, last_time);
        let scan_times: Arc<[f64]> = Arc::from(std::mem::take(&mut self.scan_times));

        let mut lanes = std::mem::take(&mut self.finalized);
        lanes.append(&mut self.active);
        for lane in lanes.iter_mut() {
            lane.n_scans = n_scans;
            lane.scan_times = Arc::clone(&scan_times);
        }
        if self.frames_skipped > 0 {
            debug!(
                "Skipped {} of {} scans with fewer than 2 signals",
                self.frames_skipped, self.scan_index
            );
        }
        if lanes.is_empty() {
            return Err(LaneError::NoFeaturesFound);
        }
        lanes.sort_by(|a, b| a.mean_mz().total_cmp(&b.mean_mz()));
        Ok(lanes)
    }
}

/// Trace mass lanes across `frames`, returning them ordered by mean m/z.
///
/// # Errors
/// - [`LaneError::NegativeMinimumIntensity`] when `min_intensity < 0`
/// - [`LaneError::EmptyInput`] when `frames` is empty
/// - [`LaneError::NoFeaturesFound`] when no signal survives the intensity filter
pub fn track(
    frames: &[SpectrumFrame],
    mz_tolerance: f64,
    gap_tolerance: usize,
    min_intensity: f32,
) -> Result<Vec<MassLane>, LaneError> {
    let mut tracker = MassLaneTracker::new(mz_tolerance, gap_tolerance, min_intensity, frames.len())?;
    if frames.is_empty() {
        return Err(LaneError::EmptyInput);
    }
    for frame in frames {
        tracker.step(frame);
    }
    tracker.finish()
}

#[cfg(test)]
mod test {
    use super::*;

    fn frame(i: usize, signals: &[(f64, f32)]) -> SpectrumFrame {
        let (mzs, ints): (Vec<f64>, Vec<f32>) = signals.iter().copied().unzip();
        SpectrumFrame::from_arrays(i, 10.0 + i as f64 * 0.1, &mzs, &ints)
    }

    #[test]
    fn test_nearest_unclaimed() {
        let signals = vec![(100.0, 1.0), (100.02, 1.0), (100.04, 1.0)];
        let mut claimed = vec![false; 3];
        assert_eq!(nearest_unclaimed(&signals, &claimed, 100.021), Some(1));
        claimed[1] = true;
        assert_eq!(nearest_unclaimed(&signals, &claimed, 100.021), Some(0));
        // exact tie goes to the lower index
        assert_eq!(nearest_unclaimed(&signals, &claimed, 100.02), Some(0));
        claimed[0] = true;
        claimed[2] = true;
        assert_eq!(nearest_unclaimed(&signals, &claimed, 100.02), None);
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            track(&[], 0.01, 2, -1.0).unwrap_err(),
            LaneError::NegativeMinimumIntensity(-1.0)
        );
        assert_eq!(track(&[], 0.01, 2, 0.0).unwrap_err(), LaneError::EmptyInput);
        let frames = vec![frame(0, &[(100.0, 5.0)])];
        assert_eq!(
            track(&frames, 0.01, 2, 10.0).unwrap_err(),
            LaneError::NoFeaturesFound
        );
    }

    #[test]
    fn test_single_lane() {
        let frames: Vec<_> = [0.0f32, 100.0, 400.0, 50.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, inten)| frame(i, &[(250.0 + i as f64 * 0.001, *inten), (500.0, 20.0)]))
            .collect();
        let lanes = track(&frames, 0.01, 2, 0.0).unwrap();
        assert_eq!(lanes.len(), 2);
        let lane = &lanes[0];
        assert_eq!(lane.n_scans(), 5);
        assert_eq!(lane.dense_intensity(), vec![0.0, 100.0, 400.0, 50.0, 0.0]);
        assert!((lane.mean_mz() - 250.002).abs() < 1e-9);
        // the last frame drops below two signals and is skipped
        assert_eq!(lanes[1].len(), 4);
    }

    #[test_log::test]
    fn test_gap_tolerance_finalizes() {
        // A background pair of lanes keeps every frame above the skip threshold
        let mut frames = Vec::new();
        for i in 0..10 {
            let mut signals: Vec<(f64, f32)> = vec![(150.0, 1000.0), (900.0, 1000.0)];
            if i == 2 || i == 3 {
                signals.push((400.0, 500.0));
            }
            if i >= 6 {
                signals.push((400.02, 300.0));
            }
            signals.sort_by(|a, b| a.0.total_cmp(&b.0));
            frames.push(frame(i, &signals));
        }

        let mut tracker = MassLaneTracker::new(0.01, 1, 0.0, frames.len()).unwrap();
        for (i, f) in frames.iter().enumerate() {
            tracker.step(f);
            if i == 4 {
                assert!(tracker.finalized_lanes().is_empty());
            }
            if i == 5 {
                assert_eq!(tracker.finalized_lanes().len(), 1);
                assert_eq!(tracker.finalized_lanes()[0].dense_intensity()[2..4], [500.0, 500.0]);
            }
        }
        let lanes = tracker.finish().unwrap();
        assert_eq!(lanes.len(), 4);
        let near_400: Vec<_> = lanes
            .iter()
            .filter(|l| (l.mean_mz() - 400.0).abs() < 0.1)
            .collect();
        assert_eq!(near_400.len(), 2);
        assert_eq!(near_400[0].len(), 2);
        assert_eq!(near_400[1].len(), 4);
        assert!(near_400[0].mean_mz() < near_400[1].mean_mz());
    }

    #[test]
    fn test_sparse_frames_are_skipped() {
        let frames = vec![
            frame(0, &[(100.0, 10.0), (200.0, 10.0)]),
            frame(1, &[(100.0, 10.0)]),
            frame(2, &[]),
            frame(3, &[(100.001, 10.0), (200.001, 10.0)]),
        ];
        let mut tracker = MassLaneTracker::new(0.01, 1, 0.0, frames.len()).unwrap();
        for f in frames.iter() {
            tracker.step(f);
        }
        assert_eq!(tracker.frames_skipped(), 2);
        assert!(tracker.finalized_lanes().is_empty());
        let lanes = tracker.finish().unwrap();
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[0].dense_intensity(), vec![10.0, 0.0, 0.0, 10.0]);
        // Skipped frames still contribute their retention time
        let times: Vec<f64> = frames.iter().map(|f| f.time).collect();
        for lane in lanes.iter() {
            assert_eq!(lane.scan_times(), times.as_slice());
        }
    }

    #[test]
    fn test_priority_by_intensity() {
        // Two lanes compete for one signal; the louder lane claims it, and the
        // other takes the next closest unclaimed signal within tolerance
        let frames = vec![
            frame(0, &[(300.000, 10.0), (300.008, 1000.0)]),
            frame(1, &[(299.994, 5.0), (300.003, 900.0)]),
        ];
        let lanes = track(&frames, 0.01, 2, 0.0).unwrap();
        assert_eq!(lanes.len(), 2);
        let loud = lanes
            .iter()
            .find(|l| l.dense_intensity()[0] == 1000.0)
            .unwrap();
        assert_eq!(loud.dense_intensity(), vec![1000.0, 900.0]);
        let quiet = lanes.iter().find(|l| l.dense_intensity()[0] == 10.0).unwrap();
        assert_eq!(quiet.dense_intensity(), vec![10.0, 5.0]);
    }
}
