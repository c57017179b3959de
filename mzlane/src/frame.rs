use mzpeaks::prelude::*;
use mzpeaks::{CentroidPeak, MZPeakSetType};

/// One centroided scan: its ordinal scan number, retention time, and
/// m/z-sorted peak list.
#[derive(Debug, Clone)]
pub struct SpectrumFrame {
    pub scan_number: usize,
    pub time: f64,
    pub peaks: MZPeakSetType<CentroidPeak>,
}

impl SpectrumFrame {
    pub fn new(scan_number: usize, time: f64, peaks: MZPeakSetType<CentroidPeak>) -> Self {
        Self {
            scan_number,
            time,
            peaks,
        }
    }

    /// Build a frame from parallel m/z and intensity arrays. The arrays are
    /// sorted by m/z on construction, and any excess in the longer array is
    /// ignored.
    pub fn from_arrays(scan_number: usize, time: f64, mzs: &[f64], intensities: &[f32]) -> Self {
        let peaks: Vec<CentroidPeak> = mzs
            .iter()
            .zip(intensities.iter())
            .enumerate()
            .map(|(i, (mz, inten))| CentroidPeak::new(*mz, *inten, i as u32))
            .collect();
        Self::new(scan_number, time, MZPeakSetType::new(peaks))
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    /// The (m/z, intensity) pairs whose intensity is strictly above `min_intensity`,
    /// in ascending m/z order
    pub fn signals_above(&self, min_intensity: f32) -> Vec<(f64, f32)> {
        self.peaks
            .iter()
            .filter(|p| p.intensity > min_intensity)
            .map(|p| (p.mz, p.intensity))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_arrays_sorts() {
        let frame = SpectrumFrame::from_arrays(3, 1.5, &[300.0, 100.0, 200.0], &[5.0, 10.0, 0.0]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.scan_number, 3);
        let signals = frame.signals_above(0.0);
        assert_eq!(signals, vec![(100.0, 10.0), (300.0, 5.0)]);
    }
}
