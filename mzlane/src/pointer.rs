use std::ops::Range;

use crate::error::PointerError;
use crate::scan_array::{ArrayId, SparseScanArray};
use crate::series::Chromatogram;

/// An index into one lane and scan window of a specific [`SparseScanArray`].
///
/// A pointer owns no signal. It must be resolved against the array that created it,
/// and every read checks the array's identity first. The window spans the inclusive
/// range from the first to the last recorded scan index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "FeaturePointerRecord")
)]
pub struct FeaturePointer {
    lane: usize,
    scans: Vec<usize>,
    source: ArrayId,
    shape: (usize, usize),
}

/// The stored form of a [`FeaturePointer`], checked and normalized on load
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct FeaturePointerRecord {
    lane: usize,
    scans: Vec<usize>,
    source: ArrayId,
    shape: (usize, usize),
}

#[cfg(feature = "serde")]
impl TryFrom<FeaturePointerRecord> for FeaturePointer {
    type Error = PointerError;

    fn try_from(value: FeaturePointerRecord) -> Result<Self, Self::Error> {
        Self::checked(value.lane, value.scans, value.source, value.shape)
    }
}

impl FeaturePointer {
    /// Sort and de-duplicate `scans`, then check the lane and every scan against
    /// `shape`. An empty scan list is rejected.
    pub(crate) fn checked(
        lane: usize,
        mut scans: Vec<usize>,
        source: ArrayId,
        shape: (usize, usize),
    ) -> Result<Self, PointerError> {
        let (lanes, n_scans) = shape;
        if lane >= lanes {
            return Err(PointerError::LaneOutOfBounds { lane, lanes });
        }
        scans.sort_unstable();
        scans.dedup();
        match scans.last() {
            None => return Err(PointerError::EmptyScanWindow),
            Some(last) if *last >= n_scans => {
                return Err(PointerError::ScanOutOfBounds {
                    scan: *last,
                    scans: n_scans,
                })
            }
            Some(_) => {}
        }
        Ok(Self {
            lane,
            scans,
            source,
            shape,
        })
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn scans(&self) -> &[usize] {
        &self.scans
    }

    /// The identity of the array this pointer was created from
    pub fn source(&self) -> ArrayId {
        self.source
    }

    /// The (lanes, scans) shape of the array this pointer was created from
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn scan_start(&self) -> usize {
        self.scans.first().copied().unwrap_or_default()
    }

    pub fn scan_end(&self) -> usize {
        self.scans.last().copied().unwrap_or_default()
    }

    /// The scan index range covered by this pointer's window
    pub fn window(&self) -> Range<usize> {
        self.scan_start()..(self.scan_end() + 1)
    }

    /// Check that `array` is the array this pointer was created from
    pub fn validate(&self, array: &SparseScanArray) -> Result<(), PointerError> {
        if array.id() != self.source {
            return Err(PointerError::IdentityMismatch {
                expected: self.source,
                found: array.id(),
            });
        }
        Ok(())
    }

    pub fn mass_values(&self, array: &SparseScanArray) -> Result<Vec<f64>, PointerError> {
        self.validate(array)?;
        Ok(array.mz_matrix().row_dense(self.lane, self.window()))
    }

    pub fn intensity_values(&self, array: &SparseScanArray) -> Result<Vec<f32>, PointerError> {
        self.validate(array)?;
        Ok(array.intensity_matrix().row_dense(self.lane, self.window()))
    }

    pub fn retention_times(&self, array: &SparseScanArray) -> Result<Vec<f64>, PointerError> {
        self.validate(array)?;
        Ok(array.retention_times()[self.window()].to_vec())
    }

    pub fn chromatogram(&self, array: &SparseScanArray) -> Result<Chromatogram, PointerError> {
        Ok(Chromatogram::new(
            self.retention_times(array)?,
            self.intensity_values(array)?,
        ))
    }

    /// The first most intense populated cell in the window as `(scan, mz, intensity)`
    pub fn apex(&self, array: &SparseScanArray) -> Result<Option<(usize, f64, f32)>, PointerError> {
        self.validate(array)?;
        Ok(array
            .intensity_matrix()
            .row(self.lane)
            .restrict(self.window())
            .argmax()
            .map(|(j, v)| (j, array.mz_matrix().get(self.lane, j), v)))
    }

    pub fn max_intensity(&self, array: &SparseScanArray) -> Result<f32, PointerError> {
        Ok(self.apex(array)?.map(|(_, _, v)| v).unwrap_or_default())
    }

    /// The scan index of the most intense point in the window, found by mapping the
    /// apex retention time back through [`SparseScanArray::retention_time_to_scan`]
    pub fn scan_of_max_intensity(&self, array: &SparseScanArray) -> Result<usize, PointerError> {
        let chrom = self.chromatogram(array)?;
        match chrom.apex() {
            Some((_, time, _)) => Ok(array.retention_time_to_scan(time)),
            None => Ok(self.scan_start()),
        }
    }

    /// The mean m/z over the populated scans in the window
    pub fn mean_mass(&self, array: &SparseScanArray) -> Result<f64, PointerError> {
        self.validate(array)?;
        let row = array.mz_matrix().row(self.lane).restrict(self.window());
        if row.is_empty() {
            return Ok(0.0);
        }
        Ok(row.values.iter().sum::<f64>() / row.len() as f64)
    }

    /// The populated cell nearest `scan` inside the window, as `(scan, mz, intensity)`,
    /// preferring the earlier scan on ties
    pub fn nearest_populated(
        &self,
        array: &SparseScanArray,
        scan: usize,
    ) -> Result<Option<(usize, f64, f32)>, PointerError> {
        self.validate(array)?;
        let intensities = array.intensity_matrix().row(self.lane).restrict(self.window());
        let mut best: Option<(usize, f32)> = None;
        for (j, v) in intensities.iter() {
            let closer = match best {
                Some((k, _)) => j.abs_diff(scan) < k.abs_diff(scan),
                None => true,
            };
            if closer {
                best = Some((j, v));
            }
        }
        Ok(best.map(|(j, v)| (j, array.mz_matrix().get(self.lane, j), v)))
    }
}
