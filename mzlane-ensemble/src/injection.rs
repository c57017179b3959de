use std::fmt::Display;

use tracing::info;

use mzlane::{ScanArrayParameters, SpectrumFrame, SparseScanArray};

use crate::error::EnsembleError;

/// The two acquisition levels an [`Injection`] holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MSLevel {
    MS1,
    MS2,
}

impl MSLevel {
    pub fn as_u8(&self) -> u8 {
        match self {
            MSLevel::MS1 => 1,
            MSLevel::MS2 => 2,
        }
    }
}

impl TryFrom<u8> for MSLevel {
    type Error = EnsembleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::MS1),
            2 => Ok(Self::MS2),
            _ => Err(EnsembleError::InvalidMSLevel(value)),
        }
    }
}

impl From<MSLevel> for u8 {
    fn from(value: MSLevel) -> Self {
        value.as_u8()
    }
}

impl Display for MSLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single sample run: the MS1 scan array and, when fragment spectra were acquired,
/// the MS2 scan array, each built with its own tracing parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Injection {
    pub name: String,
    pub parameters: [ScanArrayParameters; 2],
    ms1: Option<SparseScanArray>,
    ms2: Option<SparseScanArray>,
}

impl Injection {
    pub fn new(name: String, parameters: [ScanArrayParameters; 2]) -> Self {
        Self {
            name,
            parameters,
            ms1: None,
            ms2: None,
        }
    }

    /// Build an injection from already assembled arrays
    pub fn from_arrays(
        name: String,
        parameters: [ScanArrayParameters; 2],
        ms1: SparseScanArray,
        ms2: Option<SparseScanArray>,
    ) -> Self {
        Self {
            name,
            parameters,
            ms1: Some(ms1),
            ms2,
        }
    }

    /// Trace and assemble both levels. An empty `ms2_frames` leaves the MS2 array unset.
    pub fn from_frames(
        name: String,
        ms1_frames: &[SpectrumFrame],
        ms2_frames: &[SpectrumFrame],
        parameters: [ScanArrayParameters; 2],
    ) -> Result<Self, EnsembleError> {
        let mut this = Self::new(name, parameters);
        this.assemble_scan_array(1, ms1_frames)?;
        if !ms2_frames.is_empty() {
            this.assemble_scan_array(2, ms2_frames)?;
        }
        Ok(this)
    }

    pub fn parameters_for(&self, ms_level: u8) -> Result<&ScanArrayParameters, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        Ok(&self.parameters[level.as_u8() as usize - 1])
    }

    /// Build the scan array for `ms_level` from `frames`, unless it already exists
    pub fn assemble_scan_array(
        &mut self,
        ms_level: u8,
        frames: &[SpectrumFrame],
    ) -> Result<&SparseScanArray, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        let params = *self.parameters_for(ms_level)?;
        let slot = match level {
            MSLevel::MS1 => &mut self.ms1,
            MSLevel::MS2 => &mut self.ms2,
        };
        if slot.is_none() {
            let array = SparseScanArray::from_frames(frames, &params)?;
            info!(
                "{}: {level} scan array with {} lanes over {} scans",
                self.name,
                array.n_lanes(),
                array.n_scans()
            );
            *slot = Some(array);
        }
        slot.as_ref().ok_or(EnsembleError::MissingScanArray(level))
    }

    pub fn set_scan_array(&mut self, ms_level: u8, array: SparseScanArray) -> Result<(), EnsembleError> {
        match MSLevel::try_from(ms_level)? {
            MSLevel::MS1 => self.ms1 = Some(array),
            MSLevel::MS2 => self.ms2 = Some(array),
        }
        Ok(())
    }

    /// The scan array for MS level 1 or 2
    pub fn scan_array(&self, ms_level: u8) -> Result<&SparseScanArray, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        let array = match level {
            MSLevel::MS1 => self.ms1.as_ref(),
            MSLevel::MS2 => self.ms2.as_ref(),
        };
        array.ok_or(EnsembleError::MissingScanArray(level))
    }

    pub fn has_scan_array(&self, ms_level: u8) -> bool {
        self.scan_array(ms_level).is_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn frames(mz: f64) -> Vec<SpectrumFrame> {
        (0..4)
            .map(|i| SpectrumFrame::from_arrays(i, i as f64, &[mz, mz + 100.0], &[10.0, 20.0]))
            .collect()
    }

    #[test]
    fn test_ms_level() {
        assert_eq!(MSLevel::try_from(1).unwrap(), MSLevel::MS1);
        assert_eq!(MSLevel::try_from(2).unwrap(), MSLevel::MS2);
        assert_eq!(MSLevel::try_from(3).unwrap_err(), EnsembleError::InvalidMSLevel(3));
        assert_eq!(u8::from(MSLevel::MS2), 2);
    }

    #[test]
    fn test_from_frames() {
        let params = [ScanArrayParameters::new(0.01, 2, 0.0); 2];
        let injection = Injection::from_frames("run".into(), &frames(100.0), &[], params).unwrap();
        assert_eq!(injection.scan_array(1).unwrap().n_lanes(), 2);
        assert_eq!(
            injection.scan_array(2).unwrap_err(),
            EnsembleError::MissingScanArray(MSLevel::MS2)
        );
        assert_eq!(injection.scan_array(0).unwrap_err(), EnsembleError::InvalidMSLevel(0));
        assert!(!injection.has_scan_array(2));

        let injection =
            Injection::from_frames("run".into(), &frames(100.0), &frames(50.0), params).unwrap();
        assert_eq!(injection.scan_array(2).unwrap().lane_labels(), &[50.0, 150.0]);
    }

    #[test]
    fn test_assemble_once() {
        let params = [ScanArrayParameters::new(0.01, 2, 0.0); 2];
        let mut injection = Injection::new("run".into(), params);
        let id = injection.assemble_scan_array(1, &frames(100.0)).unwrap().id();
        let again = injection.assemble_scan_array(1, &frames(300.0)).unwrap();
        assert_eq!(again.id(), id);
        assert_eq!(again.lane_labels(), &[100.0, 200.0]);
    }

    #[test]
    fn test_bad_parameters() {
        let params = [ScanArrayParameters::new(0.01, 2, -1.0); 2];
        let err = Injection::from_frames("run".into(), &frames(100.0), &[], params).unwrap_err();
        assert!(matches!(err, EnsembleError::Lane(mzlane::LaneError::NegativeMinimumIntensity(_))));
    }
}
