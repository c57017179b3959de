//! Ensembles of cofeatures and the summaries derived from them.
//!
//! An [`Ensemble`] starts out as two plain lists of [`FeaturePointer`]s, one per MS level.
//! Attaching it to the [`Injection`] those pointers were made from resolves the base
//! cofeature and unlocks every signal query. Composite spectra are computed on first
//! request and cached per MS level.
use std::io;
use std::ops::Range;
use std::sync::OnceLock;

use tracing::debug;

use mzlane::{Chromatogram, FeaturePointer, SparseScanArray, SpectrumSeries};

use crate::error::EnsembleError;
use crate::injection::{Injection, MSLevel};

/// The serializable part of an [`Ensemble`]: its pointer lists
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CofeatureLists {
    pub ms1: Vec<FeaturePointer>,
    pub ms2: Vec<FeaturePointer>,
}

/// Where to read a spectrum from an attached [`Ensemble`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpectrumPosition {
    /// A scan index into the level's scan array
    Scan(usize),
    /// A retention time, mapped to the nearest scan
    Time(f64),
}

#[derive(Debug)]
struct Attachment<'a> {
    injection: &'a Injection,
    base_index: usize,
    base_mz: f64,
    base_intensity: f32,
    base_time: f64,
    base_scan: usize,
    composite: [OnceLock<SpectrumSeries>; 2],
}

#[derive(Debug)]
enum EnsembleState<'a> {
    Unattached,
    Attached(Box<Attachment<'a>>),
}

/// A reference feature together with the MS1 and MS2 cofeatures matched to it
#[derive(Debug)]
pub struct Ensemble<'a> {
    ms1: Vec<FeaturePointer>,
    ms2: Vec<FeaturePointer>,
    state: EnsembleState<'a>,
}

impl From<CofeatureLists> for Ensemble<'_> {
    fn from(value: CofeatureLists) -> Self {
        Self::new(value.ms1, value.ms2)
    }
}

impl<'a> Ensemble<'a> {
    pub fn new(ms1: Vec<FeaturePointer>, ms2: Vec<FeaturePointer>) -> Self {
        Self {
            ms1,
            ms2,
            state: EnsembleState::Unattached,
        }
    }

    /// The cofeatures recorded for `ms_level`. These are available before attaching.
    pub fn cofeatures(&self, ms_level: u8) -> Result<&[FeaturePointer], EnsembleError> {
        Ok(self.cofeatures_for(MSLevel::try_from(ms_level)?))
    }

    fn cofeatures_for(&self, level: MSLevel) -> &[FeaturePointer] {
        match level {
            MSLevel::MS1 => &self.ms1,
            MSLevel::MS2 => &self.ms2,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.state, EnsembleState::Attached(_))
    }

    /// Bind this ensemble to the injection its pointers index into, and resolve the base
    /// cofeature: the first MS1 pointer with the highest apex intensity.
    ///
    /// # Errors
    /// - [`EnsembleError::AlreadyAttached`] when called a second time
    /// - [`EnsembleError::EmptyPrimaryCofeatures`] when there are no MS1 pointers
    /// - [`EnsembleError::MissingScanArray`] when a non-empty list has no array to resolve against
    /// - [`EnsembleError::Pointer`] when a pointer was made from a different array
    pub fn attach(&mut self, injection: &'a Injection) -> Result<(), EnsembleError> {
        if self.is_attached() {
            return Err(EnsembleError::AlreadyAttached);
        }
        if self.ms1.is_empty() {
            return Err(EnsembleError::EmptyPrimaryCofeatures);
        }

        let ms1_array = injection.scan_array(1)?;
        let mut base: Option<(usize, f32)> = None;
        for (i, ptr) in self.ms1.iter().enumerate() {
            let apex = ptr.max_intensity(ms1_array)?;
            match base {
                Some((_, b)) if !(apex > b) => {}
                _ => base = Some((i, apex)),
            }
        }
        if !self.ms2.is_empty() {
            let ms2_array = injection.scan_array(2)?;
            for ptr in self.ms2.iter() {
                ptr.validate(ms2_array)?;
            }
        }

        let (base_index, _) = base.ok_or(EnsembleError::EmptyPrimaryCofeatures)?;
        let base_ptr = &self.ms1[base_index];
        let base_mz = base_ptr.mean_mass(ms1_array)?;
        let base_scan = base_ptr.scan_of_max_intensity(ms1_array)?;
        let (base_time, base_intensity) = match base_ptr.chromatogram(ms1_array)?.apex() {
            Some((_, time, intensity)) => (time, intensity),
            None => (ms1_array.retention_times()[base_scan], 0.0),
        };
        debug!(
            "Attached ensemble of {} MS1 and {} MS2 cofeatures to {}, base m/z {base_mz:0.4} at {base_time:0.3}",
            self.ms1.len(),
            self.ms2.len(),
            injection.name,
        );

        self.state = EnsembleState::Attached(Box::new(Attachment {
            injection,
            base_index,
            base_mz,
            base_intensity,
            base_time,
            base_scan,
            composite: Default::default(),
        }));
        Ok(())
    }

    fn attachment(&self) -> Result<&Attachment<'a>, EnsembleError> {
        match &self.state {
            EnsembleState::Attached(attachment) => Ok(attachment.as_ref()),
            EnsembleState::Unattached => Err(EnsembleError::NotAttached),
        }
    }

    pub fn injection(&self) -> Result<&'a Injection, EnsembleError> {
        Ok(self.attachment()?.injection)
    }

    fn scan_array(&self, level: MSLevel) -> Result<&'a SparseScanArray, EnsembleError> {
        self.attachment()?.injection.scan_array(level.as_u8())
    }

    /// The position of the base cofeature in the MS1 list
    pub fn base_index(&self) -> Result<usize, EnsembleError> {
        Ok(self.attachment()?.base_index)
    }

    pub fn base_cofeature(&self) -> Result<&FeaturePointer, EnsembleError> {
        Ok(&self.ms1[self.attachment()?.base_index])
    }

    /// The base cofeature's mean m/z over its populated scans
    pub fn base_mz(&self) -> Result<f64, EnsembleError> {
        Ok(self.attachment()?.base_mz)
    }

    pub fn base_intensity(&self) -> Result<f32, EnsembleError> {
        Ok(self.attachment()?.base_intensity)
    }

    /// The retention time of the base cofeature's apex
    pub fn peak_time(&self) -> Result<f64, EnsembleError> {
        Ok(self.attachment()?.base_time)
    }

    /// The MS1 scan index of the base cofeature's apex
    pub fn base_scan(&self) -> Result<usize, EnsembleError> {
        Ok(self.attachment()?.base_scan)
    }

    /// The chromatogram of each cofeature at `ms_level`, optionally restricted to the
    /// pointers in `index_range`
    pub fn chromatograms(
        &self,
        ms_level: u8,
        index_range: Option<Range<usize>>,
    ) -> Result<Vec<Chromatogram>, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        self.attachment()?;
        let pointers = self.cofeatures_for(level);
        let range = match index_range {
            Some(r) => {
                let end = r.end.min(pointers.len());
                r.start.min(end)..end
            }
            None => 0..pointers.len(),
        };
        let pointers = &pointers[range];
        if pointers.is_empty() {
            return Ok(Vec::new());
        }
        let array = self.scan_array(level)?;
        pointers
            .iter()
            .map(|ptr| ptr.chromatogram(array).map_err(EnsembleError::from))
            .collect()
    }

    /// The chromatogram of the most intense cofeature at `ms_level`. At MS1 this is the
    /// base cofeature. An empty list has no base chromatogram.
    pub fn base_chromatogram(&self, ms_level: u8) -> Result<Option<Chromatogram>, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        let base = match level {
            MSLevel::MS1 => Some(self.base_cofeature()?),
            MSLevel::MS2 => {
                self.attachment()?;
                if self.ms2.is_empty() {
                    None
                } else {
                    let array = self.scan_array(level)?;
                    let mut best: Option<(&FeaturePointer, f32)> = None;
                    for ptr in self.ms2.iter() {
                        let apex = ptr.max_intensity(array)?;
                        match best {
                            Some((_, b)) if !(apex > b) => {}
                            _ => best = Some((ptr, apex)),
                        }
                    }
                    best.map(|(ptr, _)| ptr)
                }
            }
        };
        match base {
            Some(ptr) => Ok(Some(ptr.chromatogram(self.scan_array(level)?)?)),
            None => Ok(None),
        }
    }

    fn build_composite_spectrum(&self, level: MSLevel) -> Result<SpectrumSeries, EnsembleError> {
        let pointers = self.cofeatures_for(level);
        if pointers.is_empty() {
            return Ok(SpectrumSeries::default());
        }
        let array = self.scan_array(level)?;
        let mut spectrum = SpectrumSeries::default();
        for ptr in pointers {
            if let Some((_, mz, intensity)) = ptr.apex(array)? {
                spectrum.push(mz, intensity);
            }
        }
        spectrum.sort_by_mz();
        Ok(spectrum)
    }

    /// One peak per cofeature at `ms_level`, the m/z and intensity at that cofeature's
    /// apex, sorted by m/z. Computed once per level and cached.
    pub fn composite_spectrum(&self, ms_level: u8) -> Result<&SpectrumSeries, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        let cell = &self.attachment()?.composite[level.as_u8() as usize - 1];
        if let Some(spectrum) = cell.get() {
            return Ok(spectrum);
        }
        let spectrum = self.build_composite_spectrum(level)?;
        Ok(cell.get_or_init(|| spectrum))
    }

    /// For each cofeature at `ms_level`, the populated cell nearest `position` inside
    /// the cofeature's window, sorted by m/z. Cofeatures with no populated cell are left
    /// out, and an empty cofeature list gives an empty spectrum.
    pub fn spectrum_at(
        &self,
        ms_level: u8,
        position: SpectrumPosition,
    ) -> Result<SpectrumSeries, EnsembleError> {
        let level = MSLevel::try_from(ms_level)?;
        self.attachment()?;
        let pointers = self.cofeatures_for(level);
        if pointers.is_empty() {
            return Ok(SpectrumSeries::default());
        }
        let array = self.scan_array(level)?;
        let scan = match position {
            SpectrumPosition::Scan(scan) => scan,
            SpectrumPosition::Time(time) => array.retention_time_to_scan(time),
        };
        let mut spectrum = SpectrumSeries::default();
        for ptr in pointers {
            if let Some((_, mz, intensity)) = ptr.nearest_populated(array, scan)? {
                spectrum.push(mz, intensity);
            }
        }
        spectrum.sort_by_mz();
        Ok(spectrum)
    }

    /// Drop the injection binding and any cached state, keeping the pointer lists
    pub fn detach(self) -> CofeatureLists {
        CofeatureLists {
            ms1: self.ms1,
            ms2: self.ms2,
        }
    }
}

/// Write `spectrum` as one `mz\tintensity` line per peak
pub fn write_spectrum<W: io::Write>(writer: &mut W, spectrum: &SpectrumSeries) -> io::Result<()> {
    for (mz, intensity) in spectrum.iter() {
        writeln!(writer, "{mz}\t{intensity}")?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use mzlane::{ScanArrayParameters, SpectrumFrame};

    const SHAPE: [f32; 9] = [0.0, 1000.0, 3000.0, 8000.0, 10000.0, 7000.0, 2500.0, 900.0, 0.0];

    fn ms1_frames() -> Vec<SpectrumFrame> {
        SHAPE
            .iter()
            .enumerate()
            .map(|(i, v)| {
                SpectrumFrame::from_arrays(
                    i,
                    5.0 + i as f64 * 0.1,
                    &[400.0, 401.0, 650.0],
                    &[*v, v * 0.5, 2000.0],
                )
            })
            .collect()
    }

    fn ms2_frames() -> Vec<SpectrumFrame> {
        SHAPE
            .iter()
            .enumerate()
            .map(|(i, v)| {
                SpectrumFrame::from_arrays(i, 5.05 + i as f64 * 0.1, &[150.0, 275.0], &[v * 0.2, v * 0.1])
            })
            .collect()
    }

    fn injection(with_ms2: bool) -> Injection {
        let ms2 = if with_ms2 { ms2_frames() } else { Vec::new() };
        Injection::from_frames(
            "run".into(),
            &ms1_frames(),
            &ms2,
            [ScanArrayParameters::new(0.01, 3, 0.0); 2],
        )
        .unwrap()
    }

    fn ensemble(injection: &Injection) -> Ensemble<'_> {
        let ms1 = injection.scan_array(1).unwrap();
        let ms2 = injection.scan_array(2).unwrap();
        Ensemble::new(
            vec![
                ms1.make_feature_pointer(1, None).unwrap(),
                ms1.make_feature_pointer(0, None).unwrap(),
            ],
            vec![
                ms2.make_feature_pointer(1, None).unwrap(),
                ms2.make_feature_pointer(0, None).unwrap(),
            ],
        )
    }

    #[test]
    fn test_unattached() {
        let injection = injection(true);
        let ens = ensemble(&injection);
        assert_eq!(ens.cofeatures(1).unwrap().len(), 2);
        assert_eq!(ens.base_mz().unwrap_err(), EnsembleError::NotAttached);
        assert_eq!(ens.chromatograms(1, None).unwrap_err(), EnsembleError::NotAttached);
        assert_eq!(
            ens.spectrum_at(2, SpectrumPosition::Scan(0)).unwrap_err(),
            EnsembleError::NotAttached
        );
        assert_eq!(ens.composite_spectrum(1).unwrap_err(), EnsembleError::NotAttached);

        let mut empty = Ensemble::new(Vec::new(), Vec::new());
        assert_eq!(
            empty.attach(&injection).unwrap_err(),
            EnsembleError::EmptyPrimaryCofeatures
        );
    }

    #[test_log::test]
    fn test_attach() {
        let injection = injection(true);
        let mut ens = ensemble(&injection);
        ens.attach(&injection).unwrap();
        assert_eq!(ens.attach(&injection).unwrap_err(), EnsembleError::AlreadyAttached);

        let ms1 = injection.scan_array(1).unwrap();
        assert_eq!(ens.base_index().unwrap(), 1);
        assert_eq!(ens.base_cofeature().unwrap().lane(), 0);
        assert_eq!(ens.base_mz().unwrap(), 400.0);
        assert_eq!(ens.base_intensity().unwrap(), 10000.0);
        assert_eq!(ens.base_scan().unwrap(), 4);
        assert_eq!(ens.peak_time().unwrap(), ms1.retention_times()[4]);
    }

    #[test]
    fn test_chromatograms() {
        let injection = injection(true);
        let mut ens = ensemble(&injection);
        ens.attach(&injection).unwrap();

        let chroms = ens.chromatograms(1, None).unwrap();
        assert_eq!(chroms.len(), 2);
        assert_eq!(chroms[1].intensity, SHAPE.to_vec());
        let chroms = ens.chromatograms(2, Some(1..10)).unwrap();
        assert_eq!(chroms.len(), 1);
        assert_eq!(chroms[0].apex().map(|(_, _, v)| v), Some(2000.0));
        assert_eq!(ens.chromatograms(3, None).unwrap_err(), EnsembleError::InvalidMSLevel(3));

        let base = ens.base_chromatogram(1).unwrap().unwrap();
        assert_eq!(base.apex().map(|(i, _, v)| (i, v)), Some((4, 10000.0)));
        let base = ens.base_chromatogram(2).unwrap().unwrap();
        assert_eq!(base.apex().map(|(_, _, v)| v), Some(2000.0));
    }

    #[test]
    fn test_composite_spectrum() {
        let injection = injection(true);
        let mut ens = ensemble(&injection);
        ens.attach(&injection).unwrap();

        let ms1 = ens.composite_spectrum(1).unwrap();
        assert_eq!(ms1.mz, vec![400.0, 401.0]);
        assert_eq!(ms1.intensity, vec![10000.0, 5000.0]);
        assert!(std::ptr::eq(ms1, ens.composite_spectrum(1).unwrap()));

        let ms2 = ens.composite_spectrum(2).unwrap();
        assert_eq!(ms2.mz, vec![150.0, 275.0]);
        assert_eq!(ms2.intensity, vec![2000.0, 1000.0]);
    }

    #[test]
    fn test_spectrum_at() {
        let injection = injection(true);
        let mut ens = ensemble(&injection);
        ens.attach(&injection).unwrap();

        // Neither lane is populated in the first scan, so the next scan stands in
        let spec = ens.spectrum_at(1, SpectrumPosition::Scan(0)).unwrap();
        assert_eq!(spec.mz, vec![400.0, 401.0]);
        assert_eq!(spec.intensity, vec![1000.0, 500.0]);

        let spec = ens.spectrum_at(2, SpectrumPosition::Time(5.42)).unwrap();
        assert_eq!(spec.mz, vec![150.0, 275.0]);
        assert_eq!(spec.intensity, vec![2000.0, 1000.0]);
    }

    #[test]
    fn test_empty_ms2() {
        let injection = injection(false);
        let ms1 = injection.scan_array(1).unwrap();
        let mut ens = Ensemble::new(vec![ms1.make_feature_pointer(0, None).unwrap()], Vec::new());
        ens.attach(&injection).unwrap();
        assert!(ens.spectrum_at(2, SpectrumPosition::Scan(3)).unwrap().is_empty());
        assert!(ens.composite_spectrum(2).unwrap().is_empty());
        assert!(ens.chromatograms(2, None).unwrap().is_empty());
        assert!(ens.base_chromatogram(2).unwrap().is_none());
    }

    #[test]
    fn test_attach_errors() {
        let with_ms2 = injection(true);
        let without_ms2 = injection(false);

        // MS2 pointers but no MS2 array to resolve them against
        let ms1 = without_ms2.scan_array(1).unwrap();
        let ms2 = with_ms2.scan_array(2).unwrap();
        let mut ens = Ensemble::new(
            vec![ms1.make_feature_pointer(0, None).unwrap()],
            vec![ms2.make_feature_pointer(0, None).unwrap()],
        );
        assert_eq!(
            ens.attach(&without_ms2).unwrap_err(),
            EnsembleError::MissingScanArray(MSLevel::MS2)
        );

        // Pointers from another injection
        let other = injection(true);
        let mut ens = ensemble(&with_ms2);
        assert!(matches!(ens.attach(&other), Err(EnsembleError::Pointer(_))));
        assert!(!ens.is_attached());
    }

    #[test]
    fn test_detach_and_write() {
        let injection = injection(true);
        let mut ens = ensemble(&injection);
        ens.attach(&injection).unwrap();
        let mut buffer = Vec::new();
        write_spectrum(&mut buffer, ens.composite_spectrum(2).unwrap()).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "150\t2000\n275\t1000\n");

        let lists = ens.detach();
        assert_eq!(lists.ms1.len(), 2);
        let mut ens = Ensemble::from(lists);
        assert!(!ens.is_attached());
        ens.attach(&injection).unwrap();
        assert_eq!(ens.base_index().unwrap(), 1);
    }
}
