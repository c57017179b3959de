use std::iter::Sum;
use std::ops::{Add, AddAssign};

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub ms1_spectra: usize,
    pub ms2_spectra: usize,
    pub spectra_skipped: usize,
    pub ms1_lanes: usize,
    pub ms2_lanes: usize,
    pub search_pointers: usize,
    pub ensembles: usize,
    pub ms1_cofeatures: usize,
    pub ms2_cofeatures: usize,
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.ms1_spectra += rhs.ms1_spectra;
        self.ms2_spectra += rhs.ms2_spectra;
        self.spectra_skipped += rhs.spectra_skipped;
        self.ms1_lanes += rhs.ms1_lanes;
        self.ms2_lanes += rhs.ms2_lanes;
        self.search_pointers += rhs.search_pointers;
        self.ensembles += rhs.ensembles;
        self.ms1_cofeatures += rhs.ms1_cofeatures;
        self.ms2_cofeatures += rhs.ms2_cofeatures;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Self::add)
    }
}
