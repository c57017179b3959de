//! Dense signal series produced by slicing a [`SparseScanArray`](crate::SparseScanArray)

/// Parallel retention time and intensity arrays
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chromatogram {
    pub time: Vec<f64>,
    pub intensity: Vec<f32>,
}

impl Chromatogram {
    pub fn new(time: Vec<f64>, intensity: Vec<f32>) -> Self {
        Self { time, intensity }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.time
            .iter()
            .copied()
            .zip(self.intensity.iter().copied())
    }

    /// The position, time, and intensity of the first most intense point
    pub fn apex(&self) -> Option<(usize, f64, f32)> {
        let mut best: Option<(usize, f64, f32)> = None;
        for (i, (t, v)) in self.iter().enumerate() {
            match best {
                Some((_, _, b)) if !(v > b) => {}
                _ => best = Some((i, t, v)),
            }
        }
        best
    }
}

/// An extracted ion chromatogram: summed intensity per scan and the m/z of the
/// largest contributor in that scan
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IonChromatogram {
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
    pub time: Vec<f64>,
}

impl IonChromatogram {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Parallel m/z and intensity arrays
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpectrumSeries {
    pub mz: Vec<f64>,
    pub intensity: Vec<f32>,
}

impl SpectrumSeries {
    pub fn new(mz: Vec<f64>, intensity: Vec<f32>) -> Self {
        Self { mz, intensity }
    }

    pub fn len(&self) -> usize {
        self.mz.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mz.is_empty()
    }

    pub fn push(&mut self, mz: f64, intensity: f32) {
        self.mz.push(mz);
        self.intensity.push(intensity);
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f32)> + '_ {
        self.mz.iter().copied().zip(self.intensity.iter().copied())
    }

    /// Re-order the pairs by ascending m/z
    pub fn sort_by_mz(&mut self) {
        let mut pairs: Vec<(f64, f32)> = self.iter().collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        (self.mz, self.intensity) = pairs.into_iter().unzip();
    }
}

impl FromIterator<(f64, f32)> for SpectrumSeries {
    fn from_iter<T: IntoIterator<Item = (f64, f32)>>(iter: T) -> Self {
        let (mz, intensity) = iter.into_iter().unzip();
        Self { mz, intensity }
    }
}
