//! Trace mass lanes across a sequence of centroided spectra and index them as a
//! sparse lane x scan array that can be sliced into chromatograms and spectra.
pub mod detect;
pub mod error;
pub mod frame;
pub mod pointer;
pub mod scan_array;
pub mod series;
pub mod sparse;
pub mod tracker;

pub use detect::{detect_lane_features, DEFAULT_MAX_FEATURE_LENGTH};
pub use error::{LaneError, PointerError};
pub use frame::SpectrumFrame;
pub use pointer::FeaturePointer;
pub use scan_array::{ArrayId, Bounds, ScanArrayParameters, SparseScanArray};
pub use series::{Chromatogram, IonChromatogram, SpectrumSeries};
pub use tracker::{track, MassLane, MassLaneTracker};
