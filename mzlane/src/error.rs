use thiserror::Error;

use crate::scan_array::ArrayId;

/// An error that might occur while tracing lanes or assembling a [`SparseScanArray`](crate::SparseScanArray)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LaneError {
    #[error("The minimum intensity must not be negative, received {0}")]
    NegativeMinimumIntensity(f32),
    #[error("No mass lanes survived tracing")]
    NoFeaturesFound,
    #[error("No spectrum frames were provided")]
    EmptyInput,
    #[error("Expected {expected} scan numbers, found {found}")]
    ScanNumberMismatch { expected: usize, found: usize },
}

/// An error that might occur when a [`FeaturePointer`](crate::FeaturePointer) is created or resolved
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PointerError {
    #[error("Feature pointer belongs to scan array {expected}, but was resolved against {found}")]
    IdentityMismatch { expected: ArrayId, found: ArrayId },
    #[error("Lane {lane} is out of bounds for an array with {lanes} lanes")]
    LaneOutOfBounds { lane: usize, lanes: usize },
    #[error("Scan {scan} is out of bounds for an array with {scans} scans")]
    ScanOutOfBounds { scan: usize, scans: usize },
    #[error("A feature pointer must cover at least one scan")]
    EmptyScanWindow,
}
