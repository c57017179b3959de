use thiserror::Error;

use mzlane::{LaneError, PointerError};

use crate::injection::MSLevel;

/// An error that might occur while matching cofeatures or querying an [`Ensemble`](crate::Ensemble)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnsembleError {
    #[error("Invalid MS level {0}, only MS1 and MS2 are supported")]
    InvalidMSLevel(u8),
    #[error("The ensemble has not been attached to an injection")]
    NotAttached,
    #[error("The ensemble is already attached to an injection")]
    AlreadyAttached,
    #[error("The injection has no {0} scan array")]
    MissingScanArray(MSLevel),
    #[error("An ensemble requires at least one MS1 cofeature")]
    EmptyPrimaryCofeatures,
    #[error(transparent)]
    Pointer(#[from] PointerError),
    #[error(transparent)]
    Lane(#[from] LaneError),
}
