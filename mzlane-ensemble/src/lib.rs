//! Group mass lanes whose intensity traces co-vary into ensembles spanning an MS1 scan
//! array and, optionally, an MS2 scan array.
mod api;
mod cofeature;
pub mod correlation;
mod ensemble;
mod error;
mod injection;

pub use api::{cofeature_ensemble, cofeature_ensembles, ungrouped_ensemble};
pub use cofeature::{
    features_in_window, match_across, match_within, CofeatureMatcher, CofeatureParameters,
};
pub use ensemble::{write_spectrum, CofeatureLists, Ensemble, SpectrumPosition};
pub use error::EnsembleError;
pub use injection::{Injection, MSLevel};
