use mzlane::FeaturePointer;
use tracing::debug;

use crate::cofeature::{features_in_window, CofeatureParameters};
use crate::ensemble::Ensemble;
use crate::error::EnsembleError;
use crate::injection::Injection;

/// Build an attached [`Ensemble`] around `search_pointer`.
///
/// The MS1 cofeatures are matched within the MS1 scan array, and when the injection has
/// an MS2 scan array, the MS2 cofeatures are matched across into it.
///
/// # Arguments
/// - `injection`: The injection whose MS1 scan array `search_pointer` indexes into
/// - `search_pointer`: The reference feature, which becomes the first MS1 cofeature
/// - `params`: The correlation and intensity thresholds for both MS levels
///
/// # See also
/// - [`CofeatureMatcher::match_within`](crate::CofeatureMatcher::match_within)
/// - [`CofeatureMatcher::match_across`](crate::CofeatureMatcher::match_across)
pub fn cofeature_ensemble<'a>(
    injection: &'a Injection,
    search_pointer: &FeaturePointer,
    params: &CofeatureParameters,
) -> Result<Ensemble<'a>, EnsembleError> {
    let ms1_array = injection.scan_array(1)?;
    let ms1 = params.ms1_matcher().match_within(ms1_array, search_pointer)?;
    let ms2 = match injection.scan_array(2) {
        Ok(ms2_array) => params
            .ms2_matcher()
            .match_across(ms1_array, ms2_array, search_pointer)?,
        Err(EnsembleError::MissingScanArray(_)) => Vec::new(),
        Err(e) => return Err(e),
    };
    let mut ensemble = Ensemble::new(ms1, ms2);
    ensemble.attach(injection)?;
    Ok(ensemble)
}

/// Build one attached [`Ensemble`] per search pointer, stopping at the first failure.
///
/// # See also
/// [`cofeature_ensemble`]
pub fn cofeature_ensembles<'a>(
    injection: &'a Injection,
    search_pointers: &[FeaturePointer],
    params: &CofeatureParameters,
) -> Result<Vec<Ensemble<'a>>, EnsembleError> {
    let ensembles = search_pointers
        .iter()
        .map(|ptr| cofeature_ensemble(injection, ptr, params))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Built {} ensembles for {}",
        ensembles.len(),
        injection.name
    );
    Ok(ensembles)
}

/// Build an attached [`Ensemble`] of every lane that rises above `min_intensity` during
/// the retention time span of `search_pointer`, without checking for correlation.
///
/// # Arguments
/// - `injection`: The injection whose MS1 scan array `search_pointer` indexes into
/// - `search_pointer`: The pointer whose window sets the retention time span
/// - `min_intensity`: A lane's apex inside the span must exceed this
///
/// # See also
/// [`features_in_window`]
pub fn ungrouped_ensemble<'a>(
    injection: &'a Injection,
    search_pointer: &FeaturePointer,
    min_intensity: f32,
) -> Result<Ensemble<'a>, EnsembleError> {
    let ms1_array = injection.scan_array(1)?;
    let times = search_pointer.retention_times(ms1_array)?;
    let (rt_start, rt_end) = match (times.first(), times.last()) {
        (Some(a), Some(b)) => (*a, *b),
        _ => return Err(EnsembleError::EmptyPrimaryCofeatures),
    };
    let ms1 = features_in_window(ms1_array, rt_start, rt_end, min_intensity)?;
    let ms2 = match injection.scan_array(2) {
        Ok(ms2_array) => features_in_window(ms2_array, rt_start, rt_end, min_intensity)?,
        Err(EnsembleError::MissingScanArray(_)) => Vec::new(),
        Err(e) => return Err(e),
    };
    let mut ensemble = Ensemble::new(ms1, ms2);
    ensemble.attach(injection)?;
    Ok(ensemble)
}
