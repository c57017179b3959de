use mzlane::{detect_lane_features, ScanArrayParameters, SpectrumFrame};
use mzlane_ensemble::{
    cofeature_ensemble, cofeature_ensembles, ungrouped_ensemble, CofeatureParameters,
    EnsembleError, Injection, SpectrumPosition,
};

fn peak(t: f64, center: f64, height: f64) -> f32 {
    (height * (-((t - center) / 0.2).powi(2)).exp()) as f32
}

/// A precursor at 500 m/z with its isotope at 500.5 m/z eluting at 0.5, and an
/// unrelated precursor at 800 m/z eluting at 0.9
fn ms1_frames() -> Vec<SpectrumFrame> {
    (0..12)
        .map(|i| {
            let t = i as f64 * 0.1;
            SpectrumFrame::from_arrays(
                i,
                t,
                &[500.0, 500.5, 800.0],
                &[peak(t, 0.5, 10000.0), peak(t, 0.5, 6000.0), peak(t, 0.9, 10000.0)],
            )
        })
        .collect()
}

/// Fragments of the first precursor at 200 and 300 m/z, and of the second at 450 m/z,
/// sampled between the MS1 scans
fn ms2_frames(offset: f64) -> Vec<SpectrumFrame> {
    (0..12)
        .map(|i| {
            let t = offset + 0.03 + i as f64 * 0.1;
            SpectrumFrame::from_arrays(
                i,
                t,
                &[200.0, 300.0, 450.0],
                &[
                    peak(t - offset, 0.5, 10000.0),
                    peak(t - offset, 0.5, 3000.0),
                    peak(t - offset, 0.9, 10000.0),
                ],
            )
        })
        .collect()
}

fn params() -> [ScanArrayParameters; 2] {
    [ScanArrayParameters::new(0.01, 3, 1.0); 2]
}

fn injection() -> Injection {
    Injection::from_frames("sample".into(), &ms1_frames(), &ms2_frames(0.0), params()).unwrap()
}

#[test_log::test]
fn test_cofeature_ensemble() {
    let injection = injection();
    let ms1 = injection.scan_array(1).unwrap();
    let ms2 = injection.scan_array(2).unwrap();
    assert_eq!(ms1.n_lanes(), 3);
    assert_eq!(ms2.n_lanes(), 3);

    let search = ms1.make_feature_pointer(0, None).unwrap();
    let ensemble = cofeature_ensemble(&injection, &search, &CofeatureParameters::default()).unwrap();

    let ms1_lanes: Vec<_> = ensemble.cofeatures(1).unwrap().iter().map(|p| p.lane()).collect();
    assert_eq!(ms1_lanes, vec![0, 1]);
    let ms2_lanes: Vec<_> = ensemble.cofeatures(2).unwrap().iter().map(|p| p.lane()).collect();
    assert_eq!(ms2_lanes, vec![0, 1]);

    assert_eq!(ensemble.base_cofeature().unwrap(), &search);
    assert_eq!(ensemble.base_scan().unwrap(), 5);
    assert!((ensemble.base_mz().unwrap() - 500.0).abs() < 1e-9);

    let spectrum = ensemble.composite_spectrum(2).unwrap();
    assert_eq!(spectrum.mz, vec![200.0, 300.0]);
    assert!(spectrum.intensity[0] > spectrum.intensity[1]);
}

#[test]
fn test_second_precursor() {
    let injection = injection();
    let ms1 = injection.scan_array(1).unwrap();
    let search = ms1.make_feature_pointer(2, None).unwrap();
    let ensemble = cofeature_ensemble(&injection, &search, &CofeatureParameters::default()).unwrap();
    assert_eq!(ensemble.cofeatures(1).unwrap().len(), 1);
    let ms2_lanes: Vec<_> = ensemble.cofeatures(2).unwrap().iter().map(|p| p.lane()).collect();
    assert_eq!(ms2_lanes, vec![2]);
}

#[test]
fn test_disjoint_ms2_is_valid() {
    // The MS2 scans were acquired well after the precursor eluted
    let injection =
        Injection::from_frames("late".into(), &ms1_frames(), &ms2_frames(50.0), params()).unwrap();
    let search = injection.scan_array(1).unwrap().make_feature_pointer(0, None).unwrap();
    let ensemble = cofeature_ensemble(&injection, &search, &CofeatureParameters::default()).unwrap();
    assert!(ensemble.cofeatures(2).unwrap().is_empty());
    assert!(ensemble
        .spectrum_at(2, SpectrumPosition::Time(0.5))
        .unwrap()
        .is_empty());
    assert_eq!(ensemble.spectrum_at(1, SpectrumPosition::Time(0.5)).unwrap().len(), 2);
}

#[test]
fn test_without_ms2() {
    let injection = Injection::from_frames("ms1".into(), &ms1_frames(), &[], params()).unwrap();
    let search = injection.scan_array(1).unwrap().make_feature_pointer(0, None).unwrap();
    let ensemble = cofeature_ensemble(&injection, &search, &CofeatureParameters::default()).unwrap();
    assert_eq!(ensemble.cofeatures(1).unwrap().len(), 2);
    assert!(ensemble.cofeatures(2).unwrap().is_empty());
}

#[test]
fn test_ungrouped_ensemble() {
    let injection = injection();
    let ms1 = injection.scan_array(1).unwrap();
    let search = ms1.make_feature_pointer(0, Some(vec![4, 5, 6])).unwrap();
    let ensemble = ungrouped_ensemble(&injection, &search, 2000.0).unwrap();
    let ms1_lanes: Vec<_> = ensemble.cofeatures(1).unwrap().iter().map(|p| p.lane()).collect();
    assert_eq!(ms1_lanes, vec![0, 1]);
    let ms2 = ensemble.cofeatures(2).unwrap();
    assert_eq!(ms2.iter().map(|p| p.lane()).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(ms2[0].scans(), &[4, 5, 6]);
}

#[test]
fn test_detected_seeds() {
    let injection = injection();
    let ms1 = injection.scan_array(1).unwrap();
    let seeds = detect_lane_features(ms1, 5000.0, 3, 400);
    assert_eq!(seeds.len(), 3);
    let ensembles = cofeature_ensembles(&injection, &seeds, &CofeatureParameters::default()).unwrap();
    assert_eq!(ensembles.len(), 3);
    for (seed, ensemble) in seeds.iter().zip(ensembles.iter()) {
        assert_eq!(&ensemble.cofeatures(1).unwrap()[0], seed);
    }
}

#[test]
fn test_foreign_pointer() {
    let injection = injection();
    let other = self::injection();
    let search = other.scan_array(1).unwrap().make_feature_pointer(0, None).unwrap();
    let err = cofeature_ensemble(&injection, &search, &CofeatureParameters::default()).unwrap_err();
    assert!(matches!(err, EnsembleError::Pointer(_)));
}
