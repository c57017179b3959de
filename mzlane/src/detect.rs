//! Seed feature pointers from runs of consecutive populated scans in each lane.
use tracing::debug;

use crate::pointer::FeaturePointer;
use crate::scan_array::SparseScanArray;

/// The longest island, in scans, that is kept by default
pub const DEFAULT_MAX_FEATURE_LENGTH: usize = 400;

/// Split every lane into islands of consecutive populated scans and point at each
/// island whose apex is at least `min_height` and whose length, in scans, lies in
/// `min_length..=max_length`. Pointers are ordered by lane, then by scan.
pub fn detect_lane_features(
    array: &SparseScanArray,
    min_height: f32,
    min_length: usize,
    max_length: usize,
) -> Vec<FeaturePointer> {
    let mut pointers = Vec::new();
    for (lane, row) in array.intensity_matrix().rows().enumerate() {
        let mut island: Vec<usize> = Vec::new();
        let mut height = 0.0f32;
        let mut flush = |island: &mut Vec<usize>, height: &mut f32| {
            if !island.is_empty()
                && *height >= min_height
                && island.len() >= min_length
                && island.len() <= max_length
            {
                if let Ok(ptr) = array.make_feature_pointer(lane, Some(island.clone())) {
                    pointers.push(ptr);
                }
            }
            island.clear();
            *height = 0.0;
        };
        for (scan, value) in row.iter() {
            if let Some(last) = island.last().copied() {
                if scan != last + 1 {
                    flush(&mut island, &mut height);
                }
            }
            island.push(scan);
            if value > height {
                height = value;
            }
        }
        flush(&mut island, &mut height);
    }
    debug!("Detected {} lane features", pointers.len());
    pointers
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::frame::SpectrumFrame;
    use crate::scan_array::ScanArrayParameters;

    #[test]
    fn test_islands() {
        // Lane at 300 m/z is populated in scans 0-2 and 6-9, the 600 m/z lane in every scan
        let intensities = [50.0f32, 80.0, 60.0, 0.0, 0.0, 0.0, 10.0, 20.0, 15.0, 5.0];
        let frames: Vec<_> = intensities
            .iter()
            .enumerate()
            .map(|(i, v)| {
                SpectrumFrame::from_arrays(i, i as f64, &[300.0, 600.0, 900.0], &[*v, 1000.0, 1000.0])
            })
            .collect();
        let array =
            SparseScanArray::from_frames(&frames, &ScanArrayParameters::new(0.01, 5, 0.0)).unwrap();
        assert_eq!(array.n_lanes(), 3);

        let features = detect_lane_features(&array, 0.0, 1, DEFAULT_MAX_FEATURE_LENGTH);
        let lane0: Vec<_> = features.iter().filter(|p| p.lane() == 0).collect();
        assert_eq!(lane0.len(), 2);
        assert_eq!(lane0[0].scans(), &[0, 1, 2]);
        assert_eq!(lane0[1].scans(), &[6, 7, 8, 9]);
        assert_eq!(features.len(), 4);

        let features = detect_lane_features(&array, 60.0, 1, DEFAULT_MAX_FEATURE_LENGTH);
        assert_eq!(features.iter().filter(|p| p.lane() == 0).count(), 1);

        let features = detect_lane_features(&array, 0.0, 4, 5);
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].scans(), &[6, 7, 8, 9]);
    }
}
