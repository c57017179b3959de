use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::Instant;

use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tracing::{debug, info, warn};

#[cfg(feature = "mzmlb")]
use mzdata::io::mzmlb::MzMLbReaderType;
#[cfg(feature = "thermo")]
use mzdata::io::thermo::ThermoRawReaderType;
use mzdata::io::{
    infer_format, infer_from_stream,
    mgf::MGFReaderType,
    mzml::MzMLReaderType,
    MassSpectrometryFormat, PreBufferedStream, RestartableGzDecoder, StreamingSpectrumIterator,
};
use mzdata::prelude::*;
use mzdata::spectrum::MultiLayerSpectrum;
use mzpeaks::{CentroidPeak, DeconvolutedPeak};

use mzlane::{
    detect_lane_features, FeaturePointer, LaneError, ScanArrayParameters, SparseScanArray,
    SpectrumFrame, DEFAULT_MAX_FEATURE_LENGTH,
};
use mzlane_ensemble::{
    cofeature_ensemble, ungrouped_ensemble, CofeatureParameters, Ensemble, EnsembleError,
    Injection,
};

use crate::args::{non_negative_float_f32, positive_float_f64, Target};
use crate::progress::ProgressRecord;
use crate::time_range::TimeRange;
use crate::write::{open_output, write_ensembles};

pub(crate) type SpectrumType = MultiLayerSpectrum<CentroidPeak, DeconvolutedPeak>;

/// The name of the configuration file read from the working directory
pub const CONFIG_FILE_NAME: &str = "mzlaner.toml";

/// The prefix of environment variables that override configuration values
pub const ENV_PREFIX: &str = "MZLANER_";

#[derive(Debug, Error)]
pub enum MZLanerError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("The input file format for {0} was either unknown or not supported ({1:?})")]
    FormatUnknownOrNotSupportedError(String, MassSpectrometryFormat),
    #[error("The input file format from STDIN was either unknown or not supported ({0:?})")]
    FormatUnknownOrNotSupportedErrorStdIn(MassSpectrometryFormat),
    #[error("No MS1 spectra were read from {0}")]
    NoMS1Spectra(String),
    #[error("Failed to load the configuration: {0}")]
    ConfigurationError(
        #[source]
        #[from]
        figment::Error,
    ),
    #[error("Failed to build a scan array: {0}")]
    LaneError(
        #[source]
        #[from]
        LaneError,
    ),
    #[error("Failed to build an ensemble: {0}")]
    EnsembleError(
        #[source]
        #[from]
        EnsembleError,
    ),
    #[error("Failed to start the thread pool: {0}")]
    ThreadPoolError(
        #[source]
        #[from]
        rayon::ThreadPoolBuildError,
    ),
}

/// Trace mass lanes through a mass spectrometry run and group them into ensembles.
///
/// Read a file or stream, build an MS1 and an MS2 scan array, find the cofeatures
/// of each target, or of each detected lane feature, and write every ensemble's
/// composite spectra as tab-separated text.
#[derive(Parser, Debug, Deserialize, Serialize)]
#[command(author, version)]
pub struct MZLaner {
    /// The path to read the input spectra from, or if '-' is passed, read from STDIN
    #[arg()]
    pub input_file: String,

    /// The path to write the ensembles to, or if '-' is passed, write to STDOUT.
    ///
    /// Paths ending in `.gz` are gzip compressed.
    #[arg(short = 'o', long = "output-file", default_value = "-")]
    pub output_file: PathBuf,

    /// The path to write a log file to, in addition to STDERR
    #[arg(short = 'l', long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// A TOML configuration file to read additional parameters from.
    ///
    /// Configurations are also read from `mzlaner.toml` in the working directory.
    /// Environment variables prefixed with `MZLANER_` will be read too.
    #[arg(long = "config-file")]
    pub config_file: Option<PathBuf>,

    /// The number of threads to use, passing a value < 1 to use all available threads
    #[arg(
        short='t',
        long="threads",
        default_value_t=-1,
    )]
    pub threads: i32,

    /// The time range to process, denoted (start?)-(stop?)
    #[arg(
        short='r',
        long="time-range",
        value_parser=TimeRange::from_str,
        value_name="BEGIN-END",
        long_help=r#"The time range to process, denoted (start?)-(stop?)

If a start is not specified, processing begins from the start of the run.
If a stop is not specified, processing stops at the end of the run.
"#
    )]
    pub time_range: Option<TimeRange>,

    /// Comma-separated m/z@time targets to build ensembles around.
    ///
    /// When no targets are given, every lane feature detected in the MS1 scan array
    /// seeds an ensemble.
    #[arg(
        short = 'T',
        long = "targets",
        value_parser = Target::from_str,
        value_delimiter = ',',
        value_name = "MZ@TIME",
    )]
    pub targets: Vec<Target>,

    /// The largest m/z difference between a target and a lane's label
    #[arg(long = "mz-window", default_value_t = 0.01, value_parser = positive_float_f64)]
    pub mz_window: f64,

    /// The half-width of the retention time window around a target
    #[arg(long = "rt-window", default_value_t = 0.5, value_parser = positive_float_f64)]
    pub rt_window: f64,

    /// The m/z tolerance for extending a lane through MS1 spectra
    #[arg(long = "ms1-mz-tolerance", default_value_t = 0.01, value_parser = positive_float_f64)]
    pub ms1_mz_tolerance: f64,

    /// The m/z tolerance for extending a lane through MS2 spectra
    #[arg(long = "ms2-mz-tolerance", default_value_t = 0.01, value_parser = positive_float_f64)]
    pub ms2_mz_tolerance: f64,

    /// The number of consecutive scans a lane may miss before it is closed
    #[arg(short = 'g', long = "gap-tolerance", default_value_t = 2)]
    pub gap_tolerance: usize,

    /// Signals at or below this intensity are ignored, both when tracing lanes and
    /// when choosing cofeature candidates
    #[arg(
        short = 'i',
        long = "min-intensity",
        default_value_t = 1000.0,
        value_parser = non_negative_float_f32
    )]
    pub min_intensity: f32,

    /// The correlation an MS1 lane must exceed to join an ensemble
    #[arg(long = "ms1-correlation", default_value_t = 0.9)]
    pub ms1_correlation: f64,

    /// The correlation an MS2 lane must exceed to join an ensemble
    #[arg(long = "ms2-correlation", default_value_t = 0.9)]
    pub ms2_correlation: f64,

    /// Correlate raw intensities instead of traces scaled to their own maximum
    #[arg(long = "absolute-intensity")]
    pub absolute_intensity: bool,

    /// The fewest consecutive scans a detected lane feature must span
    #[arg(long = "min-feature-length", default_value_t = 5)]
    pub min_feature_length: usize,

    /// The most consecutive scans a detected lane feature may span
    #[arg(long = "max-feature-length", default_value_t = DEFAULT_MAX_FEATURE_LENGTH)]
    pub max_feature_length: usize,

    /// Group every lane above the intensity floor in each search window, without
    /// checking for correlation
    #[arg(long = "ungrouped")]
    pub ungrouped: bool,
}

impl MZLaner {
    /// Layer the configuration sources over these arguments: `mzlaner.toml` in the
    /// working directory, then `--config-file`, then `MZLANER_` environment variables.
    pub fn layered(self) -> Result<Self, MZLanerError> {
        let mut config = Figment::from(Serialized::defaults(&self)).merge(Toml::file(CONFIG_FILE_NAME));
        if let Some(path) = self.config_file.as_ref() {
            config = config.merge(Toml::file_exact(path));
        }
        config = config.merge(Env::prefixed(ENV_PREFIX));
        Ok(config.extract()?)
    }

    fn create_threadpool(&self) -> Result<rayon::ThreadPool, MZLanerError> {
        let num_threads = if self.threads > 0 {
            self.threads as usize
        } else {
            thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };
        debug!("Using {} cores", num_threads);
        Ok(rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()?)
    }

    pub fn scan_array_parameters(&self) -> [ScanArrayParameters; 2] {
        [
            ScanArrayParameters::new(self.ms1_mz_tolerance, self.gap_tolerance, self.min_intensity),
            ScanArrayParameters::new(self.ms2_mz_tolerance, self.gap_tolerance, self.min_intensity),
        ]
    }

    pub fn cofeature_parameters(&self) -> CofeatureParameters {
        CofeatureParameters {
            ms1_correlation_threshold: self.ms1_correlation,
            ms2_correlation_threshold: self.ms2_correlation,
            min_intensity: self.min_intensity,
            use_relative_intensity: !self.absolute_intensity,
            ..Default::default()
        }
    }

    fn run_name(&self) -> String {
        if self.input_file == "-" {
            return "STDIN".to_string();
        }
        Path::new(&self.input_file)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.input_file.clone())
    }

    pub fn main(&self) -> Result<(), MZLanerError> {
        info!(
            "mzlaner v{}",
            option_env!("CARGO_PKG_VERSION").unwrap_or("unknown")
        );
        info!("Input: {}", self.input_file);
        info!("Output: {}", self.output_file.display());
        if !self.targets.is_empty() {
            info!("Targets: {}", self.targets.iter().join(", "));
        }
        match toml::to_string_pretty(self) {
            Ok(config) => debug!("Effective configuration:\n{config}"),
            Err(e) => debug!("Failed to render the effective configuration: {e}"),
        }
        self.create_threadpool()?.install(|| self.run())
    }

    fn run(&self) -> Result<(), MZLanerError> {
        let start = Instant::now();
        let (ms1_frames, ms2_frames, mut progress) = self.reader_then()?;
        info!("MS1 Spectra: {}", progress.ms1_spectra);
        info!("MS2 Spectra: {}", progress.ms2_spectra);
        if progress.spectra_skipped > 0 {
            info!("Spectra Skipped: {}", progress.spectra_skipped);
        }
        if ms1_frames.is_empty() {
            return Err(MZLanerError::NoMS1Spectra(self.input_file.clone()));
        }

        let mut writer = open_output(&self.output_file)?;
        progress += self.process_frames(self.run_name(), ms1_frames, ms2_frames, &mut writer)?;

        info!(
            "MS1 Lanes: {} | MS2 Lanes: {}",
            progress.ms1_lanes, progress.ms2_lanes
        );
        info!("Search Pointers: {}", progress.search_pointers);
        info!(
            "Ensembles: {} | MS1 Cofeatures: {} | MS2 Cofeatures: {}",
            progress.ensembles, progress.ms1_cofeatures, progress.ms2_cofeatures
        );
        info!("Elapsed Time: {:0.3?}", start.elapsed());
        Ok(())
    }

    fn reader_then(
        &self,
    ) -> Result<(Vec<SpectrumFrame>, Vec<SpectrumFrame>, ProgressRecord), MZLanerError> {
        if self.input_file == "-" {
            let mut buffered =
                PreBufferedStream::new_with_buffer_size(io::stdin(), 2usize.pow(20))?;
            let (ms_format, compressed) = infer_from_stream(&mut buffered)?;
            debug!("Detected {ms_format:?} from STDIN (compressed? {compressed})");
            match ms_format {
                MassSpectrometryFormat::MGF => {
                    if compressed {
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MGFReaderType::new(
                            RestartableGzDecoder::new(io::BufReader::new(buffered)),
                        ))))
                    } else {
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MGFReaderType::new(
                            buffered,
                        ))))
                    }
                }
                MassSpectrometryFormat::MzML => {
                    if compressed {
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MzMLReaderType::new(
                            RestartableGzDecoder::new(io::BufReader::new(buffered)),
                        ))))
                    } else {
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MzMLReaderType::new(
                            buffered,
                        ))))
                    }
                }
                _ => Err(MZLanerError::FormatUnknownOrNotSupportedErrorStdIn(
                    ms_format,
                )),
            }
        } else {
            let (ms_format, compressed) = infer_format(&self.input_file)?;
            debug!("Detected {ms_format:?} from path (compressed? {compressed})");
            match ms_format {
                MassSpectrometryFormat::MGF => {
                    if compressed {
                        let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(
                            &self.input_file,
                        )?));
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MGFReaderType::new(fh))))
                    } else {
                        Ok(self.read_frames(MGFReaderType::open_path(self.input_file.clone())?))
                    }
                }
                MassSpectrometryFormat::MzML => {
                    if compressed {
                        let fh = RestartableGzDecoder::new(io::BufReader::new(fs::File::open(
                            &self.input_file,
                        )?));
                        Ok(self.read_frames(StreamingSpectrumIterator::new(MzMLReaderType::new(fh))))
                    } else {
                        Ok(self.read_frames(MzMLReaderType::open_path(self.input_file.clone())?))
                    }
                }
                #[cfg(feature = "mzmlb")]
                MassSpectrometryFormat::MzMLb => {
                    Ok(self.read_frames(MzMLbReaderType::open_path(self.input_file.clone())?))
                }
                #[cfg(feature = "thermo")]
                MassSpectrometryFormat::ThermoRaw => {
                    Ok(self.read_frames(ThermoRawReaderType::open_path(self.input_file.clone())?))
                }
                _ => Err(MZLanerError::FormatUnknownOrNotSupportedError(
                    self.input_file.clone(),
                    ms_format,
                )),
            }
        }
    }

    /// Partition centroided spectra into MS1 and MS2 frames, honoring the time range.
    /// Profile spectra and spectra of other MS levels are counted as skipped.
    pub fn read_frames<I: Iterator<Item = SpectrumType>>(
        &self,
        spectra: I,
    ) -> (Vec<SpectrumFrame>, Vec<SpectrumFrame>, ProgressRecord) {
        let time_range = self.time_range.unwrap_or_default();
        let mut progress = ProgressRecord::default();
        let mut ms1_frames = Vec::new();
        let mut ms2_frames = Vec::new();
        for spectrum in spectra {
            let time = spectrum.start_time();
            if time > time_range.end {
                break;
            }
            if !time_range.contains(time) {
                continue;
            }
            let ms_level = spectrum.ms_level();
            if !(1..=2).contains(&ms_level) {
                progress.spectra_skipped += 1;
                continue;
            }
            let index = spectrum.index();
            let id = spectrum.id().to_string();
            let frame = match spectrum.into_centroid() {
                Ok(centroided) => SpectrumFrame::new(index, time, centroided.peaks),
                Err(e) => {
                    if progress.spectra_skipped == 0 {
                        warn!("Skipping {id} which is not centroided: {e}");
                    } else {
                        debug!("Skipping {id} which is not centroided: {e}");
                    }
                    progress.spectra_skipped += 1;
                    continue;
                }
            };
            if ms_level == 1 {
                progress.ms1_spectra += 1;
                ms1_frames.push(frame);
            } else {
                progress.ms2_spectra += 1;
                ms2_frames.push(frame);
            }
        }
        (ms1_frames, ms2_frames, progress)
    }

    /// Build both scan arrays in parallel. An MS2 level with no frames, or with no
    /// signal above the intensity floor, is left out.
    pub fn build_injection(
        &self,
        name: String,
        ms1_frames: &[SpectrumFrame],
        ms2_frames: &[SpectrumFrame],
    ) -> Result<Injection, MZLanerError> {
        let parameters = self.scan_array_parameters();
        let (ms1, ms2) = rayon::join(
            || SparseScanArray::from_frames(ms1_frames, &parameters[0]),
            || -> Result<Option<SparseScanArray>, LaneError> {
                if ms2_frames.is_empty() {
                    return Ok(None);
                }
                match SparseScanArray::from_frames(ms2_frames, &parameters[1]) {
                    Ok(array) => Ok(Some(array)),
                    Err(LaneError::NoFeaturesFound) => {
                        warn!("No MS2 signal above {}", parameters[1].min_intensity);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            },
        );
        Ok(Injection::from_arrays(name, parameters, ms1?, ms2?))
    }

    /// The MS1 pointers to build ensembles around: one per target that resolves to a
    /// lane, or every detected lane feature when there are no targets
    pub fn search_pointers(&self, array: &SparseScanArray) -> Vec<FeaturePointer> {
        if self.targets.is_empty() {
            return detect_lane_features(
                array,
                self.min_intensity,
                self.min_feature_length,
                self.max_feature_length,
            );
        }
        self.targets
            .iter()
            .filter_map(|target| {
                match array.extract_feature_pointer(
                    target.mz,
                    self.mz_window,
                    target.time,
                    self.rt_window,
                ) {
                    Ok(Some(ptr)) => Some(ptr),
                    Ok(None) => {
                        warn!("No lane within {} of target {target}", self.mz_window);
                        None
                    }
                    Err(e) => {
                        warn!("Skipping target {target}: {e}");
                        None
                    }
                }
            })
            .collect()
    }

    fn build_ensembles<'a>(
        &self,
        injection: &'a Injection,
        pointers: &[FeaturePointer],
    ) -> Result<Vec<Ensemble<'a>>, EnsembleError> {
        let params = self.cofeature_parameters();
        pointers
            .par_iter()
            .map(|ptr| {
                if self.ungrouped {
                    ungrouped_ensemble(injection, ptr, self.min_intensity)
                } else {
                    cofeature_ensemble(injection, ptr, &params)
                }
            })
            .collect()
    }

    /// Build the injection from already partitioned frames, group its lanes into
    /// ensembles, and write them to `writer`
    pub fn process_frames<W: Write>(
        &self,
        name: String,
        ms1_frames: Vec<SpectrumFrame>,
        ms2_frames: Vec<SpectrumFrame>,
        writer: &mut W,
    ) -> Result<ProgressRecord, MZLanerError> {
        let injection = self.build_injection(name, &ms1_frames, &ms2_frames)?;
        drop(ms1_frames);
        drop(ms2_frames);

        let mut progress = ProgressRecord {
            ms1_lanes: injection.scan_array(1)?.n_lanes(),
            ms2_lanes: injection
                .scan_array(2)
                .map(|array| array.n_lanes())
                .unwrap_or_default(),
            ..Default::default()
        };

        let pointers = self.search_pointers(injection.scan_array(1)?);
        progress.search_pointers = pointers.len();
        let ensembles = self.build_ensembles(&injection, &pointers)?;
        progress += write_ensembles(writer, &ensembles)?;
        Ok(progress)
    }
}
