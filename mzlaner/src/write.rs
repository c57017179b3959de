use std::fs;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use mzlane_ensemble::{write_spectrum, Ensemble};

use crate::driver::MZLanerError;
use crate::progress::ProgressRecord;

/// Open the output stream: STDOUT for `-`, a gzip stream for paths ending in `.gz`,
/// otherwise a plain file
pub(crate) fn open_output(path: &Path) -> io::Result<Box<dyn Write + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::BufWriter::new(io::stdout())));
    }
    let handle = io::BufWriter::new(fs::File::create(path)?);
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(GzEncoder::new(handle, Compression::best())))
    } else {
        Ok(Box::new(handle))
    }
}

fn write_header<W: Write>(
    writer: &mut W,
    index: usize,
    ensemble: &Ensemble<'_>,
) -> Result<(), MZLanerError> {
    let base_scan = ensemble.base_scan()?;
    let scan_number = ensemble
        .injection()?
        .scan_array(1)?
        .scan_numbers()
        .get(base_scan)
        .copied()
        .unwrap_or(base_scan);
    writeln!(
        writer,
        ">ensemble={index}\tmz={:.4}\ttime={:.3}\tintensity={}\tscan={scan_number}",
        ensemble.base_mz()?,
        ensemble.peak_time()?,
        ensemble.base_intensity()?,
    )?;
    Ok(())
}

/// Write each ensemble as a header line followed by its composite MS1 and MS2 spectra.
///
/// ```text
/// >ensemble=0	mz=500.0000	time=0.500	intensity=10000	scan=5
/// #MS1	2
/// 500	10000
/// 500.5	6000
/// #MS2	0
/// ```
pub fn write_ensembles<W: Write>(
    writer: &mut W,
    ensembles: &[Ensemble<'_>],
) -> Result<ProgressRecord, MZLanerError> {
    let mut progress = ProgressRecord::default();
    for (i, ensemble) in ensembles.iter().enumerate() {
        write_header(writer, i, ensemble)?;
        for ms_level in [1u8, 2] {
            let spectrum = ensemble.composite_spectrum(ms_level)?;
            writeln!(writer, "#MS{ms_level}\t{}", spectrum.len())?;
            write_spectrum(writer, spectrum)?;
        }
        progress.ensembles += 1;
        progress.ms1_cofeatures += ensemble.cofeatures(1)?.len();
        progress.ms2_cofeatures += ensemble.cofeatures(2)?.len();
    }
    writer.flush()?;
    Ok(progress)
}
