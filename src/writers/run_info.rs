
use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::binning::BinningStats;

/// The run-level facts reported in `run_info.txt`.
#[derive(Clone, Debug)]
pub struct RunInfo {
    /// The full version string, including the git describe suffix
    pub version: String,
    /// The command line the run was invoked with
    pub command_line: String,
    /// Tallies from the binning pass
    pub stats: BinningStats,
    /// Total number of features loaded from the annotation file
    pub num_features: usize,
    /// Number of features that collected at least one variant
    pub num_reported_features: usize
}

/// Writes the plain-text run report.
/// # Arguments
/// * `filename` - the output path
/// * `run_info` - the collected run-level facts
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_run_info(filename: &Path, run_info: &RunInfo) -> anyhow::Result<()> {
    let file = File::create(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "version: {}", run_info.version)?;
    writeln!(writer, "date: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(writer, "command: {}", run_info.command_line)?;
    writeln!(writer)?;
    writeln!(writer, "input files parsed: {}", run_info.stats.files_parsed)?;
    writeln!(writer, "variant observations: {}", run_info.stats.total_variants())?;
    writeln!(writer, "binned: {}", run_info.stats.binned)?;
    writeln!(writer, "unbinned: {}", run_info.stats.unbinned)?;
    writeln!(writer, "features loaded: {}", run_info.num_features)?;
    writeln!(writer, "features with variants: {}", run_info.num_reported_features)?;

    writer.flush()
        .with_context(|| format!("Error while flushing output to {filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_info_contents() {
        let run_info = RunInfo {
            version: "0.3.1-abc1234".to_string(),
            command_line: "varbin -g anno.gtf -o out calls.vcf".to_string(),
            stats: BinningStats {
                files_parsed: 1,
                binned: 5,
                unbinned: 2
            },
            num_features: 10,
            num_reported_features: 3
        };

        let out = tempfile::NamedTempFile::new().unwrap();
        write_run_info(out.path(), &run_info).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        assert!(content.contains("version: 0.3.1-abc1234"));
        assert!(content.contains("command: varbin -g anno.gtf -o out calls.vcf"));
        assert!(content.contains("variant observations: 7"));
        assert!(content.contains("binned: 5"));
        assert!(content.contains("unbinned: 2"));
        assert!(content.contains("features with variants: 3"));
    }
}
