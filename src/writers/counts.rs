
use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::binning::FeatureReport;

/// Contains all the data written to each row of the counts file
#[derive(Serialize)]
struct CountsRow {
    /// The unique (post-rename) feature name
    #[serde(rename = "FeatureName")]
    feature_name: String,
    /// Total variant observations binned to the feature
    #[serde(rename = "Hits")]
    hits: usize,
    /// Sum of allele fractions across all observations
    #[serde(rename = "WeightedHits")]
    weighted_hits: f64,
    /// Average fraction per observation
    #[serde(rename = "AverageWeight")]
    average_weight: f64,
    /// Number of unique mutations
    #[serde(rename = "UniqueHits")]
    unique_hits: usize,
    /// Number of distinct contributing sources
    #[serde(rename = "NumSamples")]
    num_samples: usize
}

impl CountsRow {
    /// Creates a new row from a finished feature report
    fn new(report: &FeatureReport) -> Self {
        Self {
            feature_name: report.name().to_string(),
            hits: report.hits(),
            weighted_hits: report.weighted_hits(),
            average_weight: report.average_weight(),
            unique_hits: report.unique_hits(),
            num_samples: report.num_samples()
        }
    }
}

/// Writes the per-feature counts file. Reports arrive pre-sorted by descending hit count and
/// are written in that order; features with no variants never reach this writer.
/// # Arguments
/// * `filename` - the output path (tsv, or csv by extension)
/// * `reports` - the aggregated feature reports
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_counts(filename: &Path, reports: &[FeatureReport]) -> csv::Result<()> {
    // modify the delimiter to "," if it ends with .csv
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(filename)?;

    for report in reports.iter() {
        csv_writer.serialize(CountsRow::new(report))?;
    }

    csv_writer.flush()?;
    Ok(())
}
