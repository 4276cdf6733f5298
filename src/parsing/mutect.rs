
use anyhow::{anyhow, bail, Context};
use csv::StringRecord;
use std::path::Path;

use crate::data_types::variants::{GenomicPosition, Variant};
use crate::parsing::source_label;

/// The columns the `.out` reconciliation rules need.
const REQUIRED_COLUMNS: [&str; 7] = [
    "contig", "position", "ref_allele", "alt_allele",
    "tumor_f", "t_ref_count", "t_alt_count"
];

/// Parses a MuTect tabular `.out` call file into canonical variants.
/// These files are single-sample: `fraction` comes straight from `tumor_f` and
/// `depth = t_ref_count + t_alt_count`. Rows judged `REJECT` are skipped when the
/// judgement column is present.
/// # Arguments
/// * `filename` - path to the `.out` file
/// # Errors
/// * if the file cannot be opened or a required column is missing
/// * if a numeric column fails to parse (structural, aborts the file)
pub fn parse_mutect_out(filename: &Path) -> anyhow::Result<Vec<Variant>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_path(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    // resolve the column indices once
    let headers = csv_reader.headers()
        .with_context(|| format!("Error while reading header of {filename:?}:"))?
        .clone();
    let column_index = |name: &str| -> anyhow::Result<usize> {
        headers.iter().position(|h| h == name)
            .ok_or(anyhow!("Missing required column {name:?} in {filename:?}"))
    };

    let mut indices = [0usize; REQUIRED_COLUMNS.len()];
    for (slot, name) in indices.iter_mut().zip(REQUIRED_COLUMNS.iter()) {
        *slot = column_index(name)?;
    }
    let [contig_idx, position_idx, ref_idx, alt_idx, tumor_f_idx, ref_count_idx, alt_count_idx] = indices;
    let judgement_idx = headers.iter().position(|h| h == "judgement");

    let source = source_label(filename);
    let mut variants: Vec<Variant> = vec![];
    for (row_number, result) in csv_reader.records().enumerate() {
        let row = result.with_context(|| format!("Error while reading {filename:?}:"))?;

        if let Some(j_idx) = judgement_idx {
            if row.get(j_idx) == Some("REJECT") {
                continue;
            }
        }

        let get = |idx: usize, name: &str| -> anyhow::Result<&str> {
            row.get(idx).ok_or(anyhow!("Row {} is missing column {name:?}", row_number + 1))
        };

        let contig = get(contig_idx, "contig")?.to_string();
        let position: u64 = parse_column(&row, position_idx, "position", row_number)?;
        let fraction: f64 = parse_column(&row, tumor_f_idx, "tumor_f", row_number)?;
        let ref_count: u64 = parse_column(&row, ref_count_idx, "t_ref_count", row_number)?;
        let alt_count: u64 = parse_column(&row, alt_count_idx, "t_alt_count", row_number)?;

        variants.push(Variant::new(
            source.clone(),
            String::new(),
            GenomicPosition::new(contig, position),
            get(ref_idx, "ref_allele")?.to_string(),
            get(alt_idx, "alt_allele")?.to_string(),
            Some(ref_count + alt_count),
            Some(fraction),
            String::new(),
            String::new()
        ));
    }

    Ok(variants)
}

/// Parses one numeric cell with a row/column context on failure.
fn parse_column<T: std::str::FromStr>(row: &StringRecord, index: usize, name: &str, row_number: usize) -> anyhow::Result<T> {
    let raw = match row.get(index) {
        Some(r) => r.trim(),
        None => bail!("Row {} is missing column {name:?}", row_number + 1)
    };
    raw.parse::<T>()
        .map_err(|_| anyhow!("Row {} has non-numeric {name:?} value: {raw:?}", row_number + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use std::io::Write;

    fn write_mock_out(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "## muTector v1.0.47986").unwrap();
        writeln!(file, "contig\tposition\tcontext\tref_allele\talt_allele\ttumor_f\tt_ref_count\tt_alt_count\tjudgement").unwrap();
        for row in rows.iter() {
            writeln!(file, "{row}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_parse_out_file() {
        let file = write_mock_out(&[
            "chr1\t150\tAxT\tA\tT\t0.25\t30\t10\tKEEP",
            "chr2\t500\tGxC\tG\tC\t0.5\t5\t5\tREJECT"
        ]);
        let variants = parse_mutect_out(file.path()).unwrap();

        // the REJECT row is dropped
        assert_eq!(variants.len(), 1);
        let variant = &variants[0];
        assert_eq!(variant.position().contig(), "chr1");
        assert_eq!(variant.position().coordinate(), 150);
        assert_eq!(variant.ref_allele(), "A");
        assert_eq!(variant.alt_allele(), "T");
        assert_eq!(variant.depth(), Some(40));
        assert_approx_eq!(variant.fraction().unwrap(), 0.25);
        assert_eq!(variant.sample(), "");
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "contig\tposition\tref_allele").unwrap();
        writeln!(file, "chr1\t150\tA").unwrap();
        file.flush().unwrap();
        assert!(parse_mutect_out(file.path()).is_err());
    }

    #[test]
    fn test_bad_number_is_fatal() {
        let file = write_mock_out(&["chr1\toops\tAxT\tA\tT\t0.25\t30\t10\tKEEP"]);
        assert!(parse_mutect_out(file.path()).is_err());
    }
}
