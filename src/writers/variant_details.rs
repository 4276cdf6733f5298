
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::binning::{iter_merged, FeatureReport};
use crate::parsing::known_variants::KnownVariants;

/// Contains all the data written to each row of the detail file.
/// Multi-source fields carry `, `-joined values in contributing-record order.
#[derive(Serialize)]
struct DetailRow<'a> {
    #[serde(rename = "Feature")]
    feature: &'a str,
    #[serde(rename = "Contig")]
    contig: &'a str,
    /// 1-based position, matching the input convention
    #[serde(rename = "Pos")]
    position: u64,
    #[serde(rename = "Ref")]
    ref_allele: &'a str,
    #[serde(rename = "Alt")]
    alt_allele: &'a str,
    /// Allele fractions, `.` for undeterminable entries
    #[serde(rename = "VF")]
    fractions: &'a str,
    /// Read depths, `.` for undeterminable entries
    #[serde(rename = "DP")]
    depths: &'a str,
    #[serde(rename = "Effect")]
    effects: &'a str,
    #[serde(rename = "FC")]
    functional_consequences: &'a str,
    #[serde(rename = "Source")]
    sources: &'a str,
    /// Number of contributing records, the mutation's support count
    #[serde(rename = "Count")]
    count: usize
}

/// Writes the per-mutation detail file, one row per unique mutation per feature.
/// Rows at positions present in the known-variant lookup are excluded.
/// # Arguments
/// * `filename` - the output path (tsv, or csv by extension)
/// * `reports` - the aggregated feature reports, in report order
/// * `known_variants` - optional exclusion lookup
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_variant_details(
    filename: &Path,
    reports: &[FeatureReport],
    known_variants: Option<&KnownVariants>
) -> csv::Result<()> {
    let is_csv: bool = filename.extension().unwrap_or_default() == "csv";
    let delimiter: u8 = if is_csv { b',' } else { b'\t' };
    let mut csv_writer: csv::Writer<File> = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(filename)?;

    for (report, merged) in iter_merged(reports) {
        let position = merged.position();
        if let Some(known) = known_variants {
            if known.contains(position.contig(), position.coordinate()) {
                continue;
            }
        }

        csv_writer.serialize(DetailRow {
            feature: report.name(),
            contig: position.contig(),
            position: position.coordinate(),
            ref_allele: merged.ref_allele(),
            alt_allele: merged.alt_allele(),
            fractions: merged.fractions(),
            depths: merged.depths(),
            effects: merged.effects(),
            functional_consequences: merged.functional_consequences(),
            sources: merged.sources(),
            count: merged.num_sources()
        })?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Writes the companion BED file of reported mutation positions, converting the 1-based
/// coordinates to the 0-based half-open BED convention. The known-variant exclusion applies
/// here as well so the two files stay in lockstep.
/// # Arguments
/// * `filename` - the output .bed path
/// * `reports` - the aggregated feature reports, in report order
/// * `known_variants` - optional exclusion lookup
/// # Errors
/// * if opening or writing to the file throw errors
pub fn write_variant_locations(
    filename: &Path,
    reports: &[FeatureReport],
    known_variants: Option<&KnownVariants>
) -> anyhow::Result<()> {
    let file = File::create(filename)
        .with_context(|| format!("Error while creating {filename:?}:"))?;
    let mut writer = BufWriter::new(file);

    for (report, merged) in iter_merged(reports) {
        let position = merged.position();
        if let Some(known) = known_variants {
            if known.contains(position.contig(), position.coordinate()) {
                continue;
            }
        }

        writeln!(
            writer, "{}\t{}\t{}\t{}",
            position.contig(), position.coordinate() - 1, position.coordinate(), report.name()
        ).with_context(|| format!("Error while writing to {filename:?}:"))?;
    }

    writer.flush()
        .with_context(|| format!("Error while flushing output to {filename:?}:"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as IoWrite;
    use std::path::PathBuf;

    use crate::binning::{aggregate_features, process_variant_files, EngineConfig};
    use crate::feature_index::build_feature_space;
    use crate::parsing::gff::GffReader;

    fn mock_reports() -> Vec<FeatureReport> {
        let mut gff = tempfile::NamedTempFile::new().unwrap();
        writeln!(gff, "chr1\thavana\tgene\t100\t200\t.\t+\t.\tgene_id \"GENE1\";").unwrap();
        gff.flush().unwrap();
        let records: Vec<_> = GffReader::from_path(gff.path()).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        let (mut catalog, index) = build_feature_space(records, "gene_id").unwrap();

        let mut vcf = tempfile::Builder::new().suffix(".vcf").tempfile().unwrap();
        writeln!(vcf, "##samtoolsVersion=0.1.19").unwrap();
        writeln!(vcf, "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1").unwrap();
        writeln!(vcf, "chr1\t150\t.\tA\tT\t50\tPASS\tMQ=40\tDP4\t5,5,3,2").unwrap();
        writeln!(vcf, "chr1\t180\t.\tG\tC\t50\tPASS\tMQ=40\tDP4\t10,0,5,5").unwrap();
        vcf.flush().unwrap();

        let filenames: Vec<PathBuf> = vec![vcf.path().to_path_buf()];
        process_variant_files(&filenames, &EngineConfig::default(), &mut catalog, &index).unwrap();
        aggregate_features(&catalog)
    }

    #[test]
    fn test_detail_file_shape() {
        let reports = mock_reports();
        let out = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        write_variant_details(out.path(), &reports, None).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Feature\tContig\tPos\tRef\tAlt\tVF\tDP\tEffect\tFC\tSource\tCount");
        assert!(lines[1].starts_with("GENE1\tchr1\t150\tA\tT\t"));
        assert!(lines[2].starts_with("GENE1\tchr1\t180\tG\tC\t"));
    }

    #[test]
    fn test_known_variant_exclusion() {
        let reports = mock_reports();

        let mut known_file = tempfile::NamedTempFile::new().unwrap();
        writeln!(known_file, "chr1\t150\trs12345").unwrap();
        known_file.flush().unwrap();
        let known = KnownVariants::from_tsv(known_file.path()).unwrap();

        let out = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        write_variant_details(out.path(), &reports, Some(&known)).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // the known position at 150 is excluded, 180 survives
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\t180\t"));
    }

    #[test]
    fn test_bed_coordinates() {
        let reports = mock_reports();
        let out = tempfile::Builder::new().suffix(".bed").tempfile().unwrap();
        write_variant_locations(out.path(), &reports, None).unwrap();

        let content = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec![
            "chr1\t149\t150\tGENE1",
            "chr1\t179\t180\tGENE1"
        ]);
    }
}
