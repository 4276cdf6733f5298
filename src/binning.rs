
use anyhow::{anyhow, Context};
use derive_builder::Builder;
use indicatif::ParallelProgressIterator;
use log::debug;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use crate::data_types::features::Feature;
use crate::data_types::variants::{join_alternate_alleles, GenomicPosition, MergedVariant, Variant};
use crate::feature_index::{FeatureCatalog, IntervalIndex};
use crate::parsing::annotations::extract_annotations;
use crate::parsing::formats::{CallerFormat, FieldMap, SampleMap};
use crate::parsing::mutect::parse_mutect_out;
use crate::parsing::source_label;
use crate::parsing::vcf::VcfReader;
use crate::util::progress_bar::get_progress_style;

/// Controls how the input files are parsed and binned
#[derive(Builder, Clone)]
#[builder(default)]
pub struct EngineConfig {
    /// The identifying annotation attribute to bin by
    feature_key: String,
    /// If set, every input is parsed with this caller format instead of header auto-detection
    format_override: Option<CallerFormat>
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            feature_key: "gene_id".to_string(),
            format_override: None
        }
    }
}

impl EngineConfig {
    // mostly getters
    pub fn feature_key(&self) -> &str {
        &self.feature_key
    }

    pub fn format_override(&self) -> Option<CallerFormat> {
        self.format_override
    }
}

/// Run-level tallies from the binning pass, surfaced in the run report.
#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct BinningStats {
    /// Number of input files parsed
    pub files_parsed: usize,
    /// Variant observations that landed in at least one feature
    pub binned: usize,
    /// Variant observations outside every feature interval
    pub unbinned: usize
}

impl BinningStats {
    /// Total variant observations seen across all inputs.
    pub fn total_variants(&self) -> usize {
        self.binned + self.unbinned
    }
}

/// Parses one variant input file into canonical variants.
/// Tabular MuTect `.out` files are routed by extension (or by an explicit override); everything
/// else is read as VCF, with the caller format taken from the override or the file's own header.
/// # Arguments
/// * `filename` - the input file path
/// * `config` - engine configuration, consulted for the format override
/// # Errors
/// * if the file cannot be opened or parsed
/// * if no caller format can be determined for a VCF input
pub fn parse_variant_file(filename: &Path, config: &EngineConfig) -> anyhow::Result<Vec<Variant>> {
    let is_out_extension = filename.extension().unwrap_or_default() == "out";
    let forced = config.format_override();
    if forced.map(|f| f.is_tabular()).unwrap_or(is_out_extension) {
        return parse_mutect_out(filename);
    }

    let reader = VcfReader::from_path(filename)?;
    let format = forced.or(reader.header().detected_format)
        .ok_or(anyhow!("Unable to detect the caller format of {filename:?}; specify one explicitly"))?;
    debug!("Parsing {filename:?} as {format}...");
    if reader.header().snpeff_annotated {
        debug!("SnpEff annotations detected in {filename:?}");
    }

    let source = source_label(filename);
    let mut variants: Vec<Variant> = vec![];
    for result in reader {
        let record = result.with_context(|| format!("Error while reading {filename:?}:"))?;
        if record.filter == "REJECT" {
            continue;
        }

        let labels = extract_annotations(&record.info);
        let alt_allele = join_alternate_alleles(&record.alternates);

        // files with no sample columns (INFO-only callers) still produce one observation
        let parsed = if record.samples.is_empty() {
            let mut anonymous = SampleMap::default();
            anonymous.insert(String::new(), FieldMap::default());
            format.parse_samples(&record.info, &anonymous)
        } else {
            format.parse_samples(&record.info, &record.samples)
        }.with_context(|| format!("Error while reconciling {}:{} in {filename:?}:", record.contig, record.position))?;

        for (sample, depths) in parsed {
            variants.push(Variant::new(
                source.clone(),
                sample,
                GenomicPosition::new(record.contig.clone(), record.position),
                record.reference.clone(),
                alt_allele.clone(),
                depths.depth,
                depths.fraction,
                labels.effect.clone(),
                labels.functional_consequence.clone()
            ));
        }
    }

    Ok(variants)
}

/// Parses every input file in parallel, then bins the collected variants into the catalog.
/// Parsing failures in any file abort the run; binning itself only fails on internal
/// catalog/index disagreement.
/// # Arguments
/// * `filenames` - the variant input files
/// * `config` - engine configuration
/// * `catalog` - the feature catalog receiving the binned variants
/// * `index` - the interval index built alongside the catalog
/// # Errors
/// * if any input file fails to parse
pub fn process_variant_files(
    filenames: &[PathBuf],
    config: &EngineConfig,
    catalog: &mut FeatureCatalog,
    index: &IntervalIndex
) -> anyhow::Result<BinningStats> {
    // parallel parse with a join barrier, then a sequential pass over the shared catalog
    let style = get_progress_style();
    let parsed: Vec<Vec<Variant>> = filenames.par_iter()
        .map(|filename| {
            parse_variant_file(filename, config)
                .with_context(|| format!("Error while parsing {filename:?}:"))
        })
        .progress_with_style(style)
        .collect::<anyhow::Result<_>>()?;

    let mut stats = BinningStats {
        files_parsed: filenames.len(),
        ..Default::default()
    };
    for variants in parsed.into_iter() {
        for variant in variants.into_iter() {
            let hits = index.query(variant.position().contig(), variant.position().coordinate());
            if hits.is_empty() {
                stats.unbinned += 1;
                continue;
            }

            // a variant inside overlapping features lands in every one of them
            stats.binned += 1;
            for name in hits.iter() {
                catalog.attach_variant(name, variant.clone())?;
            }
        }
    }

    Ok(stats)
}

/// The aggregated report content for one feature with at least one binned variant.
#[derive(Clone, Debug)]
pub struct FeatureReport {
    /// The unique (post-rename) feature name
    name: String,
    /// Total variant observations binned to the feature
    hits: usize,
    /// Sum of allele fractions across all observations
    weighted_hits: f64,
    /// Average fraction per observation
    average_weight: f64,
    /// Number of unique mutations
    unique_hits: usize,
    /// Number of distinct contributing sources
    num_samples: usize,
    /// One consolidated entry per unique mutation, in report order
    merged_variants: Vec<MergedVariant>
}

impl FeatureReport {
    fn from_feature(feature: &Feature) -> Self {
        Self {
            name: feature.name().to_string(),
            hits: feature.num_variants(),
            weighted_hits: feature.weighted_variants(),
            average_weight: feature.average_weight().unwrap_or(0.0),
            unique_hits: feature.num_unique_variants(),
            num_samples: feature.num_unique_samples(),
            merged_variants: feature.unique_variants()
        }
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn weighted_hits(&self) -> f64 {
        self.weighted_hits
    }

    pub fn average_weight(&self) -> f64 {
        self.average_weight
    }

    pub fn unique_hits(&self) -> usize {
        self.unique_hits
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn merged_variants(&self) -> &[MergedVariant] {
        &self.merged_variants
    }
}

/// Aggregates every feature that collected at least one variant into its report content.
/// Features are summarized in parallel and the reports ordered by descending hit count, with
/// ties broken by name so repeated runs produce identical output.
/// # Arguments
/// * `catalog` - the fully binned feature catalog
pub fn aggregate_features(catalog: &FeatureCatalog) -> Vec<FeatureReport> {
    let with_variants: Vec<&Feature> = catalog.features().values()
        .filter(|f| f.num_variants() > 0)
        .collect();

    let style = get_progress_style();
    let mut reports: Vec<FeatureReport> = with_variants.into_par_iter()
        .map(FeatureReport::from_feature)
        .progress_with_style(style)
        .collect();

    reports.sort_by(|a, b| {
        b.hits.cmp(&a.hits)
            .then_with(|| a.name.cmp(&b.name))
    });
    reports
}

/// Convenience wrapper for iterating merged variants across all reports in report order,
/// used by the detail writers.
pub fn iter_merged<'a>(reports: &'a [FeatureReport]) -> impl Iterator<Item = (&'a FeatureReport, &'a MergedVariant)> {
    reports.iter()
        .flat_map(|report| {
            report.merged_variants().iter()
                .map(move |merged| (report, merged))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx_eq::assert_approx_eq;
    use std::io::Write;

    use crate::feature_index::build_feature_space;
    use crate::parsing::gff::GffReader;

    fn write_file(suffix: &str, lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile().unwrap();
        for line in lines.iter() {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn mock_feature_space() -> (FeatureCatalog, IntervalIndex) {
        let gff = write_file(".gtf", &[
            "chr1\thavana\tgene\t100\t200\t.\t+\t.\tgene_id \"GENE1\";",
            "chr1\thavana\tgene\t500\t600\t.\t-\t.\tgene_id \"GENE2\";"
        ]);
        let records: Vec<_> = GffReader::from_path(gff.path()).unwrap()
            .collect::<anyhow::Result<_>>().unwrap();
        build_feature_space(records, "gene_id").unwrap()
    }

    #[test]
    fn test_parse_vcf_with_detection() {
        // samtools header, DP4 reconciliation: depth 15, fraction 5/15
        let vcf = write_file(".vcf", &[
            "##fileformat=VCFv4.1",
            "##samtoolsVersion=0.1.19",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tMQ=40\tDP4\t5,5,3,2"
        ]);
        let variants = parse_variant_file(vcf.path(), &EngineConfig::default()).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].depth(), Some(15));
        assert_approx_eq!(variants[0].fraction().unwrap(), 5.0 / 15.0);
        assert_eq!(variants[0].sample(), "s1");
    }

    #[test]
    fn test_reject_rows_skipped() {
        let vcf = write_file(".vcf", &[
            "##fileformat=VCFv4.1",
            "##samtoolsVersion=0.1.19",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tREJECT\tMQ=40\tDP4\t5,5,3,2",
            "chr1\t180\t.\tG\tC\t50\tPASS\tMQ=40\tDP4\t5,5,3,2"
        ]);
        let variants = parse_variant_file(vcf.path(), &EngineConfig::default()).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].position().coordinate(), 180);
    }

    #[test]
    fn test_format_override_beats_detection() {
        // VarScan header, but the override forces INFO-level extraction
        let vcf = write_file(".vcf", &[
            "##source=VarScan2",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tVAF=0.3;DP=60\tDP\t40"
        ]);
        let config = EngineConfigBuilder::default()
            .format_override(Some(CallerFormat::InfoColumn))
            .build().unwrap();
        let variants = parse_variant_file(vcf.path(), &config).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].depth(), Some(60));
        assert_approx_eq!(variants[0].fraction().unwrap(), 0.3);
    }

    #[test]
    fn test_undetectable_format_is_fatal() {
        let vcf = write_file(".vcf", &[
            "##fileformat=VCFv4.2",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tDP=60\tDP\t40"
        ]);
        assert!(parse_variant_file(vcf.path(), &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_info_only_file_yields_one_observation() {
        let vcf = write_file(".vcf", &[
            "##fileformat=VCFv4.2",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO",
            "chr1\t150\t.\tA\tT\t50\tPASS\tVAF=0.4;DP=80"
        ]);
        let config = EngineConfigBuilder::default()
            .format_override(Some(CallerFormat::InfoColumn))
            .build().unwrap();
        let variants = parse_variant_file(vcf.path(), &config).unwrap();
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].sample(), "");
        assert_eq!(variants[0].depth(), Some(80));
        assert_approx_eq!(variants[0].fraction().unwrap(), 0.4);
    }

    #[test]
    fn test_end_to_end_binning_and_aggregation() {
        let (mut catalog, index) = mock_feature_space();

        // two sources report the same mutation inside GENE1, one reports a miss outside
        let vcf1 = write_file(".vcf", &[
            "##samtoolsVersion=0.1.19",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tMQ=40\tDP4\t5,5,3,2",
            "chr1\t300\t.\tG\tC\t50\tPASS\tMQ=40\tDP4\t5,5,3,2"
        ]);
        let vcf2 = write_file(".vcf", &[
            "##samtoolsVersion=0.1.19",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tMQ=40\tDP4\t10,0,5,5"
        ]);
        let filenames = vec![
            vcf1.path().to_path_buf(),
            vcf2.path().to_path_buf()
        ];

        let stats = process_variant_files(&filenames, &EngineConfig::default(), &mut catalog, &index).unwrap();
        assert_eq!(stats.files_parsed, 2);
        assert_eq!(stats.binned, 2);
        assert_eq!(stats.unbinned, 1);
        assert_eq!(stats.total_variants(), 3);

        let reports = aggregate_features(&catalog);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.name(), "GENE1");
        assert_eq!(report.hits(), 2);
        assert_eq!(report.unique_hits(), 1);
        assert_eq!(report.num_samples(), 2);
        assert_approx_eq!(report.weighted_hits(), 5.0 / 15.0 + 0.5);

        let merged = report.merged_variants();
        assert_eq!(merged.len(), 1);
        let source1 = crate::parsing::source_label(vcf1.path());
        let source2 = crate::parsing::source_label(vcf2.path());
        assert_eq!(merged[0].sources(), format!("{source1}, {source2}"));
        assert_eq!(merged[0].depths(), "15, 20");
        assert_eq!(merged[0].num_sources(), 2);
    }

    #[test]
    fn test_report_ordering() {
        let (mut catalog, index) = mock_feature_space();

        // GENE2 collects two observations, GENE1 only one
        let vcf = write_file(".vcf", &[
            "##samtoolsVersion=0.1.19",
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\ts1",
            "chr1\t150\t.\tA\tT\t50\tPASS\tMQ=40\tDP4\t5,5,3,2",
            "chr1\t520\t.\tG\tC\t50\tPASS\tMQ=40\tDP4\t5,5,3,2",
            "chr1\t550\t.\tG\tA\t50\tPASS\tMQ=40\tDP4\t5,5,3,2"
        ]);
        let filenames = vec![vcf.path().to_path_buf()];
        process_variant_files(&filenames, &EngineConfig::default(), &mut catalog, &index).unwrap();

        let reports = aggregate_features(&catalog);
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name(), "GENE2");
        assert_eq!(reports[0].hits(), 2);
        assert_eq!(reports[1].name(), "GENE1");
        assert_eq!(reports[1].hits(), 1);
    }
}
