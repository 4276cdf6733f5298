
use itertools::Itertools;
use std::collections::BTreeSet;

/// A position on a contig. Coordinates are 1-based, matching VCF and GFF conventions.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct GenomicPosition {
    /// The chromosome / assembly sequence name
    contig: String,
    /// The 1-based coordinate on the contig
    coordinate: u64
}

impl GenomicPosition {
    /// Constructor
    pub fn new(contig: String, coordinate: u64) -> Self {
        Self {
            contig, coordinate
        }
    }

    /// Returns the key used to order positions in reports.
    /// This is the plain contig+coordinate string concatenation inherited from historical runs,
    /// which does NOT sort contigs numerically (e.g. "chr10" sorts before "chr2").
    /// Kept for exact output parity; switching to natural ordering is a one-line change here.
    pub fn report_sort_key(&self) -> String {
        format!("{}{}", self.contig, self.coordinate)
    }

    // getters
    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn coordinate(&self) -> u64 {
        self.coordinate
    }
}

impl std::fmt::Display for GenomicPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.contig, self.coordinate)
    }
}

/// A single observed mutation from one source/sample, normalized into the canonical shape.
/// Immutable once constructed; numeric fields are independently optional because many caller
/// formats cannot supply or derive them.
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    /// Originating file identifier, typically the input file name
    source: String,
    /// Sample identifier within a multi-sample file, or empty
    sample: String,
    /// Where the mutation was observed
    position: GenomicPosition,
    /// The reference allele
    ref_allele: String,
    /// The sorted, `/`-joined set of alternate alleles
    alt_allele: String,
    /// Total read depth (DP), if the source format could supply or derive it
    depth: Option<u64>,
    /// Alternate allele fraction (VAF) in [0, 1], if determinable
    fraction: Option<f64>,
    /// `;`-joined deduplicated effect labels (e.g. "E123K")
    effect: String,
    /// `;`-joined deduplicated functional-consequence labels (e.g. "SYNONYMOUS_CODING")
    functional_consequence: String
}

impl Variant {
    /// Constructor
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: String, sample: String, position: GenomicPosition,
        ref_allele: String, alt_allele: String,
        depth: Option<u64>, fraction: Option<f64>,
        effect: String, functional_consequence: String
    ) -> Self {
        Self {
            source, sample, position, ref_allele, alt_allele,
            depth, fraction, effect, functional_consequence
        }
    }

    /// The exact identity of the underlying mutation, used to collapse duplicates at aggregation.
    pub fn mutation_key(&self) -> (String, u64, String, String) {
        (
            self.position.contig().to_string(),
            self.position.coordinate(),
            self.ref_allele.clone(),
            self.alt_allele.clone()
        )
    }

    // getters
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn position(&self) -> &GenomicPosition {
        &self.position
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    pub fn depth(&self) -> Option<u64> {
        self.depth
    }

    pub fn fraction(&self) -> Option<f64> {
        self.fraction
    }

    pub fn effect(&self) -> &str {
        &self.effect
    }

    pub fn functional_consequence(&self) -> &str {
        &self.functional_consequence
    }
}

/// One consolidated entry per unique mutation per feature, produced fresh at aggregation time.
/// The per-record fields are carried as `, `-joined strings in contributing-record order,
/// matching the historical report shape.
#[derive(Clone, Debug, PartialEq)]
pub struct MergedVariant {
    /// Where the mutation was observed
    position: GenomicPosition,
    /// The reference allele
    ref_allele: String,
    /// The sorted, `/`-joined set of alternate alleles
    alt_allele: String,
    /// `, `-joined source identifiers of every contributing record
    sources: String,
    /// `, `-joined stringified fractions, same order as `sources`
    fractions: String,
    /// `, `-joined stringified depths, same order as `sources`
    depths: String,
    /// `, `-joined effect strings, same order as `sources`
    effects: String,
    /// `, `-joined functional-consequence strings, same order as `sources`
    functional_consequences: String,
    /// Number of contributing records, surfaced as the support count in reports
    num_sources: usize
}

impl MergedVariant {
    /// Merges a group of records that share one mutation key into a single consolidated entry.
    /// # Arguments
    /// * `group` - every variant with the same `(contig, coordinate, ref, alt)` key, in record order
    /// # Panics
    /// * if the group is empty; grouping never produces empty groups
    pub fn from_group(group: &[&Variant]) -> Self {
        assert!(!group.is_empty(), "cannot merge an empty variant group");
        let first = group[0];
        Self {
            position: first.position().clone(),
            ref_allele: first.ref_allele().to_string(),
            alt_allele: first.alt_allele().to_string(),
            sources: group.iter().map(|v| v.source()).join(", "),
            fractions: group.iter().map(|v| format_opt_fraction(v.fraction())).join(", "),
            depths: group.iter().map(|v| format_opt_depth(v.depth())).join(", "),
            effects: group.iter().map(|v| v.effect()).join(", "),
            functional_consequences: group.iter().map(|v| v.functional_consequence()).join(", "),
            num_sources: group.len()
        }
    }

    // getters
    pub fn position(&self) -> &GenomicPosition {
        &self.position
    }

    pub fn ref_allele(&self) -> &str {
        &self.ref_allele
    }

    pub fn alt_allele(&self) -> &str {
        &self.alt_allele
    }

    pub fn sources(&self) -> &str {
        &self.sources
    }

    pub fn fractions(&self) -> &str {
        &self.fractions
    }

    pub fn depths(&self) -> &str {
        &self.depths
    }

    pub fn effects(&self) -> &str {
        &self.effects
    }

    pub fn functional_consequences(&self) -> &str {
        &self.functional_consequences
    }

    pub fn num_sources(&self) -> usize {
        self.num_sources
    }
}

/// Renders an optional allele fraction for reports, using the VCF missing-value convention.
pub fn format_opt_fraction(fraction: Option<f64>) -> String {
    match fraction {
        Some(f) => f.to_string(),
        None => ".".to_string()
    }
}

/// Renders an optional read depth for reports, using the VCF missing-value convention.
pub fn format_opt_depth(depth: Option<u64>) -> String {
    match depth {
        Some(d) => d.to_string(),
        None => ".".to_string()
    }
}

/// Collapses the alternate alleles of a record into the canonical sorted, `/`-joined set form.
/// # Arguments
/// * `alternates` - the raw ALT alleles from the record, possibly with duplicates
pub fn join_alternate_alleles(alternates: &[String]) -> String {
    let unique: BTreeSet<&str> = alternates.iter()
        .map(|a| a.as_str())
        .collect();
    unique.into_iter().join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_variant(source: &str, fraction: Option<f64>, depth: Option<u64>) -> Variant {
        Variant::new(
            source.to_string(), String::new(),
            GenomicPosition::new("chr1".to_string(), 150),
            "A".to_string(), "T".to_string(),
            depth, fraction,
            "E123K".to_string(), "NON_SYNONYMOUS_CODING".to_string()
        )
    }

    #[test]
    fn test_report_sort_key_is_not_numeric() {
        // the inherited ordering quirk: "chr10..." concatenates before "chr2..."
        let p1 = GenomicPosition::new("chr10".to_string(), 5);
        let p2 = GenomicPosition::new("chr2".to_string(), 5);
        assert!(p1.report_sort_key() < p2.report_sort_key());
    }

    #[test]
    fn test_join_alternate_alleles() {
        let alts = vec!["T".to_string(), "C".to_string(), "T".to_string()];
        assert_eq!(join_alternate_alleles(&alts), "C/T");
        assert_eq!(join_alternate_alleles(&["G".to_string()]), "G");
    }

    #[test]
    fn test_merge_group() {
        let v1 = mock_variant("sample1.vcf", Some(0.25), Some(100));
        let v2 = mock_variant("sample2.vcf", None, None);
        let merged = MergedVariant::from_group(&[&v1, &v2]);
        assert_eq!(merged.sources(), "sample1.vcf, sample2.vcf");
        assert_eq!(merged.fractions(), "0.25, .");
        assert_eq!(merged.depths(), "100, .");
        assert_eq!(merged.effects(), "E123K, E123K");
        assert_eq!(merged.num_sources(), 2);
        assert_eq!(merged.ref_allele(), "A");
        assert_eq!(merged.alt_allele(), "T");
    }
}
