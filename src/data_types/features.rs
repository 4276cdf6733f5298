
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::data_types::variants::{MergedVariant, Variant};

/// A named genomic region (gene, transcript, band, ...) used as a binning bucket.
/// The variant collection is owned exclusively by the feature and appended to only during binning.
#[derive(Clone, Debug)]
pub struct Feature {
    /// Unique key within the index; cross-contig duplicates are suffixed `.{contig}`
    name: String,
    /// Free-form feature category from the annotation file (e.g. "exon", "gene")
    feature_type: String,
    /// The contig the feature lives on
    contig: String,
    /// 1-based inclusive start of the primary annotation range
    start: u64,
    /// 1-based inclusive end of the primary annotation range
    end: u64,
    /// Strand marker from the annotation file, if any
    strand: Option<char>,
    /// Every variant binned to this feature during the run
    variants: Vec<Variant>
}

impl Feature {
    /// Constructor
    pub fn new(name: String, feature_type: String, contig: String, start: u64, end: u64, strand: Option<char>) -> Self {
        Self {
            name, feature_type, contig, start, end, strand,
            variants: vec![]
        }
    }

    /// Attaches one variant observation to this feature. Binning is append-only within a run.
    pub fn push_variant(&mut self, variant: Variant) {
        self.variants.push(variant);
    }

    /// Total number of variant observations binned to this feature.
    pub fn num_variants(&self) -> usize {
        self.variants.len()
    }

    /// Frequency-weighted hit count: the sum of allele fractions across all (not deduplicated)
    /// variants. Records without a determinable fraction contribute nothing.
    pub fn weighted_variants(&self) -> f64 {
        self.variants.iter()
            .filter_map(|v| v.fraction())
            .sum()
    }

    /// Average weight per observation, or None when the feature has no variants.
    pub fn average_weight(&self) -> Option<f64> {
        if self.variants.is_empty() {
            None
        } else {
            Some(self.weighted_variants() / self.variants.len() as f64)
        }
    }

    /// Number of distinct sources (input files / samples) contributing variants to this feature.
    pub fn num_unique_samples(&self) -> usize {
        let sources: FxHashSet<&str> = self.variants.iter()
            .map(|v| v.source())
            .collect();
        sources.len()
    }

    /// Collapses the variant collection into one consolidated entry per unique mutation.
    /// Grouping is a single pass over the collection; groups are then ordered by the inherited
    /// contig+coordinate concatenation sort. Reading is side-effect free, so repeated calls on an
    /// unchanged collection yield identical output.
    pub fn unique_variants(&self) -> Vec<MergedVariant> {
        // one grouping pass, keyed on the exact mutation identity
        let mut groups: IndexMap<(String, u64, String, String), Vec<&Variant>> = Default::default();
        for variant in self.variants.iter() {
            groups.entry(variant.mutation_key()).or_default().push(variant);
        }

        // order the groups for reporting
        let mut ordered: Vec<Vec<&Variant>> = groups.into_values().collect();
        ordered.sort_by_cached_key(|group| group[0].position().report_sort_key());

        ordered.iter()
            .map(|group| MergedVariant::from_group(group))
            .collect()
    }

    /// Number of unique mutations binned to this feature.
    pub fn num_unique_variants(&self) -> usize {
        let keys: FxHashSet<(String, u64, String, String)> = self.variants.iter()
            .map(|v| v.mutation_key())
            .collect();
        keys.len()
    }

    // getters
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature_type(&self) -> &str {
        &self.feature_type
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn strand(&self) -> Option<char> {
        self.strand
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }
}
