
use anyhow::anyhow;
use coitrees::{COITree, Interval, IntervalTree};
use indexmap::IndexMap;
use log::{debug, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::data_types::features::Feature;
use crate::data_types::variants::Variant;
use crate::parsing::gff::{is_excluded_contig, GffRecord};

/// Point-query structure over the feature intervals, read-only after construction.
/// Backed by one COITree per contig; every fragment interval of a feature is tagged with the
/// feature's (possibly renamed) name, so overlap is governed by the annotation ranges themselves
/// rather than the catalog's stored coordinates.
pub struct IntervalIndex {
    /// Lookup from a contig to its interval tree; metadata is an index into `feature_names`
    trees: FxHashMap<String, COITree<u32, u32>>,
    /// The tagged feature names, indexed by the tree metadata values
    feature_names: Vec<String>
}

impl std::fmt::Debug for IntervalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // COITree does not have Debug, so report per-contig interval counts instead
        let tree_counts: FxHashMap<&str, usize> = self.trees.iter()
            .map(|(c, t)| (c.as_str(), t.len()))
            .collect();
        f.debug_struct("IntervalIndex")
            .field("num_features", &self.feature_names.len())
            .field("tree_len", &tree_counts)
            .finish()
    }
}

impl IntervalIndex {
    /// Returns the set of feature names whose interval covers the given point.
    /// An empty result means the position is unbinned, which is not an error.
    /// # Arguments
    /// * `contig` - the contig name
    /// * `coordinate` - the 1-based position to test
    pub fn query(&self, contig: &str, coordinate: u64) -> Vec<&str> {
        let tree = match self.trees.get(contig) {
            Some(t) => t,
            None => return vec![]
        };

        // nested or overlapping features can tag one point several times with one name
        let mut name_ids: Vec<u32> = vec![];
        let point = coordinate as i32;
        tree.query(point, point, |interval| {
            name_ids.push(interval.metadata);
        });
        name_ids.sort_unstable();
        name_ids.dedup();

        name_ids.into_iter()
            .map(|id| self.feature_names[id as usize].as_str())
            .collect()
    }

    /// Total number of indexed features.
    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }
}

/// The features discovered in the annotation file, keyed by their unique (post-rename) names.
/// Owns each feature's variant collection during binning.
#[derive(Debug, Default)]
pub struct FeatureCatalog {
    /// Lookup from a feature name to the feature, in annotation order
    features: IndexMap<String, Feature>,
    /// Raw names that were seen on more than one contig
    duplicate_names: FxHashSet<String>
}

impl FeatureCatalog {
    /// Appends a variant to the named feature's collection.
    /// # Arguments
    /// * `name` - a feature name previously returned by the index
    /// * `variant` - the observation to attach
    /// # Errors
    /// * if the name is not in the catalog; the index and catalog are built together, so this
    ///   indicates internal corruption
    pub fn attach_variant(&mut self, name: &str, variant: Variant) -> anyhow::Result<()> {
        let feature = self.features.get_mut(name)
            .ok_or(anyhow!("Feature {name:?} is not in the catalog"))?;
        feature.push_variant(variant);
        Ok(())
    }

    /// Number of raw feature names that appeared on more than one contig.
    pub fn num_duplicate_names(&self) -> usize {
        self.duplicate_names.len()
    }

    // getters
    pub fn features(&self) -> &IndexMap<String, Feature> {
        &self.features
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.get(name)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Builds the feature catalog and the interval index in one pass over the annotation entries.
/// The entries are expected to arrive ordered by contig and position (coordinate-sorted
/// annotation file); the builder does not re-sort them.
///
/// Name collisions follow the inherited policy: a repeat on a *different* contig is renamed
/// `name.{contig}` and counted for the run-level warning; a repeat on the *same* contig is a
/// continuation of the same feature (e.g. successive exons) whose stored coordinates stay at the
/// first-seen range, while its fragment interval still enters the index.
/// # Arguments
/// * `records` - annotation entries, in file order
/// * `feature_key` - the identifying attribute to bin by, e.g. "gene_id"
/// # Errors
/// * if an entry lacks the identifying attribute (structural, aborts the run)
pub fn build_feature_space<I>(records: I, feature_key: &str) -> anyhow::Result<(FeatureCatalog, IntervalIndex)>
where
    I: IntoIterator<Item = GffRecord>
{
    let mut catalog = FeatureCatalog::default();
    let mut name_ids: FxHashMap<String, u32> = Default::default();
    let mut feature_names: Vec<String> = vec![];
    let mut contig_intervals: IndexMap<String, Vec<Interval<u32>>> = Default::default();
    let mut excluded: usize = 0;

    for record in records {
        // alternate haplotype / random / unplaced contigs would corrupt the per-contig trees
        if is_excluded_contig(&record.contig) {
            excluded += 1;
            continue;
        }

        let raw_name = record.attribute(feature_key)
            .ok_or(anyhow!(
                "Annotation entry at {}:{}-{} has no {feature_key:?} attribute",
                record.contig, record.start, record.end
            ))?
            .to_string();

        // resolve collisions before touching the catalog
        let mut name = raw_name.clone();
        if let Some(existing) = catalog.features.get(&name) {
            if existing.contig() != record.contig {
                catalog.duplicate_names.insert(raw_name.clone());
                name = format!("{}.{}", raw_name, record.contig);
            }
        }

        // same-contig repeats keep the first-seen stored coordinates (no-union policy; a "union"
        // mode that merges fragment ranges is referenced upstream but remains unimplemented)
        if !catalog.features.contains_key(&name) {
            catalog.features.insert(name.clone(), Feature::new(
                name.clone(),
                record.feature_type.clone(),
                record.contig.clone(),
                record.start,
                record.end,
                record.strand
            ));
        }

        // every fragment interval is indexed under the resolved name
        let name_id = *name_ids.entry(name.clone()).or_insert_with(|| {
            feature_names.push(name.clone());
            (feature_names.len() - 1) as u32
        });
        contig_intervals.entry(record.contig.clone())
            .or_default()
            .push(Interval::new(record.start as i32, record.end as i32, name_id));
    }

    if excluded > 0 {
        debug!("Skipped {excluded} annotation entries on excluded contigs.");
    }
    if !catalog.duplicate_names.is_empty() {
        warn!("{} feature names found on more than one contig", catalog.duplicate_names.len());
    }

    // freeze the per-contig trees
    let trees: FxHashMap<String, COITree<u32, u32>> = contig_intervals.into_iter()
        .map(|(contig, intervals)| (contig, COITree::new(&intervals)))
        .collect();

    let index = IntervalIndex {
        trees,
        feature_names
    };
    Ok((catalog, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::gff::parse_attributes;

    fn mock_record(contig: &str, start: u64, end: u64, name: &str) -> GffRecord {
        GffRecord {
            contig: contig.to_string(),
            feature_type: "gene".to_string(),
            start,
            end,
            strand: Some('+'),
            attributes: parse_attributes(&format!("gene_id \"{name}\";"))
        }
    }

    #[test]
    fn test_point_query() {
        let records = vec![
            mock_record("chr1", 100, 200, "GENE1"),
            mock_record("chr1", 500, 600, "GENE2")
        ];
        let (catalog, index) = build_feature_space(records, "gene_id").unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(index.query("chr1", 150), vec!["GENE1"]);
        assert_eq!(index.query("chr1", 100), vec!["GENE1"]);
        assert_eq!(index.query("chr1", 200), vec!["GENE1"]);
        assert_eq!(index.query("chr1", 550), vec!["GENE2"]);
        assert!(index.query("chr1", 300).is_empty());
        assert!(index.query("chr2", 150).is_empty());
    }

    #[test]
    fn test_multi_overlap() {
        // nested gene models: one coordinate covered by two distinct features
        let records = vec![
            mock_record("chr1", 100, 300, "OUTER"),
            mock_record("chr1", 150, 250, "INNER")
        ];
        let (_catalog, index) = build_feature_space(records, "gene_id").unwrap();

        let mut hits = index.query("chr1", 200);
        hits.sort_unstable();
        assert_eq!(hits, vec!["INNER", "OUTER"]);
        assert_eq!(index.query("chr1", 120), vec!["OUTER"]);
    }

    #[test]
    fn test_cross_contig_rename() {
        let records = vec![
            mock_record("chr15", 100, 200, "DDX11L1"),
            mock_record("chr16", 300, 400, "DDX11L1")
        ];
        let (catalog, index) = build_feature_space(records, "gene_id").unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.get("DDX11L1").is_some());
        assert!(catalog.get("DDX11L1.chr16").is_some());
        assert_eq!(catalog.num_duplicate_names(), 1);
        assert_eq!(index.query("chr15", 150), vec!["DDX11L1"]);
        assert_eq!(index.query("chr16", 350), vec!["DDX11L1.chr16"]);
    }

    #[test]
    fn test_same_contig_continuation() {
        // successive fragments of one feature: first-seen stored coordinates, both indexed
        let records = vec![
            mock_record("chr1", 100, 200, "GENE1"),
            mock_record("chr1", 500, 600, "GENE1")
        ];
        let (catalog, index) = build_feature_space(records, "gene_id").unwrap();

        assert_eq!(catalog.len(), 1);
        let feature = catalog.get("GENE1").unwrap();
        assert_eq!((feature.start(), feature.end()), (100, 200));
        assert_eq!(catalog.num_duplicate_names(), 0);

        // the index still covers both fragments, and a point in both maps to one name
        assert_eq!(index.query("chr1", 150), vec!["GENE1"]);
        assert_eq!(index.query("chr1", 550), vec!["GENE1"]);
    }

    #[test]
    fn test_excluded_contigs_skipped() {
        let records = vec![
            mock_record("chr17_ctg5_hap1", 100, 200, "GENE1"),
            mock_record("chrUn_gl000220", 100, 200, "GENE2"),
            mock_record("chr17", 100, 200, "GENE3")
        ];
        let (catalog, index) = build_feature_space(records, "gene_id").unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(index.num_features(), 1);
        assert_eq!(index.query("chr17", 150), vec!["GENE3"]);
    }

    #[test]
    fn test_missing_attribute_is_fatal() {
        let mut record = mock_record("chr1", 100, 200, "GENE1");
        record.attributes.clear();
        assert!(build_feature_space(vec![record], "gene_id").is_err());
    }
}
