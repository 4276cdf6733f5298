
use anyhow::{anyhow, Context};
use rustc_hash::FxHashSet;
use std::path::Path;

/// Read-only position lookup of already-known polymorphisms (dbSNP-style).
/// Used only as an exclusion predicate when writing detail reports; the binning core never
/// consults it.
#[derive(Clone, Debug, Default)]
pub struct KnownVariants {
    /// Every (contig, coordinate) pair with a known entry
    positions: FxHashSet<(String, u64)>
}

impl KnownVariants {
    /// Loads a tab-delimited lookup: contig, 1-based position, and an optional identifier column.
    /// # Arguments
    /// * `filename` - path to the lookup TSV
    /// # Errors
    /// * if the file cannot be opened or a position fails to parse
    pub fn from_tsv(filename: &Path) -> anyhow::Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;

        let mut positions: FxHashSet<(String, u64)> = Default::default();
        for result in csv_reader.records() {
            let row = result.with_context(|| format!("Error while reading {filename:?}:"))?;
            let contig = row.get(0)
                .ok_or(anyhow!("Missing contig on row: {row:?}"))?;
            let coordinate: u64 = row.get(1)
                .ok_or(anyhow!("Missing position on row: {row:?}"))?
                .trim().parse()
                .with_context(|| format!("Error while parsing position on row: {row:?}"))?;
            positions.insert((contig.to_string(), coordinate));
        }

        Ok(Self {
            positions
        })
    }

    /// The exclusion predicate: true when the position carries a known entry.
    /// # Arguments
    /// * `contig` - the contig name
    /// * `coordinate` - the 1-based position
    pub fn contains(&self, contig: &str, coordinate: u64) -> bool {
        self.positions.contains(&(contig.to_string(), coordinate))
    }

    /// Number of loaded entries.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_lookup() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t150\trs12345").unwrap();
        writeln!(file, "chr2\t500\trs67890").unwrap();
        file.flush().unwrap();

        let known = KnownVariants::from_tsv(file.path()).unwrap();
        assert_eq!(known.len(), 2);
        assert!(known.contains("chr1", 150));
        assert!(known.contains("chr2", 500));
        assert!(!known.contains("chr1", 151));
        assert!(!known.contains("chr3", 150));
    }

    #[test]
    fn test_bad_position_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chr1\toops\trs12345").unwrap();
        file.flush().unwrap();
        assert!(KnownVariants::from_tsv(file.path()).is_err());
    }
}
