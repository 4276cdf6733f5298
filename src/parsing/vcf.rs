
use anyhow::{bail, Context};
use std::io::BufRead;
use std::path::Path;

use crate::parsing::formats::{CallerFormat, FieldMap, SampleMap};
use crate::parsing::open_text_reader;

/// One data row of a VCF-like file with its field mappings pre-split.
/// All values stay raw strings; numeric reconciliation is the format parsers' job.
#[derive(Clone, Debug, PartialEq)]
pub struct VcfRecord {
    /// CHROM column
    pub contig: String,
    /// POS column, 1-based
    pub position: u64,
    /// ID column, "." when absent
    pub id: String,
    /// REF allele
    pub reference: String,
    /// ALT alleles, comma-split
    pub alternates: Vec<String>,
    /// FILTER column verbatim
    pub filter: String,
    /// INFO key-value mapping; flag keys map to an empty string
    pub info: FieldMap,
    /// Sample name to FORMAT field mapping
    pub samples: SampleMap
}

/// Header-derived context for one input file, detected before any data row is read.
#[derive(Clone, Debug)]
pub struct VcfHeader {
    /// The `##` meta lines, verbatim
    pub meta: Vec<String>,
    /// Sample column names from the `#CHROM` line, in file order
    pub sample_names: Vec<String>,
    /// The caller format detected from the meta lines, if any marker matched
    pub detected_format: Option<CallerFormat>,
    /// True when a SnpEff annotation marker is present in the meta lines
    pub snpeff_annotated: bool
}

/// Streaming reader over the data rows of a VCF-like file, plain or gzip-compressed.
/// The header is consumed eagerly at open time so format detection happens before iteration.
pub struct VcfReader {
    reader: Box<dyn BufRead>,
    header: VcfHeader,
    line_number: usize
}

impl VcfReader {
    /// Opens a variant file and consumes its header.
    /// # Arguments
    /// * `filename` - path to the .vcf(.gz) file
    /// # Errors
    /// * if the file cannot be opened
    /// * if no `#CHROM` column header line is found
    pub fn from_path(filename: &Path) -> anyhow::Result<Self> {
        let mut reader = open_text_reader(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;

        // consume everything through the #CHROM line
        let mut meta: Vec<String> = vec![];
        let mut line_number: usize = 0;
        let sample_names = loop {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                bail!("No #CHROM header line found in {filename:?}");
            }
            line_number += 1;

            let trimmed = line.trim_end_matches(['\n', '\r']);
            if let Some(stripped) = trimmed.strip_prefix("##") {
                meta.push(stripped.to_string());
            } else if trimmed.starts_with('#') {
                let columns: Vec<&str> = trimmed.split('\t').collect();
                // sample columns follow FORMAT (column 9) when present
                break columns.iter()
                    .skip(9)
                    .map(|c| c.to_string())
                    .collect::<Vec<String>>();
            } else {
                bail!("Unexpected data line before the column header in {filename:?}");
            }
        };

        let detected_format = detect_format(&meta);
        let snpeff_annotated = detect_snpeff(&meta);

        Ok(Self {
            reader,
            header: VcfHeader {
                meta,
                sample_names,
                detected_format,
                snpeff_annotated
            },
            line_number
        })
    }

    /// Parses one tab-delimited data row.
    fn parse_line(&self, line: &str) -> anyhow::Result<VcfRecord> {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 8 {
            bail!("line {} has {} columns, expected at least 8", self.line_number, columns.len());
        }

        let position: u64 = columns[1].parse()
            .with_context(|| format!("Error while parsing POS on line {}:", self.line_number))?;

        let alternates: Vec<String> = columns[4].split(',')
            .map(|a| a.to_string())
            .collect();

        let info = parse_info(columns[7]);

        // zip FORMAT keys against each sample column; short sample columns are tolerated
        let mut samples = SampleMap::default();
        if columns.len() > 9 {
            let format_keys: Vec<&str> = columns[8].split(':').collect();
            for (sample_name, &raw_values) in self.header.sample_names.iter().zip(columns[9..].iter()) {
                let values: FieldMap = format_keys.iter()
                    .zip(raw_values.split(':'))
                    .map(|(&k, v)| (k.to_string(), v.to_string()))
                    .collect();
                samples.insert(sample_name.clone(), values);
            }
        }

        Ok(VcfRecord {
            contig: columns[0].to_string(),
            position,
            id: columns[2].to_string(),
            reference: columns[3].to_string(),
            alternates,
            filter: columns[6].to_string(),
            info,
            samples
        })
    }

    // getters
    pub fn header(&self) -> &VcfHeader {
        &self.header
    }
}

impl Iterator for VcfReader {
    type Item = anyhow::Result<VcfRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let mut line = String::new();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => {},
                Err(e) => return Some(Err(e.into()))
            };
            self.line_number += 1;

            let trimmed = line.trim_end_matches(['\n', '\r']);
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Some(self.parse_line(trimmed));
        }
    }
}

/// Splits an INFO column into a key-value mapping; flag entries map to an empty string.
fn parse_info(column: &str) -> FieldMap {
    let mut info = FieldMap::default();
    for entry in column.split(';') {
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) => info.insert(key.to_string(), value.to_string()),
            None => info.insert(entry.to_string(), String::new())
        };
    }
    info
}

/// Scans the `##` meta lines for the caller markers each tool writes into its header.
/// The first matching line wins; within a line the markers are checked in fixed precedence.
/// # Arguments
/// * `meta` - the stripped `##` meta lines, in file order
pub fn detect_format(meta: &[String]) -> Option<CallerFormat> {
    // markers and their precedence within one line
    const MARKERS: [(&str, CallerFormat); 8] = [
        ("Torrent Unified Variant Caller", CallerFormat::IonTorrent),
        ("MiSeq", CallerFormat::MiSeq),
        ("SomaticIndelDetector", CallerFormat::SomaticIndelDetector),
        ("MuTect", CallerFormat::MuTectVcf),
        ("HaplotypeCaller", CallerFormat::HaplotypeCaller),
        ("freeBayes", CallerFormat::FreeBayes),
        ("VarScan", CallerFormat::VarScan),
        ("samtools", CallerFormat::Samtools)
    ];

    for line in meta.iter() {
        for (marker, format) in MARKERS.iter() {
            if line.contains(marker) {
                return Some(*format);
            }
        }
    }
    None
}

/// True when any meta line carries a SnpEff marker, meaning EFF/ANN annotations are expected.
/// # Arguments
/// * `meta` - the stripped `##` meta lines, in file order
pub fn detect_snpeff(meta: &[String]) -> bool {
    meta.iter().any(|line| line.contains("SnpEff"))
}
