
use anyhow::{bail, Context};
use std::io::BufRead;
use std::path::Path;

use crate::parsing::formats::FieldMap;
use crate::parsing::open_text_reader;

/// One entry from a GFF/GTF-style annotation file. Coordinates are 1-based inclusive.
#[derive(Clone, Debug, PartialEq)]
pub struct GffRecord {
    /// The contig the feature lives on
    pub contig: String,
    /// Free-form feature category (column 3, e.g. "exon")
    pub feature_type: String,
    /// 1-based inclusive start
    pub start: u64,
    /// 1-based inclusive end
    pub end: u64,
    /// Strand marker, if the column carries one
    pub strand: Option<char>,
    /// Parsed column 9 attributes; both GTF (`key "value";`) and GFF3 (`key=value`) styles
    pub attributes: FieldMap
}

impl GffRecord {
    /// Looks up an identifying attribute, e.g. `gene_id`.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|v| v.as_str())
    }
}

/// Streaming reader over the annotation entries of a GFF/GTF file, plain or gzip-compressed.
/// Comment and empty lines are skipped; structural problems in a data line are fatal.
pub struct GffReader {
    reader: Box<dyn BufRead>,
    line_number: usize
}

impl GffReader {
    /// Opens an annotation file for reading.
    /// # Arguments
    /// * `filename` - path to the .gff/.gtf(.gz) file
    /// # Errors
    /// * if the file cannot be opened
    pub fn from_path(filename: &Path) -> anyhow::Result<Self> {
        let reader = open_text_reader(filename)
            .with_context(|| format!("Error while opening {filename:?}:"))?;
        Ok(Self {
            reader,
            line_number: 0
        })
    }

    /// Parses one tab-delimited annotation line.
    fn parse_line(&self, line: &str) -> anyhow::Result<GffRecord> {
        let columns: Vec<&str> = line.split('\t').collect();
        if columns.len() < 9 {
            bail!("line {} has {} columns, expected 9", self.line_number, columns.len());
        }

        let start: u64 = columns[3].parse()
            .with_context(|| format!("Error while parsing start coordinate on line {}:", self.line_number))?;
        let end: u64 = columns[4].parse()
            .with_context(|| format!("Error while parsing end coordinate on line {}:", self.line_number))?;

        let strand = match columns[6] {
            "+" => Some('+'),
            "-" => Some('-'),
            _ => None
        };

        Ok(GffRecord {
            contig: columns[0].to_string(),
            feature_type: columns[2].to_string(),
            start,
            end,
            strand,
            attributes: parse_attributes(columns[8])
        })
    }
}

impl Iterator for GffReader {
    type Item = anyhow::Result<GffRecord>;

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

/// Parses a column-9 attribute payload into a key-value map.
/// Handles both the GTF convention (`gene_id "SF3B1"; gene_version "12";`) and the
/// GFF3 convention (`ID=gene:ENSG00000115524;Name=SF3B1`).
/// # Arguments
/// * `payload` - the raw attribute column text
pub fn parse_attributes(payload: &str) -> FieldMap {
    let mut attributes = FieldMap::default();
    for entry in payload.split(';') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        if let Some((key, value)) = entry.split_once('=') {
            // GFF3 style
            attributes.insert(key.trim().to_string(), value.trim().to_string());
        } else if let Some((key, value)) = entry.split_once(' ') {
            // GTF style, values usually double-quoted
            attributes.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    }
    attributes
}

/// True for the non-primary contigs that must be excluded from the interval index:
/// alternate haplotypes, random fragments, and unplaced scaffolds. Duplicated symbols on these
/// contigs otherwise break the start<=end invariant of the per-contig interval structure.
/// # Arguments
/// * `contig` - the contig name from the annotation entry
pub fn is_excluded_contig(contig: &str) -> bool {
    contig.contains("_hap")
        || contig.contains("_random")
        || contig.starts_with("chrUn_")
}
