/*!
# Parsing module
Contains the logic for parsing input files into meaningful structs / data.
*/
/// Derives effect / functional-consequence labels from annotation payloads
pub mod annotations;
/// The closed caller-format enumeration and its per-format reconciliation rules
pub mod formats;
/// Reader for GFF/GTF-style feature annotation files
pub mod gff;
/// Loader for the optional known-variant (dbSNP-style) exclusion lookup
pub mod known_variants;
/// Parser for MuTect tabular `.out` call files
pub mod mutect;
/// Reader for VCF-shaped variant files, including caller-format detection
pub mod vcf;

use anyhow::Context;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Opens a text file for buffered line reading, transparently handling gzip compression
/// by extension.
/// # Arguments
/// * `filename` - the file path to open
/// # Errors
/// * if the file does not open properly
pub fn open_text_reader(filename: &Path) -> anyhow::Result<Box<dyn BufRead>> {
    let handle = File::open(filename)
        .with_context(|| format!("Error while opening {filename:?}:"))?;

    let reader: Box<dyn BufRead> = if filename.extension().unwrap_or_default() == "gz" {
        Box::new(BufReader::new(flate2::read::MultiGzDecoder::new(handle)))
    } else {
        Box::new(BufReader::new(handle))
    };
    Ok(reader)
}

/// The source identifier used for a variant file: its file name without the directory path.
/// # Arguments
/// * `filename` - the input file path
pub fn source_label(filename: &Path) -> String {
    filename.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string_lossy().to_string())
}
