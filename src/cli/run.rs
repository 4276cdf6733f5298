
use anyhow::bail;
use clap::Parser;
use itertools::Itertools;
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use strum::IntoEnumIterator;

use crate::cli::core::{check_optional_filename, check_required_filename, AFTER_HELP, FULL_VERSION};
use crate::parsing::formats::CallerFormat;

/// Varbin, a tool for binning and aggregating variant calls across callers.
#[derive(Clone, Default, Parser, Serialize)]
#[clap(author,
    version = &**FULL_VERSION,
    about,
    after_help = &**AFTER_HELP)]
pub struct RunSettings {
    // filled during check_run_settings so it lands in the settings snapshot
    #[clap(skip)]
    varbin_version: String,

    /// Feature annotation file (GFF/GTF, optionally gzipped)
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "gff")]
    #[clap(value_name = "GFF")]
    #[clap(help_heading = Some("Input/Output"))]
    pub gff_filename: PathBuf,

    /// Output directory for all reports; must not already exist
    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-dir")]
    #[clap(value_name = "DIR")]
    #[clap(help_heading = Some("Input/Output"))]
    pub output_folder: PathBuf,

    /// Optional known-variant lookup (TSV: contig, position, id); matching detail rows are excluded
    #[clap(short = 'k')]
    #[clap(long = "known-variants")]
    #[clap(value_name = "TSV")]
    #[clap(help_heading = Some("Input/Output"))]
    pub known_variants: Option<PathBuf>,

    /// Variant call files to bin (VCF, optionally gzipped, or MuTect .out)
    #[clap(required = true)]
    #[clap(value_name = "VARIANTS")]
    #[clap(help_heading = Some("Input/Output"))]
    pub variant_filenames: Vec<PathBuf>,

    /// The identifying annotation attribute to bin by
    #[clap(short = 'f')]
    #[clap(long = "feature-key")]
    #[clap(value_name = "KEY")]
    #[clap(help_heading = Some("Binning parameters"))]
    #[clap(default_value = "gene_id")]
    pub feature_key: String,

    /// Force a caller format for every input instead of header auto-detection
    #[clap(long = "format")]
    #[clap(value_name = "FORMAT")]
    #[clap(help_heading = Some("Binning parameters"))]
    pub format: Option<String>,

    /// Number of threads to use while parsing and aggregating
    #[clap(long = "threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    pub threads: usize,

    /// Enable verbose output.
    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = clap::ArgAction::Count)]
    pub verbosity: u8
}

impl RunSettings {
    /// The parsed format override, validated during `check_run_settings`.
    pub fn format_override(&self) -> Option<CallerFormat> {
        self.format.as_deref()
            .and_then(|f| CallerFormat::from_str(f).ok())
    }
}

pub fn get_settings() -> RunSettings {
    RunSettings::parse()
}

/// Validates the settings, fills the derived fields, and logs every input.
/// # Arguments
/// * `settings` - the raw parsed settings
/// # Errors
/// * if a required input is missing, the format name is unknown, or the output folder exists
pub fn check_run_settings(mut settings: RunSettings) -> anyhow::Result<RunSettings> {
    // hard code the version in
    settings.varbin_version = FULL_VERSION.clone();
    info!("Varbin version: {:?}", &settings.varbin_version);
    info!("Inputs:");

    // check for all the required input files
    check_required_filename(&settings.gff_filename, "Annotation GFF")?;
    check_optional_filename(settings.known_variants.as_deref(), "Known variants")?;
    for filename in settings.variant_filenames.iter() {
        check_required_filename(filename, "Variant file")?;
    }

    // dump stuff to the logger
    info!("\tAnnotation GFF: {:?}", &settings.gff_filename);
    if let Some(filename) = settings.known_variants.as_deref() {
        info!("\tKnown variants: {filename:?}");
    } else {
        info!("\tKnown variants: None");
    }
    for filename in settings.variant_filenames.iter() {
        info!("\tVariant file: {filename:?}");
    }

    info!("Binning parameters:");
    info!("\tFeature key: {:?}", &settings.feature_key);
    if let Some(format_name) = settings.format.as_deref() {
        if CallerFormat::from_str(format_name).is_err() {
            bail!(
                "Unknown caller format {:?}; supported formats: {}",
                format_name,
                CallerFormat::iter().map(|f| f.to_string()).join(", ")
            );
        }
        info!("\tFormat override: {format_name:?}");
    } else {
        info!("\tFormat override: None (header auto-detection)");
    }

    // outputs; refusing to overwrite protects completed runs
    if settings.output_folder.exists() {
        bail!("Output directory already exists: \"{}\"", settings.output_folder.display());
    }
    info!("Outputs:");
    info!("\tOutput folder: {:?}", &settings.output_folder);

    if settings.threads == 0 {
        settings.threads = 1;
    }
    info!("Processing threads: {}", settings.threads);

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock_settings() -> (RunSettings, tempfile::NamedTempFile, tempfile::NamedTempFile, tempfile::TempDir) {
        let gff = tempfile::NamedTempFile::new().unwrap();
        let vcf = tempfile::NamedTempFile::new().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let settings = RunSettings {
            gff_filename: gff.path().to_path_buf(),
            output_folder: workdir.path().join("output"),
            variant_filenames: vec![vcf.path().to_path_buf()],
            feature_key: "gene_id".to_string(),
            threads: 1,
            ..Default::default()
        };
        (settings, gff, vcf, workdir)
    }

    #[test]
    fn test_valid_settings() {
        let (settings, _gff, _vcf, _workdir) = mock_settings();
        let checked = check_run_settings(settings).unwrap();
        assert_eq!(checked.varbin_version, *FULL_VERSION);
        assert_eq!(checked.format_override(), None);
    }

    #[test]
    fn test_existing_output_folder_is_rejected() {
        let (mut settings, _gff, _vcf, workdir) = mock_settings();
        settings.output_folder = workdir.path().to_path_buf();
        assert!(check_run_settings(settings).is_err());
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let (mut settings, _gff, _vcf, _workdir) = mock_settings();
        settings.format = Some("NotACaller".to_string());
        assert!(check_run_settings(settings).is_err());
    }

    #[test]
    fn test_format_override_parses() {
        let (mut settings, _gff, _vcf, _workdir) = mock_settings();
        settings.format = Some("VarScan".to_string());
        let checked = check_run_settings(settings).unwrap();
        assert_eq!(checked.format_override(), Some(CallerFormat::VarScan));
    }

    #[test]
    fn test_missing_gff_is_rejected() {
        let (mut settings, _gff, _vcf, _workdir) = mock_settings();
        settings.gff_filename = PathBuf::from("/does/not/exist.gtf");
        assert!(check_run_settings(settings).is_err());
    }
}
