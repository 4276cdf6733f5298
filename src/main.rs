
use itertools::Itertools;
use log::{error, info, warn, LevelFilter};
use std::time::Instant;

use varbin::binning::{aggregate_features, process_variant_files, EngineConfigBuilder};
use varbin::cli::core::FULL_VERSION;
use varbin::cli::run::{check_run_settings, get_settings};
use varbin::feature_index::build_feature_space;
use varbin::parsing::gff::{GffReader, GffRecord};
use varbin::parsing::known_variants::KnownVariants;
use varbin::util::json_io::save_json;
use varbin::writers::counts::write_counts;
use varbin::writers::run_info::{write_run_info, RunInfo};
use varbin::writers::variant_details::{write_variant_details, write_variant_locations};

fn main() {
    // start the timer
    let start_time = Instant::now();
    let command_line = std::env::args().join(" ");
    let settings = get_settings();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_run_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // set up the number of threads for rayon
    match rayon::ThreadPoolBuilder::new().num_threads(settings.threads).build_global() {
        Ok(()) => {},
        Err(e) => {
            error!("Error while building thread pool: {e}");
            std::process::exit(exitcode::OSERR);
        }
    };

    // create the primary output folder
    info!("Creating output folder at {:?}...", settings.output_folder);
    match std::fs::create_dir_all(&settings.output_folder) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // save the CLI options
    let settings_json = settings.output_folder.join("settings.json");
    info!("Saving CLI options to {settings_json:?}...");
    if let Err(e) = save_json(&settings, &settings_json) {
        error!("Error while saving CLI options: {e}");
        std::process::exit(exitcode::IOERR);
    }

    // load the known-variant lookup if one was given
    let known_variants = settings.known_variants.as_deref().map(|filename| {
        info!("Pre-loading known variants into memory...");
        match KnownVariants::from_tsv(filename) {
            Ok(kv) => kv,
            Err(e) => {
                error!("Error while loading known variants: {e:#}");
                std::process::exit(exitcode::IOERR);
            }
        }
    });
    if let Some(known) = known_variants.as_ref() {
        info!("Loaded {} known variant positions.", known.len());
    }

    // build the engine configuration
    let engine_config = match EngineConfigBuilder::default()
        .feature_key(settings.feature_key.clone())
        .format_override(settings.format_override())
        .build() {
        Ok(ec) => ec,
        Err(e) => {
            error!("Error while building engine config: {e:?}");
            std::process::exit(exitcode::SOFTWARE);
        }
    };

    // load the annotation and freeze the feature space
    info!("Loading feature annotations from {:?}...", settings.gff_filename);
    let gff_records: Vec<GffRecord> = match GffReader::from_path(&settings.gff_filename)
        .and_then(|reader| reader.collect()) {
        Ok(records) => records,
        Err(e) => {
            error!("Error while reading annotation file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let (mut catalog, index) = match build_feature_space(gff_records, engine_config.feature_key()) {
        Ok(fs) => fs,
        Err(e) => {
            error!("Error while building the feature index: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };
    info!("Loaded {} features across the annotation.", catalog.len());
    if catalog.num_duplicate_names() > 0 {
        warn!("{} feature names appeared on more than one contig and were renamed.", catalog.num_duplicate_names());
    }

    // parse and bin everything
    info!("Parsing and binning {} variant files...", settings.variant_filenames.len());
    let stats = match process_variant_files(&settings.variant_filenames, &engine_config, &mut catalog, &index) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while processing variant files: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    info!(
        "Binned {} of {} variant observations ({} outside every feature).",
        stats.binned, stats.total_variants(), stats.unbinned
    );

    // aggregate and write all reports
    info!("Aggregating features...");
    let reports = aggregate_features(&catalog);
    info!("{} features collected at least one variant.", reports.len());

    let counts_fn = settings.output_folder.join("counts.tsv");
    info!("Saving feature counts to {counts_fn:?}...");
    if let Err(e) = write_counts(&counts_fn, &reports) {
        error!("Error while saving feature counts: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let details_fn = settings.output_folder.join("variant_details.tsv");
    info!("Saving variant details to {details_fn:?}...");
    if let Err(e) = write_variant_details(&details_fn, &reports, known_variants.as_ref()) {
        error!("Error while saving variant details: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let locations_fn = settings.output_folder.join("variant_locations.bed");
    info!("Saving variant locations to {locations_fn:?}...");
    if let Err(e) = write_variant_locations(&locations_fn, &reports, known_variants.as_ref()) {
        error!("Error while saving variant locations: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    let run_info_fn = settings.output_folder.join("run_info.txt");
    info!("Saving run report to {run_info_fn:?}...");
    let run_info = RunInfo {
        version: FULL_VERSION.clone(),
        command_line,
        stats,
        num_features: catalog.len(),
        num_reported_features: reports.len()
    };
    if let Err(e) = write_run_info(&run_info_fn, &run_info) {
        error!("Error while saving run report: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Run completed in {} seconds.", start_time.elapsed().as_secs_f64());
    info!("Process finished successfully.");
}
