/*!
# Writers module
Contains the logic for writing the output files of a binning run.
*/
/// Generates the per-feature counts summary
pub mod counts;
/// Generates the plain-text run report
pub mod run_info;
/// Generates the per-mutation detail table and the companion BED file
pub mod variant_details;
