
/// Core logic for parsing, binning, and aggregating the variant inputs
pub mod binning;
/// Command line interface functionality
pub mod cli;
/// Contains various shared data types
pub mod data_types;
/// The feature catalog and its interval point-query index
pub mod feature_index;
/// Tooling for parsing input files into meaningful structs / data
pub mod parsing;
/// Various utility functions that tend to be very generic
pub mod util;
/// All output writers
pub mod writers;
