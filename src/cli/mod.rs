/*!
# CLI module
Contains the command-line definition and settings validation.
*/
/// Shared version strings and filename checks
pub mod core;
/// The binning run settings and their validation pass
pub mod run;
