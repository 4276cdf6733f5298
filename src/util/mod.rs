/*!
# Utility module
Small helpers shared across the crate.
*/
/// Serialization helper for the settings snapshot
pub mod json_io;
/// Shared progress bar styling
pub mod progress_bar;
