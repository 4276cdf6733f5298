/*!
# Data types module
Contains the core structs that travel through the binning pipeline.
*/
/// The binning buckets and their per-feature summary arithmetic
pub mod features;
/// The canonical variant model shared by every input format
pub mod variants;
