//! Command line surface of the `ecp` binary

pub mod args;
pub mod output;
