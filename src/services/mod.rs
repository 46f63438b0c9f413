//! Core services for gathering, resolution, copying and metadata submission

pub mod copy;
pub mod delivery;
pub mod drive;
pub mod gather;
pub mod records;
pub mod resolve;
pub mod sink;
pub mod system;
