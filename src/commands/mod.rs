pub mod stats;
pub mod update;
