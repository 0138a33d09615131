#![deny(rust_2018_idioms)]

pub mod normalize;

pub mod record;
pub use record::{Record, Side};

pub mod group;

pub mod reconcile;
pub use reconcile::function::{classify, reconcile};

pub mod frequency;

pub mod assemble;
pub use assemble::ReconciliationResult;

pub mod ingest;
pub use ingest::function::{find_latest, ingest};

pub mod report;
pub use report::function::{next_output_dir, write_report, write_section};

pub mod config;
pub use config::Config;
