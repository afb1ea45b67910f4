//! Run ORCA calculations: batches of independent jobs on a shared core budget
//! with [queue::Cluster], and iterative geometry optimizations with
//! [optimize::GeoOpt]

pub mod config;
pub mod container;
pub mod geom;
pub mod goat;
pub mod job;
pub mod local;
pub mod optimize;
pub mod parser;
pub mod program;
pub mod progress;
pub mod queue;
pub mod spectrum;
pub mod template;
pub mod utils;
pub mod workspace;

mod slots;

pub use config::{Config, Engine};
pub use geom::Geom;
pub use job::{CalcResult, Job};
pub use optimize::{GeoOpt, OptSettings, Outcome};
pub use parser::{OrcaOutput, Record};
pub use progress::{Event, LogProgress, Progress};
pub use queue::{Admission, Cluster};
pub use template::Template;
pub use workspace::Workspace;
