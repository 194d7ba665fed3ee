mod orchestrator;
mod run;

pub use orchestrator::{ExtractOptions, go};
pub use run::run;
