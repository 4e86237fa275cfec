pub mod aggregation;
pub mod carry_forward;
pub mod history;
pub mod merge;
pub mod orchestrator;
pub mod status_scale;
pub mod template;

pub use aggregation::*;
pub use carry_forward::*;
pub use history::*;
pub use merge::*;
pub use orchestrator::*;
pub use status_scale::*;
pub use template::*;
