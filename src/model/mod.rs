pub mod aggregate;
pub mod carry_forward;
pub mod common;
pub mod directory;
pub mod field_set;
pub mod filter;
pub mod history;
pub mod report;
pub mod template;
pub mod user_context;
pub mod view;

pub use aggregate::*;
pub use carry_forward::*;
pub use common::*;
pub use directory::*;
pub use field_set::*;
pub use filter::*;
pub use history::*;
pub use report::*;
pub use template::*;
pub use user_context::*;
pub use view::*;
