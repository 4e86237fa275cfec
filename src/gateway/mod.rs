pub mod gateways;
pub mod static_directory;
pub mod traits;

pub use gateways::*;
pub use static_directory::*;
pub use traits::*;
