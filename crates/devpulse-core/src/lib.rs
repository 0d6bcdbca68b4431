pub mod config_manager;
pub mod error;
pub mod source;
pub mod traits;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use source::*;
pub use traits::*;
pub use types::*;
