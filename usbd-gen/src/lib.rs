pub mod allocate;
pub mod config;
pub mod descriptor;
pub mod error;
mod generate;
pub mod strings;
pub mod table;

pub use allocate::{allocate, Allocation};
pub use config::{load, load_str, load_yaml_str, Format, UsbConfig};
pub use error::{ConfigError, ValidationError};
pub use generate::*;
