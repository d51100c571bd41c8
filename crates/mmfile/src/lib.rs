#![doc = include_str!("../README.md")]

mod buffer;
pub mod error;
mod file;
mod mode;
pub mod platform;

pub use buffer::*;
pub use error::*;
pub use file::*;
pub use mode::*;
pub use platform::{Native, Platform, Region};
