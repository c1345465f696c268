#![warn(unused_imports)]
#![warn(dead_code)]

pub mod cache;
pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod text;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
