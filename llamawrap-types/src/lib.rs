#![deny(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod error;
pub mod options;
pub mod stream;
pub mod traits;
pub mod types;

pub use error::*;
pub use options::*;
pub use stream::*;
pub use traits::*;
pub use types::*;
