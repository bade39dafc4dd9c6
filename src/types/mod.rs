pub mod config;
pub mod point;
pub mod tag;

pub use config::*;
pub use point::*;
pub use tag::*;
