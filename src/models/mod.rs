//! Data models

pub mod observation;
pub mod assessment;

pub use observation::*;
pub use assessment::*;
