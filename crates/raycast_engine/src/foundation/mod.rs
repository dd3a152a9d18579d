//! Foundation module
//!
//! Shared building blocks with no knowledge of scenes or rays:
//! - [`math`]: vector, rotation and transform types
//! - [`time`]: injectable clocks
//! - [`logging`]: log macros and logger setup for binaries

pub mod logging;
pub mod math;
pub mod time;
