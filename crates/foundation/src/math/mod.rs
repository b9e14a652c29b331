pub mod geodesy;
pub mod latlon;

pub use geodesy::*;
pub use latlon::*;
