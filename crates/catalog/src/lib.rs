pub mod filter;
pub mod signal;
pub mod taxonomy;

pub use filter::*;
pub use signal::*;
pub use taxonomy::*;
