pub mod cells;
pub mod query;
pub mod symbology;

pub use cells::*;
pub use query::*;
pub use symbology::*;
