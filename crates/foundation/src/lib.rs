pub mod bounds;
pub mod error;
pub mod ids;
pub mod math;
pub mod time;

// Foundation crate: small, well-tested geographic primitives only.
pub use bounds::*;
pub use error::*;
pub use ids::*;
pub use math::*;
pub use time::*;
