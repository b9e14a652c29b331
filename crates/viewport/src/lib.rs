//! Camera policy for the outbreak map.
//!
//! The controller is a pure state machine ([`transition`]) wrapped by a single
//! owner ([`ViewportController`]) and driven either by hand ([`ManualDriver`])
//! or on tokio ([`spawn_driver`]). Renderers sit behind [`MapRenderer`].

pub mod camera;
pub mod config;
pub mod controller;
pub mod driver;
pub mod manual;
pub mod sim;
pub mod state;

pub use camera::*;
pub use config::*;
pub use controller::*;
pub use driver::*;
pub use manual::*;
pub use sim::*;
pub use state::*;
