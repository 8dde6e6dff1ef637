//! # skylight-view
//!
//! Headless view instances. Each instance shows the current wallpaper, the
//! last error and the history, and coordinates its own refresh requests with
//! the background orchestrator through the store's change feed.

pub mod coordinator;
pub mod display;
pub mod instance;

mod error;

pub use coordinator::RequestCoordinator;
pub use display::DisplayState;
pub use error::ViewError;
pub use instance::{mount, ViewConfig, ViewHandle};
