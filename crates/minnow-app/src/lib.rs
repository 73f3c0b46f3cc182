//! Shared application plumbing for the minnow tank frontends.

use std::sync::{Arc, Mutex};

use minnow_core::WorldState;

pub type SharedWorld = Arc<Mutex<WorldState>>;

pub mod input;
pub mod terminal;

pub mod renderer {
    use anyhow::Result;

    use crate::SharedWorld;

    /// Shared context passed to renderer implementations.
    pub struct RendererContext {
        pub world: SharedWorld,
    }

    pub trait Renderer {
        /// Stable identifier describing the renderer implementation (e.g., "terminal").
        fn name(&self) -> &'static str;

        /// Launch the renderer; blocks until the rendering session completes.
        fn run(&self, ctx: RendererContext) -> Result<()>;
    }
}
