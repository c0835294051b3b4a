// Preview: the headless render tree and everything that reads it.
// Field resolution, toolbar state and preview/form navigation all work from the
// field markers the renderer puts on each leaf.

pub mod events;
pub mod render;
pub mod resolver;
pub mod sync_bridge;
pub mod toolbar;
pub mod tree;
