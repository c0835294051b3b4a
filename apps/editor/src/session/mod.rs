// Editor sessions: per-document state, timers, persistence seam and HTTP handlers.

pub mod callbacks;
pub mod debounce;
pub mod editor;
pub mod handlers;
pub mod registry;
pub mod store;

pub use registry::SessionRegistry;
pub use store::{DocumentStore, InMemoryStore};
