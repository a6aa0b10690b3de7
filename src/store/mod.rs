//! In-memory session storage, queue event publication, and retention.

pub mod events;
pub mod retention;
pub mod session_store;

pub use events::QueueEvent;
pub use session_store::SessionStore;
