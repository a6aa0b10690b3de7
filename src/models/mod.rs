//! Domain model module declarations.

pub mod input;
pub mod keyword;
pub mod progress;
pub mod queue;
pub mod result;
pub mod session;
