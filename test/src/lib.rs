//! Test support for replica: sample layouts, a resolver whose objects
//! arrive on demand, and a lossy in-memory link between an authority and
//! an observer of one object.

pub mod helpers;

pub use helpers::*;
