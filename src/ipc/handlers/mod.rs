//! Method handlers, one module per concern.

pub mod session;
pub mod status;
pub mod tools;
