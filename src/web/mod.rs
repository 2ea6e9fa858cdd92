//! Local HTTP surface.

mod status;

pub use status::{router, serve, StatusBody};
