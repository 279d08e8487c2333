// # Capture Module
//
// Scheduler state machines and the plumbing they share: the render-context
// guard, cube-face geometry, and the async readback conversion pipeline.

pub mod context;
pub mod faces;
pub mod panorama;
pub mod readback;
pub mod single;
