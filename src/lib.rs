//! # Cubemap Capture
//!
//! Tick-driven capture orchestration producing periodic single-shot images
//! and six-face cube-map panoramas from virtual cameras, without disturbing
//! the host engine's visible rendering.
//!
//! ## Architecture
//!
//! - `host`: the narrow capability trait the pipeline consumes from the
//!   engine, plus a procedural [`SyntheticHost`] for demos
//! - `capture`: scheduler state machines (single-shot and panorama), the
//!   render-context guard, cube-face geometry, and async readback conversion
//! - `worker`: background encode and stitch threads with single-slot
//!   backpressure
//! - `state`: atomically published PNG output per capture kind
//! - `preview`: live-view HTTP server per capture kind
//! - `session`: the [`CaptureRig`] composition root and tick entry point
//!
//! Everything heavier than scheduling runs off the tick thread: pixel
//! conversion on a dedicated thread, stitching and PNG encoding on one
//! worker per kind. The tick thread's per-tick cost is bounded by channel
//! drains and at most one render dispatch.
//!
//! [`SyntheticHost`]: host::synthetic::SyntheticHost

pub mod capture;
pub mod config;
pub mod error;
pub mod host;
pub mod preview;
pub mod session;
pub mod state;
pub mod worker;

pub use error::{CaptureError, CaptureResult};
pub use session::{CaptureKind, CaptureRig, TICKS_PER_SECOND, interval_ticks};
pub use state::StateHandle;

// Resampling selections are part of the public configuration surface.
pub use pano_scale::{Algorithm, DownscaleConfig, Stage};
