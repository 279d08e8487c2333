//! # Background Encode and Stitch Workers
//!
//! One thread per capture kind, fed through a bounded single-slot channel.
//! The tick thread never blocks on image work: if the worker is still busy
//! when the next frame completes, the frame is dropped and a rate-limited
//! notice is produced instead. Finished PNGs are published to the shared
//! state before any best-effort disk export.

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, bounded};
use image::{ImageFormat, RgbaImage};
use pano_scale::{DownscaleConfig, Size, Stage};

use crate::capture::faces::{FACE_COUNT, SHEET_LAYOUT};
use crate::error::{CaptureError, CaptureResult};
use crate::session::{CaptureKind, Event};
use crate::state::StateHandle;

/// Minimum ticks between repeated frame-drop notices.
pub const SKIP_NOTICE_COOLDOWN_TICKS: u64 = 100;

/// Outcome of handing a job to a worker.
pub enum Submit {
    Queued,
    /// The worker was still busy. A notice string is present unless one was
    /// produced within the cooldown window.
    Dropped { notice: Option<String> },
}

/// Shared submission logic: single-slot queue plus an in-flight flag.
struct WorkerCore<J> {
    job_tx: Sender<J>,
    in_flight: Arc<AtomicBool>,
    last_skip_tick: Option<u64>,
    skip_notice: &'static str,
}

impl<J> WorkerCore<J> {
    fn new(job_tx: Sender<J>, in_flight: Arc<AtomicBool>, skip_notice: &'static str) -> Self {
        Self {
            job_tx,
            in_flight,
            last_skip_tick: None,
            skip_notice,
        }
    }

    fn submit(&mut self, tick: u64, job: J) -> Submit {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return self.dropped(tick);
        }
        if self.job_tx.send(job).is_err() {
            // Worker thread is gone; release the flag so later submissions
            // report drops instead of wedging.
            self.in_flight.store(false, Ordering::Release);
            return self.dropped(tick);
        }
        Submit::Queued
    }

    fn dropped(&mut self, tick: u64) -> Submit {
        let notice = match self.last_skip_tick {
            Some(last) if tick.saturating_sub(last) < SKIP_NOTICE_COOLDOWN_TICKS => None,
            _ => {
                self.last_skip_tick = Some(tick);
                Some(self.skip_notice.to_string())
            }
        };
        Submit::Dropped { notice }
    }
}

/// Worker for single-shot frames: encode and publish.
pub struct EncodeWorker {
    core: WorkerCore<RgbaImage>,
}

impl EncodeWorker {
    pub fn spawn(state: StateHandle, events: Sender<Event>) -> Self {
        let (job_tx, job_rx): (Sender<RgbaImage>, Receiver<RgbaImage>) = bounded(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&in_flight);
        std::thread::Builder::new()
            .name("capture-single-encode".to_string())
            .spawn(move || {
                while let Ok(image) = job_rx.recv() {
                    match encode_png(&image) {
                        Ok(bytes) => state.publish(Arc::from(bytes), now_millis()),
                        Err(err) => {
                            let _ = events.send(Event::WorkerError {
                                kind: CaptureKind::Single,
                                message: err.to_string(),
                            });
                        }
                    }
                    flag.store(false, Ordering::Release);
                }
            })
            .ok();
        Self {
            core: WorkerCore::new(
                job_tx,
                in_flight,
                "Skipped a frame: previous image is still encoding",
            ),
        }
    }

    pub fn submit(&mut self, tick: u64, image: RgbaImage) -> Submit {
        self.core.submit(tick, image)
    }
}

/// One completed panorama cycle, ready to stitch.
pub struct StitchJob {
    /// Six faces in capture order.
    pub faces: Vec<RgbaImage>,
    /// Downscale selection snapshotted when the cycle completed.
    pub downscale: DownscaleConfig,
    /// Destination for the on-disk export, when enabled.
    pub export_path: Option<PathBuf>,
}

/// Worker for panorama cycles: stitch, encode, publish, then export.
pub struct StitchWorker {
    core: WorkerCore<StitchJob>,
}

impl StitchWorker {
    pub fn spawn(state: StateHandle, events: Sender<Event>) -> Self {
        let (job_tx, job_rx): (Sender<StitchJob>, Receiver<StitchJob>) = bounded(1);
        let in_flight = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&in_flight);
        std::thread::Builder::new()
            .name("capture-panorama-stitch".to_string())
            .spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    if let Err(err) = run_stitch(&state, &events, job) {
                        let _ = events.send(Event::WorkerError {
                            kind: CaptureKind::Panorama,
                            message: err.to_string(),
                        });
                    }
                    flag.store(false, Ordering::Release);
                }
            })
            .ok();
        Self {
            core: WorkerCore::new(
                job_tx,
                in_flight,
                "Skipped a panorama cycle: previous sheet is still stitching",
            ),
        }
    }

    pub fn submit(&mut self, tick: u64, job: StitchJob) -> Submit {
        self.core.submit(tick, job)
    }
}

fn run_stitch(
    state: &StateHandle,
    events: &Sender<Event>,
    job: StitchJob,
) -> CaptureResult<()> {
    let sheet = stitch_sheet(&job.faces, &job.downscale)?;
    let bytes = encode_png(&sheet)?;
    // Publish before exporting: a failed disk write must not cost viewers
    // the finished sheet.
    state.publish(Arc::from(bytes), now_millis());

    if let Some(path) = job.export_path {
        if let Err(err) = export_sheet(&sheet, &path) {
            let _ = events.send(Event::WorkerError {
                kind: CaptureKind::Panorama,
                message: format!("export to {} failed: {}", path.display(), err),
            });
        }
    }
    Ok(())
}

/// Assemble six faces into a 3x2 sheet, applying the configured downscale.
///
/// Per-face downscale resizes each face before placement; post-stitch
/// resizes the assembled sheet.
pub fn stitch_sheet(faces: &[RgbaImage], downscale: &DownscaleConfig) -> CaptureResult<RgbaImage> {
    if faces.len() != FACE_COUNT {
        return Err(CaptureError::stitch(format!(
            "expected {} faces, got {}",
            FACE_COUNT,
            faces.len()
        )));
    }
    let (face_w, face_h) = faces[0].dimensions();
    if faces.iter().any(|f| f.dimensions() != (face_w, face_h)) {
        return Err(CaptureError::stitch("face dimensions are not uniform"));
    }

    let per_face = downscale.enabled() && downscale.stage == Stage::PerFace;
    let (cell_w, cell_h) = if per_face {
        (
            pano_scale::scaled_dimension(face_w, downscale.factor),
            pano_scale::scaled_dimension(face_h, downscale.factor),
        )
    } else {
        (face_w, face_h)
    };

    let mut sheet = RgbaImage::new(cell_w * 3, cell_h * 2);
    for (cell, &face_index) in SHEET_LAYOUT.iter().enumerate() {
        let x = (cell as u32 % 3) * cell_w;
        let y = (cell as u32 / 3) * cell_h;
        if per_face {
            let scaled = resize_image(&faces[face_index], cell_w, cell_h, downscale)?;
            image::imageops::replace(&mut sheet, &scaled, x as i64, y as i64);
        } else {
            image::imageops::replace(&mut sheet, &faces[face_index], x as i64, y as i64);
        }
    }

    if downscale.enabled() && downscale.stage == Stage::PostStitch {
        let (w, h) = sheet.dimensions();
        let size = Size { w, h };
        let (buf, out_size) = downscale.apply(sheet.into_raw(), size)?;
        return RgbaImage::from_raw(out_size.w, out_size.h, buf)
            .ok_or_else(|| CaptureError::stitch("downscaled sheet has wrong length"));
    }
    Ok(sheet)
}

fn resize_image(
    image: &RgbaImage,
    w: u32,
    h: u32,
    downscale: &DownscaleConfig,
) -> CaptureResult<RgbaImage> {
    let (src_w, src_h) = image.dimensions();
    let buf = pano_scale::resize(
        image.as_raw(),
        Size { w: src_w, h: src_h },
        Size { w, h },
        downscale.algorithm,
    )?;
    RgbaImage::from_raw(w, h, buf)
        .ok_or_else(|| CaptureError::stitch("resized face has wrong length"))
}

/// Encode an image as PNG in memory.
pub fn encode_png(image: &RgbaImage) -> CaptureResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| CaptureError::encode("png", err.to_string()))?;
    Ok(bytes)
}

fn export_sheet(sheet: &RgbaImage, path: &std::path::Path) -> CaptureResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|err| CaptureError::io_at("create_dir_all", parent.display().to_string(), err))?;
    }
    sheet
        .save_with_format(path, ImageFormat::Png)
        .map_err(|err| CaptureError::encode("export", err.to_string()))?;
    Ok(())
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
