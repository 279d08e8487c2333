//! Asynchronous readback and pixel conversion.
//!
//! Host readback completions arrive on arbitrary threads carrying raw
//! bottom-up BGRA buffers. A single conversion thread turns them into
//! top-down RGBA images off the tick thread, then queues a
//! [`FrameEvent`](crate::session::FrameEvent) for the scheduler to drain at
//! the start of its next tick. Conversion failures travel the same path as
//! mapping failures: an `Err` frame the scheduler can fall back from.

use crossbeam_channel::{Receiver, Sender, unbounded};
use image::RgbaImage;

use crate::error::CaptureResult;
use crate::host::{MappedFrame, ReadbackTicket, RenderHost, TargetId};
use crate::session::{CaptureKind, Event, FrameEvent};

struct ConvertJob {
    kind: CaptureKind,
    session: u64,
    face: Option<usize>,
    target: TargetId,
    mapped: Result<MappedFrame, String>,
}

/// Owns the conversion thread. One per rig.
pub struct ReadbackPipeline {
    convert_tx: Sender<ConvertJob>,
}

impl ReadbackPipeline {
    /// Spawn the conversion thread. Converted frames (and failures) are
    /// forwarded to `events` for the tick thread to drain.
    pub fn spawn(events: Sender<Event>) -> Self {
        let (convert_tx, convert_rx): (Sender<ConvertJob>, Receiver<ConvertJob>) = unbounded();
        std::thread::Builder::new()
            .name("capture-readback-convert".to_string())
            .spawn(move || {
                while let Ok(job) = convert_rx.recv() {
                    let (ticket, result) = match job.mapped {
                        Ok(frame) => {
                            let ticket = frame.ticket;
                            (Some(ticket), convert_mapped(frame))
                        }
                        Err(reason) => (None, Err(reason)),
                    };
                    let event = Event::Frame(FrameEvent {
                        kind: job.kind,
                        session: job.session,
                        face: job.face,
                        target: job.target,
                        ticket,
                        result,
                    });
                    if events.send(event).is_err() {
                        break;
                    }
                }
            })
            .ok();
        Self { convert_tx }
    }

    pub fn handle(&self) -> ReadbackHandle {
        ReadbackHandle {
            convert_tx: self.convert_tx.clone(),
        }
    }
}

/// Cloneable sender side of the conversion pipeline.
#[derive(Clone)]
pub struct ReadbackHandle {
    convert_tx: Sender<ConvertJob>,
}

impl ReadbackHandle {
    /// Begin an asynchronous readback of `target`. The completion callback
    /// forwards the mapped buffer (or failure) into the conversion thread.
    pub fn request(
        &self,
        host: &mut dyn RenderHost,
        target: TargetId,
        kind: CaptureKind,
        session: u64,
        face: Option<usize>,
    ) -> CaptureResult<()> {
        let convert_tx = self.convert_tx.clone();
        host.begin_readback(
            target,
            Box::new(move |mapped| {
                let _ = convert_tx.send(ConvertJob {
                    kind,
                    session,
                    face,
                    target,
                    mapped,
                });
            }),
        )
    }
}

/// Convert a mapped bottom-up BGRA buffer into a top-down RGBA image.
///
/// Alpha is forced opaque; render targets carry garbage alpha.
fn convert_mapped(frame: MappedFrame) -> Result<RgbaImage, String> {
    let (w, h) = (frame.width as usize, frame.height as usize);
    let expected = w * h * 4;
    if frame.data.len() < expected {
        return Err(format!(
            "mapped buffer too small: {} bytes for {}x{}",
            frame.data.len(),
            frame.width,
            frame.height
        ));
    }

    let mut out = vec![0u8; expected];
    for y in 0..h {
        let src_row = (h - 1 - y) * w * 4;
        let dst_row = y * w * 4;
        for x in 0..w {
            let s = src_row + x * 4;
            let d = dst_row + x * 4;
            out[d] = frame.data[s + 2];
            out[d + 1] = frame.data[s + 1];
            out[d + 2] = frame.data[s];
            out[d + 3] = 255;
        }
    }

    RgbaImage::from_raw(frame.width, frame.height, out)
        .ok_or_else(|| "converted buffer has wrong length".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapped(width: u32, height: u32, data: Vec<u8>) -> MappedFrame {
        MappedFrame {
            ticket: ReadbackTicket(1),
            width,
            height,
            data,
        }
    }

    #[test]
    fn test_convert_flips_rows_and_swaps_channels() {
        // 1x2: bottom row red (BGRA 0,0,255,7), top row green (0,255,0,7).
        let data = vec![0, 0, 255, 7, 0, 255, 0, 7];
        let image = convert_mapped(mapped(1, 2, data)).unwrap();
        // Top-down output: row 0 is the source's top row (green).
        assert_eq!(image.get_pixel(0, 0).0, [0, 255, 0, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn test_convert_rejects_short_buffer() {
        let err = convert_mapped(mapped(4, 4, vec![0u8; 10])).unwrap_err();
        assert!(err.contains("too small"));
    }

    #[test]
    fn test_pipeline_delivers_frame_events() {
        let (events_tx, events_rx) = unbounded();
        let pipeline = ReadbackPipeline::spawn(events_tx);
        let handle = pipeline.handle();

        let mut host = crate::host::synthetic::SyntheticHost::new();
        let target = host.alloc_target(4, 4).unwrap();
        let mut overrides = host.overrides();
        overrides.target = Some(target);
        host.apply_overrides(&overrides).unwrap();
        host.render_frame().unwrap();

        handle
            .request(&mut host, target, CaptureKind::Single, 3, None)
            .unwrap();

        let event = events_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();
        let Event::Frame(frame) = event else {
            panic!("expected frame event");
        };
        assert_eq!(frame.kind, CaptureKind::Single);
        assert_eq!(frame.session, 3);
        assert!(frame.ticket.is_some());
        let image = frame.result.unwrap();
        assert_eq!(image.dimensions(), (4, 4));
    }
}
