//! RAII guard over the host's shared render state.
//!
//! A capture borrows the engine's one rendering path by swapping the shared
//! overrides, rendering, and swapping back. The guard saves the full
//! override set on entry and restores it on drop, so the visible frame after
//! a capture is indistinguishable from one where no capture happened — even
//! when the capture itself errors mid-way.

use crate::error::CaptureResult;
use crate::host::{ActorId, CameraPose, Perspective, RenderHost, RenderOverrides, TargetId};

/// What a capture wants the render path configured as.
pub struct CaptureOverrides {
    pub camera: CameraPose,
    pub width: u32,
    pub height: u32,
    pub fov: f64,
    pub panorama_mode: bool,
    pub target: TargetId,
    /// Spawn a render-only stand-in actor at the capture origin for the
    /// duration of the scope.
    pub companion: bool,
}

/// Scope guard holding the host in capture configuration.
///
/// Created through [`ContextGuard::begin`]; restores the saved overrides
/// (and removes the companion actor) when dropped.
pub struct ContextGuard<'a> {
    host: &'a mut dyn RenderHost,
    saved: RenderOverrides,
    companion: Option<ActorId>,
}

impl<'a> ContextGuard<'a> {
    /// Save the current render state and apply the capture configuration.
    ///
    /// If applying fails, the saved state is restored best-effort before the
    /// error is returned; the caller never sees a half-configured host.
    pub fn begin(
        host: &'a mut dyn RenderHost,
        overrides: &CaptureOverrides,
    ) -> CaptureResult<Self> {
        let saved = host.overrides();

        let desired = RenderOverrides {
            camera: overrides.camera,
            width: overrides.width,
            height: overrides.height,
            fov: overrides.fov,
            perspective: Perspective::FirstPerson,
            hud_hidden: true,
            outline_enabled: false,
            panorama_mode: overrides.panorama_mode,
            target: Some(overrides.target),
        };

        if let Err(err) = host.apply_overrides(&desired) {
            if let Err(restore_err) = host.apply_overrides(&saved) {
                tracing::warn!(error = %restore_err, "failed to restore render state");
            }
            return Err(err);
        }

        let companion = if overrides.companion {
            match host.spawn_companion(overrides.camera) {
                Ok(actor) => Some(actor),
                Err(err) => {
                    if let Err(restore_err) = host.apply_overrides(&saved) {
                        tracing::warn!(error = %restore_err, "failed to restore render state");
                    }
                    return Err(err);
                }
            }
        } else {
            None
        };

        Ok(Self {
            host,
            saved,
            companion,
        })
    }

    /// The host, still under capture configuration.
    pub fn host(&mut self) -> &mut dyn RenderHost {
        self.host
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        // The companion must leave the scene before the overrides revert,
        // so it never renders into a restored (visible) frame.
        if let Some(actor) = self.companion.take() {
            self.host.remove_actor(actor);
        }
        if let Err(err) = self.host.apply_overrides(&self.saved) {
            tracing::warn!(error = %err, "failed to restore render state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::synthetic::SyntheticHost;

    fn capture_overrides(host: &mut SyntheticHost) -> CaptureOverrides {
        let target = host.alloc_target(8, 8).unwrap();
        CaptureOverrides {
            camera: CameraPose::default(),
            width: 8,
            height: 8,
            fov: 90.0,
            panorama_mode: true,
            target,
            companion: false,
        }
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mut host = SyntheticHost::new();
        let before = host.overrides();
        let overrides = capture_overrides(&mut host);
        {
            let mut guard = ContextGuard::begin(&mut host, &overrides).unwrap();
            let applied = guard.host().overrides();
            assert!(applied.hud_hidden);
            assert!(applied.panorama_mode);
            assert_eq!(applied.target, Some(overrides.target));
        }
        assert_eq!(host.overrides(), before);
    }

    #[test]
    fn test_begin_failure_leaves_state_untouched() {
        let mut host = SyntheticHost::new();
        let before = host.overrides();
        let overrides = CaptureOverrides {
            camera: CameraPose::default(),
            width: 8,
            height: 8,
            fov: 90.0,
            panorama_mode: false,
            target: TargetId(999), // never allocated
            companion: false,
        };
        assert!(ContextGuard::begin(&mut host, &overrides).is_err());
        assert_eq!(host.overrides(), before);
    }
}
