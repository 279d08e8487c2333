mod common;

use std::time::Duration;

use common::{ScriptedHost, run_ticks, wait_until};
use cubemap_capture::CaptureRig;
use cubemap_capture::capture::panorama::EXPORT_FILE_NAME;

#[test]
fn test_export_writes_sheet_to_screenshots_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ScriptedHost::new();
    host.screenshots_dir = dir.path().to_path_buf();
    let mut rig = CaptureRig::new();

    rig.panorama.set_resolution(&mut host, 16);
    rig.panorama.set_mode(&mut host, true);
    rig.panorama.set_export(&mut host, true);
    rig.start_panorama(&mut host, 10.0);
    run_ticks(&mut rig, &mut host, 100);

    let path = dir.path().join(EXPORT_FILE_NAME);
    assert!(wait_until(Duration::from_secs(10), || path.exists()));
    let sheet = image::open(&path).unwrap().to_rgba8();
    assert_eq!(sheet.dimensions(), (48, 32));
}

#[test]
fn test_export_overwrites_previous_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ScriptedHost::new();
    host.screenshots_dir = dir.path().to_path_buf();
    let mut rig = CaptureRig::new();

    rig.panorama.set_resolution(&mut host, 16);
    rig.panorama.set_mode(&mut host, true);
    rig.panorama.set_export(&mut host, true);
    rig.start_panorama(&mut host, 1.0);
    run_ticks(&mut rig, &mut host, 120);

    assert!(rig.panorama.status().completed_cycles >= 2);
    let path = dir.path().join(EXPORT_FILE_NAME);
    assert!(wait_until(Duration::from_secs(10), || path.exists()));
    // A single file, rewritten each cycle.
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn test_export_disabled_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = ScriptedHost::new();
    host.screenshots_dir = dir.path().to_path_buf();
    let mut rig = CaptureRig::new();
    let state = rig.panorama_state();

    rig.panorama.set_resolution(&mut host, 16);
    rig.panorama.set_mode(&mut host, true);
    rig.start_panorama(&mut host, 10.0);
    run_ticks(&mut rig, &mut host, 100);

    assert!(wait_until(Duration::from_secs(10), || state.available()));
    assert!(!dir.path().join(EXPORT_FILE_NAME).exists());
}
