use std::path::Path;

use image::{Rgba, RgbaImage};
use paintpad::cli::replay;
use paintpad::session::ImageUse;
use paintpad::settings::PaintSettings;
use paintpad::{HistoryLog, PaintError, PixelBuffer, PointerOutcome, Session, ToolKind};

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

fn seeded(width: u32, height: u32) -> Session {
    Session::from_settings(&PaintSettings {
        canvas_width: width,
        canvas_height: height,
        rng_seed: Some(11),
        ..PaintSettings::default()
    })
}

#[test]
fn fill_blank_canvas_red() {
    let mut s = seeded(10, 10);
    s.set_tool(ToolKind::Fill);
    s.set_color(RED);
    assert_eq!(s.on_pointer_down(5.0, 5.0).unwrap(), PointerOutcome::Commit);
    assert!(s.buffer().image().pixels().all(|p| *p == RED));
    assert_eq!(s.history().len(), 2);
}

#[test]
fn border_blocks_fill() {
    let mut s = seeded(10, 10);
    s.set_color(BLACK);
    s.set_brush_size(1);
    s.set_tool(ToolKind::Rectangle);
    s.on_pointer_down(0.0, 0.0).unwrap();
    s.on_pointer_up(9.0, 9.0);

    s.set_tool(ToolKind::Fill);
    s.set_color(BLUE);
    s.on_pointer_down(5.0, 5.0).unwrap();

    for y in 0..10 {
        for x in 0..10 {
            let edge = x == 0 || y == 0 || x == 9 || y == 9;
            let expected = if edge { BLACK } else { BLUE };
            assert_eq!(s.buffer().get(x, y).unwrap(), expected, "({}, {})", x, y);
        }
    }
}

#[test]
fn history_commit_after_undo_drops_redo() {
    let mut a = PixelBuffer::new(3, 3);
    let mut log = HistoryLog::new();
    log.commit(a.snapshot());
    a.set(0, 0, RED).unwrap();
    let b = a.snapshot();
    log.commit(b.clone());
    a.set(1, 1, RED).unwrap();
    log.commit(a.snapshot());

    log.undo().unwrap();
    let first = log.undo().unwrap();
    assert_eq!(first.get_pixel(0, 0), Some(WHITE));
    assert!(log.redo().unwrap().same_entry(&b));

    a.set(2, 2, BLUE).unwrap();
    log.commit(a.snapshot());
    assert!(matches!(log.redo(), Err(PaintError::NothingToRedo)));
}

#[test]
fn restore_into_resized_buffer_is_rejected() {
    let mut buf = PixelBuffer::new(8, 8);
    let snap = buf.snapshot();
    buf.resize(9, 8);
    assert!(matches!(
        buf.restore(&snap),
        Err(PaintError::DimensionMismatch { .. })
    ));
}

#[test]
fn every_gesture_kind_commits_exactly_once() {
    let mut s = seeded(40, 40);
    s.set_color(RED);
    let drags: &[(ToolKind, (f32, f32), (f32, f32))] = &[
        (ToolKind::Pencil, (1.0, 1.0), (30.0, 1.0)),
        (ToolKind::Eraser, (1.0, 1.0), (10.0, 1.0)),
        (ToolKind::Rectangle, (5.0, 5.0), (15.0, 15.0)),
        (ToolKind::Circle, (25.0, 25.0), (30.0, 25.0)),
        (ToolKind::Line, (0.0, 39.0), (39.0, 39.0)),
        (ToolKind::Spray, (20.0, 20.0), (22.0, 22.0)),
    ];
    for (i, (tool, from, to)) in drags.iter().enumerate() {
        s.set_tool(*tool);
        s.on_pointer_down(from.0, from.1).unwrap();
        s.on_pointer_move(to.0, to.1);
        assert_eq!(s.on_pointer_up(to.0, to.1), PointerOutcome::Commit);
        assert_eq!(s.history().len(), i + 2, "{:?}", tool);
    }
}

#[test]
fn undo_redo_walks_back_to_the_blank_canvas() {
    let mut s = seeded(12, 12);
    s.set_color(RED);
    s.set_brush_size(2);
    for row in [2.0, 5.0, 8.0] {
        s.on_pointer_down(0.0, row).unwrap();
        s.on_pointer_move(11.0, row);
        s.on_pointer_up(11.0, row);
    }
    let finished = s.snapshot();

    while s.undo().is_ok() {}
    assert!(s.buffer().image().pixels().all(|p| *p == WHITE));
    while s.redo().is_ok() {}
    assert_eq!(s.snapshot(), finished);
}

#[test]
fn stale_paste_after_reset_is_dropped() {
    let mut s = seeded(10, 10);
    let ticket = s.begin_image_load(ImageUse::Paste);
    s.reset(10, 10);
    let result = s.complete_image_load(ticket, Ok(RgbaImage::from_pixel(3, 3, RED)));
    assert!(matches!(result, Err(PaintError::StaleImage)));
    assert_eq!(s.buffer().get(0, 0).unwrap(), WHITE);
}

#[test]
fn house_demo_replays_deterministically() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/house.paint");
    let source = std::fs::read_to_string(&path).unwrap();

    let render = || {
        let mut s = seeded(320, 300);
        let report = replay(&mut s, &source, path.parent().unwrap()).unwrap();
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
        s.snapshot()
    };
    let first = render();
    assert_eq!(first, render());

    // Wall interior was filled, the sky outside the house was not.
    assert_eq!(first.get_pixel(120, 150), Some(Rgba([0xF5, 0xDE, 0xB3, 255])));
    assert_eq!(first.get_pixel(5, 5), Some(WHITE));
}

#[test]
fn exported_png_matches_the_canvas() {
    let mut s = seeded(16, 16);
    s.set_color(BLUE);
    s.set_tool(ToolKind::Fill);
    s.on_pointer_down(3.0, 3.0).unwrap();

    let out = std::env::temp_dir().join(format!("paintpad-scenario-{}.png", uuid::Uuid::new_v4()));
    s.export(&out).unwrap();
    let back = image::open(&out).unwrap().into_rgba8();
    let _ = std::fs::remove_file(&out);

    assert_eq!(back.as_raw().as_slice(), s.snapshot().as_raw());
    assert!(!s.is_dirty);
}
