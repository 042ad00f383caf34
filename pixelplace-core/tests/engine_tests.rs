//! End-to-end tests of command handling and reconstruction.

use pixelplace_core::{
    CanvasEngine, CanvasId, Config, Coord, CreateCanvas, EventLog, FileEventLog, MemoryEventLog,
    PlacePixel, StateReconstructor,
};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

fn create(id: &str, width: i64, height: i64) -> CreateCanvas {
    CreateCanvas {
        canvas_id: Some(CanvasId::new(id)),
        name: format!("canvas {id}"),
        width,
        height,
        background_color: "#FFFFFF".to_string(),
        created_by: "admin".to_string(),
    }
}

#[test]
fn test_last_writer_wins_with_ordered_history() {
    let engine = CanvasEngine::new(Arc::new(MemoryEventLog::new()), &Config::default());
    engine.create_canvas(create("a", 100, 100)).unwrap();

    let first = engine
        .place_pixel(PlacePixel::new("a", 5, 5, "#FF0000", "u1"))
        .unwrap();
    let second = engine
        .place_pixel(PlacePixel::new("a", 5, 5, "#00FF00", "u2"))
        .unwrap();

    let state = engine.canvas_state(&CanvasId::new("a")).unwrap();
    let pixel = state.pixel(Coord::new(5, 5)).unwrap();
    assert_eq!(pixel.color.as_str(), "#00FF00");

    let history: Vec<_> = pixel
        .history
        .iter()
        .map(|p| (p.user_id.as_str(), p.placed_at))
        .collect();
    assert_eq!(
        history,
        vec![
            ("u1", first.placed_at().unwrap()),
            ("u2", second.placed_at().unwrap()),
        ]
    );
}

#[test]
fn test_invalid_commands_append_nothing() {
    let log = Arc::new(MemoryEventLog::new());
    let engine = CanvasEngine::new(log.clone(), &Config::default());

    assert!(engine.create_canvas(create("x", 5, 100)).is_err());
    assert!(engine.create_canvas(create("under_score", 50, 50)).is_err());
    assert_eq!(log.last_position(), 0);

    engine.create_canvas(create("x", 50, 50)).unwrap();
    assert!(engine
        .place_pixel(PlacePixel::new("x", 1, 1, "#12345", "u"))
        .is_err());
    assert!(engine
        .place_pixel(PlacePixel::new("x", 1, 1, "#123456", ""))
        .is_err());
    assert_eq!(log.last_position(), 1);
}

#[test]
fn test_file_log_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.jsonl");
    let config = Config::default();

    {
        let log = Arc::new(FileEventLog::open(&path).unwrap());
        let engine = CanvasEngine::new(log, &config);
        engine.create_canvas(create("persist", 20, 20)).unwrap();
        engine
            .place_pixel(PlacePixel::new("persist", 1, 2, "#010203", "u1"))
            .unwrap();
    }

    let log = Arc::new(FileEventLog::open(&path).unwrap());
    let engine = CanvasEngine::new(log, &config);
    // hydration continues the stream instead of conflicting with it
    let placed = engine
        .place_pixel(PlacePixel::new("persist", 1, 2, "#040506", "u2"))
        .unwrap();
    assert_eq!(placed.history.len(), 2);
    assert_eq!(placed.total_placements, 2);

    let state = engine.canvas_state(&CanvasId::new("persist")).unwrap();
    assert_eq!(state.metadata.width, 20);
    assert_eq!(state.color_at(Coord::new(1, 2)).as_str(), "#040506");
    assert!(engine
        .create_canvas(create("persist", 20, 20))
        .unwrap_err()
        .is_validation());
}

#[test]
fn test_history_retention_from_config() {
    let mut config = Config::default();
    config.history.retain_last = Some(2);
    let engine = CanvasEngine::new(Arc::new(MemoryEventLog::new()), &config);
    engine.create_canvas(create("r", 10, 10)).unwrap();

    for user in ["a", "b", "c", "d"] {
        engine
            .place_pixel(PlacePixel::new("r", 0, 0, "#000", user))
            .unwrap();
    }
    let state = engine.canvas_state(&CanvasId::new("r")).unwrap();
    let pixel = state.pixel(Coord::new(0, 0)).unwrap();
    let users: Vec<_> = pixel.history.iter().map(|p| p.user_id.as_str()).collect();
    assert_eq!(users, vec!["c", "d"]);
    assert_eq!(pixel.total_placements, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_color_is_last_placement_and_replay_is_deterministic(
        placements in prop::collection::vec((0u32..12, 0u32..12, 0u32..0x1000000), 1..60)
    ) {
        let log = Arc::new(MemoryEventLog::new());
        let engine = CanvasEngine::new(log.clone(), &Config::default());
        engine.create_canvas(create("p", 12, 12)).unwrap();

        let mut expected = HashMap::new();
        for (x, y, rgb) in &placements {
            let color = format!("#{rgb:06X}");
            engine
                .place_pixel(PlacePixel::new("p", i64::from(*x), i64::from(*y), color.clone(), "u"))
                .unwrap();
            expected.insert(Coord::new(*x, *y), color);
        }

        let id = CanvasId::new("p");
        let state = engine.canvas_state(&id).unwrap();
        prop_assert_eq!(state.pixels.len(), expected.len());
        for (coord, color) in &expected {
            prop_assert_eq!(state.color_at(*coord).as_str(), color.as_str());
        }

        let fresh = StateReconstructor::new(log.clone());
        prop_assert_eq!(fresh.replay(&id).unwrap(), fresh.replay(&id).unwrap());
        prop_assert_eq!(&fresh.replay(&id).unwrap(), state.as_ref());
    }
}
