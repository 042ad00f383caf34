use super::store::Entity;
use crate::error::{CanvasError, Result};
use crate::eventlog::EventEnvelope;
use crate::ratelimit::PlacementPolicy;
use chrono::{DateTime, Utc};
use pixelplace_types::{CanvasEvent, HexColor, PixelKey, PixelPlaced, PlacePixel, Placement};

/// A placement command that passed input validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidPlacement {
    pub key: PixelKey,
    pub color: HexColor,
    pub user_id: String,
}

/// Check the parts of a placement that do not depend on any state.
pub fn validate_placement(command: &PlacePixel) -> Result<ValidPlacement> {
    if command.x < 0 || command.y < 0 {
        return Err(CanvasError::validation(format!(
            "pixel coordinates must be non-negative, got ({}, {})",
            command.x, command.y
        )));
    }
    let (Ok(x), Ok(y)) = (u32::try_from(command.x), u32::try_from(command.y)) else {
        return Err(CanvasError::validation(format!(
            "pixel coordinates out of range, got ({}, {})",
            command.x, command.y
        )));
    };
    let color = HexColor::parse(&command.color)?;
    if command.user_id.trim().is_empty() {
        return Err(CanvasError::validation("user id must not be blank"));
    }

    Ok(ValidPlacement {
        key: PixelKey::new(command.canvas_id.clone(), x, y),
        color,
        user_id: command.user_id.clone(),
    })
}

/// Current color and retained placement history of one coordinate.
#[derive(Debug, Clone)]
pub struct PixelEntity {
    key: PixelKey,
    color: Option<HexColor>,
    history: Vec<Placement>,
    total_placements: u64,
    version: u64,
}

impl PixelEntity {
    /// Produce the event for a new placement.
    ///
    /// The policy sees the history as it stands before this placement. The
    /// emitted history keeps at most `retain_last` entries, oldest dropped
    /// first.
    pub fn place(
        &self,
        placement: &ValidPlacement,
        now: DateTime<Utc>,
        policy: &dyn PlacementPolicy,
        retain_last: Option<usize>,
    ) -> Result<PixelPlaced> {
        if !policy.permits(&placement.user_id, &self.history, now) {
            return Err(CanvasError::validation(format!(
                "placement rate limit exceeded for user {}",
                placement.user_id
            )));
        }

        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.extend_from_slice(&self.history);
        history.push(Placement {
            user_id: placement.user_id.clone(),
            placed_at: now,
        });
        if let Some(limit) = retain_last {
            let excess = history.len().saturating_sub(limit.max(1));
            history.drain(..excess);
        }

        Ok(PixelPlaced {
            canvas_id: self.key.canvas_id.clone(),
            x: self.key.coord.x,
            y: self.key.coord.y,
            color: placement.color.clone(),
            user_id: placement.user_id.clone(),
            history,
            total_placements: self.total_placements + 1,
        })
    }

    pub fn key(&self) -> &PixelKey {
        &self.key
    }

    /// `None` until the first placement.
    pub fn color(&self) -> Option<&HexColor> {
        self.color.as_ref()
    }

    pub fn history(&self) -> &[Placement] {
        &self.history
    }

    pub fn total_placements(&self) -> u64 {
        self.total_placements
    }
}

impl Entity for PixelEntity {
    type Key = PixelKey;

    fn empty(key: &PixelKey) -> Self {
        Self {
            key: key.clone(),
            color: None,
            history: Vec::new(),
            total_placements: 0,
            version: 0,
        }
    }

    fn stream_id(key: &PixelKey) -> String {
        key.stream_id()
    }

    fn apply(&mut self, envelope: &EventEnvelope) -> Result<()> {
        let CanvasEvent::PixelPlaced(placed) = &envelope.event else {
            return Err(CanvasError::Persistence(format!(
                "unexpected {} at {}#{}",
                envelope.event.type_name(),
                envelope.stream_id,
                envelope.sequence
            )));
        };

        self.color = Some(placed.color.clone());
        self.history = placed.history.clone();
        // Records written before the counter existed deserialize it as 0.
        self.total_placements = if placed.total_placements > 0 {
            placed.total_placements
        } else {
            self.total_placements + 1
        };
        self.version = envelope.sequence;
        Ok(())
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{AllowAll, CooldownPolicy};
    use chrono::{Duration, TimeZone};
    use pixelplace_types::CanvasId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn apply(entity: &mut PixelEntity, placed: PixelPlaced) {
        let sequence = entity.version() + 1;
        entity
            .apply(&EventEnvelope {
                stream_id: entity.key().stream_id(),
                sequence,
                position: sequence,
                recorded_at: now(),
                event: CanvasEvent::PixelPlaced(placed),
            })
            .unwrap();
    }

    #[test]
    fn test_validate_placement() {
        let ok = validate_placement(&PlacePixel::new("c", 3, 4, "#0f0", "u1")).unwrap();
        assert_eq!(ok.key, PixelKey::new(CanvasId::new("c"), 3, 4));
        assert_eq!(ok.color.as_str(), "#00FF00");

        for bad in [
            PlacePixel::new("c", -1, 0, "#000", "u1"),
            PlacePixel::new("c", 0, -1, "#000", "u1"),
            PlacePixel::new("c", 0, 0, "#00", "u1"),
            PlacePixel::new("c", 0, 0, "#000", "  "),
            PlacePixel::new("c", i64::from(u32::MAX) + 1, 0, "#000", "u1"),
        ] {
            assert!(validate_placement(&bad).unwrap_err().is_validation());
        }
    }

    #[test]
    fn test_history_appends_in_order() {
        let key = PixelKey::new(CanvasId::new("c"), 5, 5);
        let mut pixel = PixelEntity::empty(&key);

        let first = validate_placement(&PlacePixel::new("c", 5, 5, "#FF0000", "u1")).unwrap();
        let placed = pixel.place(&first, now(), &AllowAll, None).unwrap();
        apply(&mut pixel, placed);

        let second = validate_placement(&PlacePixel::new("c", 5, 5, "#00FF00", "u2")).unwrap();
        let later = now() + Duration::seconds(1);
        let placed = pixel.place(&second, later, &AllowAll, None).unwrap();
        assert_eq!(placed.total_placements, 2);
        apply(&mut pixel, placed);

        assert_eq!(pixel.color().unwrap().as_str(), "#00FF00");
        let users: Vec<_> = pixel.history().iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(users, vec!["u1", "u2"]);
        assert_eq!(pixel.history()[1].placed_at, later);
    }

    #[test]
    fn test_retention_keeps_most_recent() {
        let key = PixelKey::new(CanvasId::new("c"), 0, 0);
        let mut pixel = PixelEntity::empty(&key);
        for i in 0..5 {
            let cmd = validate_placement(&PlacePixel::new("c", 0, 0, "#000", format!("u{i}"))).unwrap();
            let placed = pixel.place(&cmd, now(), &AllowAll, Some(3)).unwrap();
            apply(&mut pixel, placed);
        }
        let users: Vec<_> = pixel.history().iter().map(|p| p.user_id.as_str()).collect();
        assert_eq!(users, vec!["u2", "u3", "u4"]);
        assert_eq!(pixel.total_placements(), 5);
    }

    #[test]
    fn test_policy_rejection_is_validation() {
        let key = PixelKey::new(CanvasId::new("c"), 0, 0);
        let mut pixel = PixelEntity::empty(&key);
        let policy = CooldownPolicy::new(1, Duration::minutes(5));
        let cmd = validate_placement(&PlacePixel::new("c", 0, 0, "#000", "u1")).unwrap();

        let placed = pixel.place(&cmd, now(), &policy, None).unwrap();
        apply(&mut pixel, placed);
        let err = pixel
            .place(&cmd, now() + Duration::minutes(1), &policy, None)
            .unwrap_err();
        assert!(err.is_validation());
    }
}
