use super::store::Entity;
use crate::error::{CanvasError, Result};
use crate::eventlog::EventEnvelope;
use pixelplace_types::{CanvasCreated, CanvasEvent, CanvasId, CreateCanvas, HexColor};

pub const MIN_DIMENSION: u32 = 10;
pub const MAX_DIMENSION: u32 = 1000;
pub const MAX_NAME_LEN: usize = 255;

/// Canvas ids name streams and raster directories.
///
/// `_` is reserved as the pixel stream separator, so an id containing it
/// could collide with another canvas's pixel streams.
pub fn validate_canvas_id(id: &CanvasId) -> Result<()> {
    let raw = id.as_str();
    if raw.is_empty() {
        return Err(CanvasError::validation("canvas id must not be empty"));
    }
    if raw.len() > MAX_NAME_LEN {
        return Err(CanvasError::validation(format!(
            "canvas id must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(CanvasError::validation(format!(
            "canvas id {raw:?} may only contain ASCII letters, digits and '-'"
        )));
    }
    Ok(())
}

fn check_dimension(label: &str, value: i64) -> Result<u32> {
    let range = i64::from(MIN_DIMENSION)..=i64::from(MAX_DIMENSION);
    if !range.contains(&value) {
        return Err(CanvasError::validation(format!(
            "{label} must be between {MIN_DIMENSION} and {MAX_DIMENSION}, got {value}"
        )));
    }
    Ok(value as u32)
}

/// Write-once canvas metadata.
#[derive(Debug, Clone)]
pub struct CanvasEntity {
    id: CanvasId,
    created: Option<CanvasCreated>,
    version: u64,
}

impl CanvasEntity {
    /// Validate `command` and produce the creation event.
    pub fn create(&self, command: &CreateCanvas) -> Result<CanvasCreated> {
        if self.created.is_some() {
            return Err(CanvasError::validation(format!(
                "canvas {} already exists",
                self.id
            )));
        }
        validate_canvas_id(&self.id)?;

        if command.name.trim().is_empty() {
            return Err(CanvasError::validation("canvas name must not be empty"));
        }
        if command.name.chars().count() > MAX_NAME_LEN {
            return Err(CanvasError::validation(format!(
                "canvas name must not exceed {MAX_NAME_LEN} characters"
            )));
        }

        let width = check_dimension("width", command.width)?;
        let height = check_dimension("height", command.height)?;
        let background_color = HexColor::parse(&command.background_color)?;

        Ok(CanvasCreated {
            canvas_id: self.id.clone(),
            name: command.name.clone(),
            width,
            height,
            background_color,
            created_by: command.created_by.clone(),
        })
    }

    pub fn id(&self) -> &CanvasId {
        &self.id
    }

    pub fn metadata(&self) -> Option<&CanvasCreated> {
        self.created.as_ref()
    }

    pub fn exists(&self) -> bool {
        self.created.is_some()
    }
}

impl Entity for CanvasEntity {
    type Key = CanvasId;

    fn empty(key: &CanvasId) -> Self {
        Self {
            id: key.clone(),
            created: None,
            version: 0,
        }
    }

    fn stream_id(key: &CanvasId) -> String {
        key.to_string()
    }

    fn apply(&mut self, envelope: &EventEnvelope) -> Result<()> {
        match &envelope.event {
            CanvasEvent::CanvasCreated(created) if self.created.is_none() => {
                self.created = Some(created.clone());
            }
            other => {
                return Err(CanvasError::Persistence(format!(
                    "unexpected {} at {}#{}",
                    other.type_name(),
                    envelope.stream_id,
                    envelope.sequence
                )))
            }
        }
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

    fn command(width: i64, height: i64, color: &str) -> CreateCanvas {
        CreateCanvas {
            canvas_id: None,
            name: "Test".to_string(),
            width,
            height,
            background_color: color.to_string(),
            created_by: "admin".to_string(),
        }
    }

    fn entity() -> CanvasEntity {
        CanvasEntity::empty(&CanvasId::new("canvas-1"))
    }

    #[test]
    fn test_create_normalizes_background() {
        let event = entity().create(&command(100, 10, "#fff")).unwrap();
        assert_eq!(event.background_color.as_str(), "#FFFFFF");
        assert_eq!((event.width, event.height), (100, 10));
    }

    #[test]
    fn test_dimension_bounds() {
        for (w, h) in [(9, 100), (100, 1001), (0, 0), (-5, 50)] {
            let err = entity().create(&command(w, h, "#FFF")).unwrap_err();
            assert!(err.is_validation(), "{w}x{h} accepted");
        }
        assert!(entity().create(&command(10, 1000, "#FFF")).is_ok());
    }

    #[test]
    fn test_name_and_color_rules() {
        let mut cmd = command(50, 50, "#FFF");
        cmd.name = "   ".to_string();
        assert!(entity().create(&cmd).unwrap_err().is_validation());

        cmd.name = "x".repeat(256);
        assert!(entity().create(&cmd).unwrap_err().is_validation());

        cmd.name = "é".repeat(255);
        assert!(entity().create(&cmd).is_ok());

        let cmd = command(50, 50, "white");
        assert!(entity().create(&cmd).unwrap_err().is_validation());
    }

    #[test]
    fn test_canvas_id_rules() {
        assert!(validate_canvas_id(&CanvasId::new("0b8c-41aa")).is_ok());
        for bad in ["", "a_b", "a/b", "a b", ".."] {
            assert!(validate_canvas_id(&CanvasId::new(bad)).is_err(), "{bad:?}");
        }
    }

    #[test]
    fn test_create_is_write_once() {
        let mut canvas = entity();
        let event = canvas.create(&command(20, 20, "#000")).unwrap();
        canvas
            .apply(&EventEnvelope {
                stream_id: "canvas-1".to_string(),
                sequence: 1,
                position: 1,
                recorded_at: chrono::Utc::now(),
                event: CanvasEvent::CanvasCreated(event),
            })
            .unwrap();
        assert!(canvas.exists());
        assert_eq!(canvas.version(), 1);
        assert!(canvas.create(&command(20, 20, "#000")).unwrap_err().is_validation());
    }
}
