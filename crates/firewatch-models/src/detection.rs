//! Detection models produced by the inference engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class names in model output order.
///
/// Class ids index positionally into this table, so the order must match the
/// ordering the fire model was trained with.
pub const CLASS_NAMES: &[&str] = &["fire", "smoke", "other"];

/// Classes emitted by the fire model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FireClass {
    Fire,
    Smoke,
    Other,
}

impl FireClass {
    /// Map a model class id to a class, `None` if the id is outside the table.
    pub fn from_index(class_id: usize) -> Option<Self> {
        match class_id {
            0 => Some(FireClass::Fire),
            1 => Some(FireClass::Smoke),
            2 => Some(FireClass::Other),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            FireClass::Fire => 0,
            FireClass::Smoke => 1,
            FireClass::Other => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        CLASS_NAMES[self.index()]
    }
}

impl fmt::Display for FireClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Axis-aligned bounding box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Integer pixel corners, truncated like the drawing routines expect.
    pub fn to_pixels(&self) -> (i32, i32, i32, i32) {
        (self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32)
    }
}

/// One model output for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Index into [`CLASS_NAMES`]
    pub class_id: usize,
    /// Detection confidence [0, 1]
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: usize, confidence: f32) -> Self {
        Self {
            bbox,
            class_id,
            confidence,
        }
    }

    pub fn class(&self) -> Option<FireClass> {
        FireClass::from_index(self.class_id)
    }

    pub fn is_fire(&self) -> bool {
        self.class() == Some(FireClass::Fire)
    }

    /// Class label, `"unknown"` for ids outside the class table.
    pub fn label(&self) -> &'static str {
        self.class().map(|c| c.as_str()).unwrap_or("unknown")
    }
}
