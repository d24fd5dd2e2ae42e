use serde::{Deserialize, Serialize};

/// Axis-aligned detection rectangle in pixel coordinates of the frame it came from.
///
/// Carries no identity and no score; detections never link across frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Detection {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Detection {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width as i64 * self.height as i64
    }

    /// True when `self` lies inside `other` grown by `(dx, dy)` on every side.
    pub fn inside(&self, other: &Detection, dx: i32, dy: i32) -> bool {
        self.x >= other.x - dx
            && self.y >= other.y - dy
            && self.right() <= other.right() + dx
            && self.bottom() <= other.bottom() + dy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inside_respects_margin() {
        let outer = Detection::new(10, 10, 20, 20);
        let inner = Detection::new(12, 12, 10, 10);
        let overhang = Detection::new(8, 12, 10, 10);

        assert!(inner.inside(&outer, 0, 0));
        assert!(!overhang.inside(&outer, 0, 0));
        assert!(overhang.inside(&outer, 2, 0));
    }

    #[test]
    fn serializes_as_named_fields() {
        let json = serde_json::to_string(&Detection::new(1, 2, 3, 4)).unwrap();
        assert_eq!(json, r#"{"x":1,"y":2,"width":3,"height":4}"#);
    }
}
