// ============================================================
// Layer 3 — Landmark Domain Types
// ============================================================
// A landmark is a named point on an image. Names come from a
// fixed, ordered vocabulary shared by every image of a project;
// that order is the order of coordinates in the flattened
// regression target: [x0, y0, x1, y1, ...].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer pixel coordinate, x to the right and y downwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Build a point from floating-point coordinates, rounding
    /// half away from zero on both axes.
    pub fn rounded(x: f64, y: f64) -> Self {
        Self { x: x.round() as i64, y: y.round() as i64 }
    }
}

/// Printable form used in coordinate tables: `[x, y]`.
impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}

/// Landmark positions of one image, aligned with the vocabulary.
/// `None` marks a landmark that has not been annotated yet.
pub type LandmarkSet = Vec<Option<Point>>;

/// Ordered landmark names plus their opaque reference targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    names:   Vec<String>,
    targets: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from `(name, target)` rows.
    /// Duplicate names keep their first occurrence only.
    pub fn new(rows: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut names   = Vec::new();
        let mut targets = Vec::new();
        for (name, target) in rows {
            if !names.contains(&name) {
                names.push(name);
                targets.push(target);
            }
        }
        Self { names, targets }
    }

    /// Vocabulary without reference targets.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::new(names.into_iter().map(|n| (n.into(), String::new())))
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of scalars the regression head emits: `2 × n_landmarks`.
    pub fn output_dim(&self) -> usize {
        2 * self.names.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_display_matches_table_format() {
        assert_eq!(Point::new(123, 45).to_string(), "[123, 45]");
        assert_eq!(Point::new(-3, 0).to_string(), "[-3, 0]");
    }

    #[test]
    fn test_rounded_point() {
        assert_eq!(Point::rounded(2.5, -2.5), Point::new(3, -3));
        assert_eq!(Point::rounded(1.49, 7.51), Point::new(1, 8));
    }

    #[test]
    fn test_vocabulary_keeps_first_occurrence_order() {
        let v = Vocabulary::from_names(["eye", "tail", "eye", "fin"]);
        assert_eq!(v.names(), &["eye", "tail", "fin"]);
        assert_eq!(v.output_dim(), 6);
    }
}
