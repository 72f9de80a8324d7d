//! Document model: shapes, sparse shape patches, and the durable base layer.
//!
//! This module defines the data types that describe what is on the canvas
//! (`Shape`, `ShapeKind`), a sparse-update type used by every override layer
//! (`ShapePatch`), and the in-memory mirror of the durable store (`DocStore`).
//!
//! Data flows into `DocStore` only from the durable store subscription. Local
//! edits never touch it directly; they live in the optimistic layer until the
//! store echoes them back.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque, stable shape identifier assigned at creation.
pub type ShapeId = String;

/// Opaque actor (user) identifier supplied by the identity layer.
pub type ActorId = String;

/// The variant of a shape. Determines which geometry fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Axis-aligned rectangle; `x`/`y` is the top-left corner.
    Rectangle,
    /// Circle; `x`/`y` is the center and `radius` the size.
    Circle,
    /// Text block; `x`/`y` is the top-left corner.
    Text,
    /// Polyline; `points` is a flat `[x0, y0, x1, y1, ...]` list relative to `x`/`y`.
    Line,
}

/// A shape as stored in the durable store and rendered on the canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Clockwise rotation in degrees.
    #[serde(default)]
    pub rotation: f64,
    /// Paint and selection order; higher values are in front.
    #[serde(default)]
    pub z_index: i64,
    /// Advisory lock holder, if any.
    #[serde(default)]
    pub locked_by: Option<ActorId>,
    #[serde(default)]
    pub created_by: ActorId,
    /// Milliseconds since Unix epoch of the last durable write.
    #[serde(default)]
    pub updated_at: i64,
}

impl Shape {
    fn blank(id: impl Into<ShapeId>, kind: ShapeKind, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            width: None,
            height: None,
            radius: None,
            points: None,
            text: None,
            font_size: None,
            rotation: 0.0,
            z_index: 0,
            locked_by: None,
            created_by: ActorId::new(),
            updated_at: 0,
        }
    }

    #[must_use]
    pub fn rectangle(id: impl Into<ShapeId>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { width: Some(width), height: Some(height), ..Self::blank(id, ShapeKind::Rectangle, x, y) }
    }

    #[must_use]
    pub fn circle(id: impl Into<ShapeId>, cx: f64, cy: f64, radius: f64) -> Self {
        Self { radius: Some(radius), ..Self::blank(id, ShapeKind::Circle, cx, cy) }
    }

    #[must_use]
    pub fn text(id: impl Into<ShapeId>, x: f64, y: f64, text: impl Into<String>, font_size: f64) -> Self {
        Self { text: Some(text.into()), font_size: Some(font_size), ..Self::blank(id, ShapeKind::Text, x, y) }
    }

    #[must_use]
    pub fn line(id: impl Into<ShapeId>, x: f64, y: f64, points: Vec<f64>) -> Self {
        Self { points: Some(points), ..Self::blank(id, ShapeKind::Line, x, y) }
    }

    /// Set the creating actor.
    #[must_use]
    pub fn with_creator(mut self, actor: impl Into<ActorId>) -> Self {
        self.created_by = actor.into();
        self
    }

    /// Set the stacking order.
    #[must_use]
    pub fn with_z(mut self, z_index: i64) -> Self {
        self.z_index = z_index;
        self
    }

    /// Set the lock holder.
    #[must_use]
    pub fn with_lock(mut self, actor: impl Into<ActorId>) -> Self {
        self.locked_by = Some(actor.into());
        self
    }

    /// Apply every present field of `patch` to this shape. Absent fields are left alone;
    /// present fields replace the whole value (no sub-object merging).
    pub fn apply(&mut self, patch: &ShapePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(w) = patch.width {
            self.width = Some(w);
        }
        if let Some(h) = patch.height {
            self.height = Some(h);
        }
        if let Some(r) = patch.radius {
            self.radius = Some(r);
        }
        if let Some(ref points) = patch.points {
            self.points = Some(points.clone());
        }
        if let Some(ref text) = patch.text {
            self.text = Some(text.clone());
        }
        if let Some(size) = patch.font_size {
            self.font_size = Some(size);
        }
        if let Some(r) = patch.rotation {
            self.rotation = r;
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
        if let Some(ref holder) = patch.locked_by {
            self.locked_by.clone_from(holder);
        }
        if let Some(ts) = patch.updated_at {
            self.updated_at = ts;
        }
    }

    /// Return a copy of this shape with `patch` applied.
    #[must_use]
    pub fn patched(&self, patch: &ShapePatch) -> Self {
        let mut out = self.clone();
        out.apply(patch);
        out
    }
}

/// Sparse update for a shape. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z_index: Option<i64>,
    /// `Some(None)` clears the lock, `Some(Some(actor))` sets it, `None` leaves it alone.
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<Option<ActorId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
}

impl ShapePatch {
    /// Patch that moves a shape to `(x, y)`.
    #[must_use]
    pub fn position(x: f64, y: f64) -> Self {
        Self { x: Some(x), y: Some(y), ..Self::default() }
    }

    /// Patch that sets the rotation.
    #[must_use]
    pub fn rotation(degrees: f64) -> Self {
        Self { rotation: Some(degrees), ..Self::default() }
    }

    /// Patch that sets or clears the lock holder.
    #[must_use]
    pub fn lock(holder: Option<ActorId>) -> Self {
        Self { locked_by: Some(holder), ..Self::default() }
    }

    /// True when no field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fold a newer patch into this one. Fields present in `newer` win.
    pub fn merge(&mut self, newer: &ShapePatch) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if newer.$field.is_some() {
                    self.$field.clone_from(&newer.$field);
                })*
            };
        }
        take!(x, y, width, height, radius, points, text, font_size, rotation, z_index, locked_by, updated_at);
    }

    /// The fields that must change to turn `from` into `to`.
    ///
    /// Lock state, identity and bookkeeping fields are never part of a diff: replaying
    /// history must not steal or drop locks.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn diff(from: &Shape, to: &Shape) -> Self {
        let mut patch = Self::default();
        if from.x != to.x {
            patch.x = Some(to.x);
        }
        if from.y != to.y {
            patch.y = Some(to.y);
        }
        if from.width != to.width {
            patch.width = to.width;
        }
        if from.height != to.height {
            patch.height = to.height;
        }
        if from.radius != to.radius {
            patch.radius = to.radius;
        }
        if from.points != to.points {
            patch.points.clone_from(&to.points);
        }
        if from.text != to.text {
            patch.text.clone_from(&to.text);
        }
        if from.font_size != to.font_size {
            patch.font_size = to.font_size;
        }
        if from.rotation != to.rotation {
            patch.rotation = Some(to.rotation);
        }
        if from.z_index != to.z_index {
            patch.z_index = Some(to.z_index);
        }
        patch
    }

    /// Copy of this patch with the lock field removed.
    #[must_use]
    pub fn without_lock(&self) -> Self {
        Self { locked_by: None, ..self.clone() }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Local mirror of the durable shape collection: the base layer of the merge.
#[derive(Debug, Clone, Default)]
pub struct DocStore {
    shapes: HashMap<ShapeId, Shape>,
    loaded: bool,
}

impl DocStore {
    /// Create an empty, not-yet-loaded store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all shapes with a full snapshot from the durable store.
    pub fn load_snapshot(&mut self, shapes: Vec<Shape>) {
        self.shapes.clear();
        for shape in shapes {
            self.shapes.insert(shape.id.clone(), shape);
        }
        self.loaded = true;
    }

    /// Whether at least one snapshot has arrived.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.shapes.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.shapes.contains_key(id)
    }

    /// Borrow the underlying map for merging.
    #[must_use]
    pub fn as_map(&self) -> &HashMap<ShapeId, Shape> {
        &self.shapes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Highest z-index present, or `None` when empty.
    #[must_use]
    pub fn max_z(&self) -> Option<i64> {
        self.shapes.values().map(|s| s.z_index).max()
    }

    /// Lowest z-index present, or `None` when empty.
    #[must_use]
    pub fn min_z(&self) -> Option<i64> {
        self.shapes.values().map(|s| s.z_index).min()
    }
}

/// Canvas-level document: who owns the canvas and what it is called.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasMetadata {
    pub owner_id: ActorId,
    #[serde(default)]
    pub name: String,
}
