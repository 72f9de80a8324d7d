//! Local selection set and multi-shape drag.

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use crate::doc::{Shape, ShapeId, ShapePatch};

/// Ordered set of selected shape ids. Insertion order is preserved so the first
/// selected shape can act as the primary one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<ShapeId>,
}

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection with `ids`, or union them in when `add` is set.
    pub fn select<I>(&mut self, ids: I, add: bool)
    where
        I: IntoIterator<Item = ShapeId>,
    {
        if !add {
            self.ids.clear();
        }
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
    }

    /// Remove the given ids, or everything when `ids` is `None`. Returns what was removed.
    pub fn deselect(&mut self, ids: Option<&[ShapeId]>) -> Vec<ShapeId> {
        match ids {
            None => std::mem::take(&mut self.ids),
            Some(targets) => {
                let mut removed = Vec::new();
                self.ids.retain(|id| {
                    let drop = targets.contains(id);
                    if drop {
                        removed.push(id.clone());
                    }
                    !drop
                });
                removed
            }
        }
    }

    /// Drop ids for which `exists` is false. Returns what was removed.
    pub fn retain_existing(&mut self, exists: impl Fn(&str) -> bool) -> Vec<ShapeId> {
        let mut removed = Vec::new();
        self.ids.retain(|id| {
            let keep = exists(id);
            if !keep {
                removed.push(id.clone());
            }
            keep
        });
        removed
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    #[must_use]
    pub fn ids(&self) -> &[ShapeId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Position patches for dragging `dragged_id` to `(x, y)` while carrying the rest of
/// the selection along.
///
/// The delta is measured on the dragged shape and applied unchanged to every other
/// selected shape. Shapes rejected by `editable` are skipped. The dragged shape's
/// own patch comes first. Returns an empty list when the dragged shape is not in
/// `shapes`.
#[must_use]
pub fn group_drag(
    shapes: &[Shape],
    selection: &Selection,
    dragged_id: &str,
    x: f64,
    y: f64,
    editable: impl Fn(&Shape) -> bool,
) -> Vec<(ShapeId, ShapePatch)> {
    let Some(dragged) = shapes.iter().find(|s| s.id == dragged_id) else {
        return Vec::new();
    };
    let dx = x - dragged.x;
    let dy = y - dragged.y;

    let mut out = vec![(dragged.id.clone(), ShapePatch::position(x, y))];
    if !selection.contains(dragged_id) {
        return out;
    }
    for id in selection.ids() {
        if id == dragged_id {
            continue;
        }
        let Some(other) = shapes.iter().find(|s| &s.id == id) else {
            continue;
        };
        if !editable(other) {
            continue;
        }
        out.push((other.id.clone(), ShapePatch::position(other.x + dx, other.y + dy)));
    }
    out
}
