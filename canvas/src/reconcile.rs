//! Three-layer state merge.
//!
//! `render(id) = base[id] ⊕ ephemeral[id] ⊕ optimistic[id]`: a field-wise
//! shallow merge where the right-hand layer wins for every field it carries.
//! Existence comes from the base layer, with one exception: a local creation
//! the store has not echoed yet still renders. An ephemeral entry only applies
//! while it is newer than the base shape's last durable write. The function is pure and runs
//! in one pass over the base plus one pass over the optimistic layer.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use std::collections::HashMap;

use crate::doc::{Shape, ShapeId, ShapePatch};
use crate::overlay::{EphemeralOverride, Optimistic};

/// Merge the three layers into the shape list to render, in draw order
/// (`z_index` ascending, then id).
#[must_use]
pub fn reconcile(
    base: &HashMap<ShapeId, Shape>,
    ephemeral: &HashMap<ShapeId, EphemeralOverride>,
    optimistic: &HashMap<ShapeId, Optimistic>,
) -> Vec<Shape> {
    let mut out = Vec::with_capacity(base.len() + optimistic.len());

    for (id, shape) in base {
        let mut merged = shape.clone();
        if let Some(preview) = ephemeral.get(id).filter(|p| !p.is_superseded_by(shape)) {
            merged.apply(&preview.patch);
        }
        match optimistic.get(id) {
            Some(Optimistic::Deleted) => continue,
            Some(Optimistic::Patched(patch)) => merged.apply(patch),
            Some(Optimistic::Created(local)) => {
                // The store echoed the create before acking it: keep its lock state,
                // take our geometry.
                let patch = ShapePatch::diff(&merged, local);
                merged.apply(&patch);
            }
            None => {}
        }
        out.push(merged);
    }

    for (id, entry) in optimistic {
        if let Optimistic::Created(local) = entry {
            if !base.contains_key(id) {
                out.push(local.clone());
            }
        }
    }

    out.sort_by(|a, b| a.z_index.cmp(&b.z_index).then_with(|| a.id.cmp(&b.id)));
    out
}
