//! k-d tree over section descriptors
//!
//! Points are split on the five acoustic dimensions
//! `{loudness, tempo, key, mode, time_signature}` and searched with the
//! weighted [`distance`](super::distance::distance) metric.
//!
//! The metric is a sum of non-negative per-axis terms, so a subtree across a
//! splitting plane can be skipped when that axis' term alone already exceeds
//! the current best. Only loudness and tempo grow monotonically with the
//! coordinate gap; the other axes contribute a bound of zero and never prune.
//! This keeps `nearest` exact.
//!
//! Removal tombstones the node. When tombstones outnumber live points the
//! tree is rebuilt balanced from the survivors.

use super::distance::{distance, relative_difference, LOUDNESS_WEIGHT, TEMPO_WEIGHT};
use crate::types::SectionProps;
use std::cmp::Ordering;
use std::collections::HashMap;

pub const DIMENSIONS: usize = 5;

const AXIS_LOUDNESS: usize = 0;
const AXIS_TEMPO: usize = 1;

/// Below this many nodes tombstones are left in place
const MIN_COMPACT_NODES: usize = 32;

/// A section plus back-references into the owning track/section arrays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreePoint {
    pub section: SectionProps,
    pub track_index: usize,
    pub section_index: usize,
}

impl TreePoint {
    pub fn new(section: SectionProps, track_index: usize, section_index: usize) -> Self {
        Self {
            section,
            track_index,
            section_index,
        }
    }

    fn coordinate(&self, axis: usize) -> f64 {
        match axis {
            0 => self.section.loudness,
            1 => self.section.tempo,
            2 => self.section.key as f64,
            3 => self.section.mode as f64,
            _ => self.section.time_signature as f64,
        }
    }

    fn id(&self) -> (usize, usize) {
        (self.track_index, self.section_index)
    }
}

/// A search hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub point: TreePoint,
    pub distance: f64,
}

/// Distance first, then lowest track index, then lowest section index
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.point.track_index.cmp(&b.point.track_index))
        .then(a.point.section_index.cmp(&b.point.section_index))
}

/// Smallest contribution `axis` can make for any point across the plane at `split`
///
/// Capped at 1.0 like the distance itself.
fn axis_lower_bound(axis: usize, query: &TreePoint, split: f64) -> f64 {
    let bound = match axis {
        AXIS_LOUDNESS => LOUDNESS_WEIGHT * relative_difference(query.section.loudness, split),
        AXIS_TEMPO => TEMPO_WEIGHT * relative_difference(query.section.tempo, split),
        _ => 0.0,
    };
    bound.min(1.0)
}

#[derive(Debug, Clone)]
struct Node {
    point: TreePoint,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
    removed: bool,
}

/// Removable-point spatial index
#[derive(Debug, Clone, Default)]
pub struct SpatialIndex {
    nodes: Vec<Node>,
    root: Option<usize>,
    /// Live points only: `(track_index, section_index)` → node
    positions: HashMap<(usize, usize), usize>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a balanced tree in one pass
    pub fn from_points(points: Vec<TreePoint>) -> Self {
        let mut index = Self::new();
        index.rebuild(points);
        index
    }

    /// Number of live points
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn contains(&self, point: &TreePoint) -> bool {
        self.positions.contains_key(&point.id())
    }

    /// Insert a point; re-inserting an id replaces the earlier point
    pub fn insert(&mut self, point: TreePoint) {
        self.remove(&point);

        let new_index = self.nodes.len();
        let axis = match self.root {
            None => {
                self.root = Some(new_index);
                0
            }
            Some(root) => {
                let mut current = root;
                loop {
                    let node = &self.nodes[current];
                    let go_left = point.coordinate(node.axis) < node.point.coordinate(node.axis);
                    let child = if go_left { node.left } else { node.right };
                    match child {
                        Some(next) => current = next,
                        None => {
                            let axis = (node.axis + 1) % DIMENSIONS;
                            let parent = &mut self.nodes[current];
                            if go_left {
                                parent.left = Some(new_index);
                            } else {
                                parent.right = Some(new_index);
                            }
                            break axis;
                        }
                    }
                }
            }
        };

        self.nodes.push(Node {
            point,
            axis,
            left: None,
            right: None,
            removed: false,
        });
        self.positions.insert(point.id(), new_index);
    }

    /// Remove a point by its track/section id
    ///
    /// Returns `false` (and leaves the tree untouched) if it was not present.
    pub fn remove(&mut self, point: &TreePoint) -> bool {
        let Some(node_index) = self.positions.remove(&point.id()) else {
            return false;
        };
        self.nodes[node_index].removed = true;

        let tombstones = self.nodes.len() - self.positions.len();
        if self.nodes.len() >= MIN_COMPACT_NODES && tombstones > self.positions.len() {
            let survivors = self
                .nodes
                .iter()
                .filter(|n| !n.removed)
                .map(|n| n.point)
                .collect();
            self.rebuild(survivors);
        }
        true
    }

    /// Up to `k` closest live points to `query`, nearest first
    pub fn nearest(&self, query: &TreePoint, k: usize) -> Vec<Neighbor> {
        let mut best: Vec<Neighbor> = Vec::with_capacity(k + 1);
        if k == 0 {
            return best;
        }

        // (node, lower bound on any distance inside that subtree)
        let mut stack: Vec<(usize, f64)> = Vec::new();
        if let Some(root) = self.root {
            stack.push((root, 0.0));
        }

        while let Some((node_index, bound)) = stack.pop() {
            if best.len() == k && bound > best[k - 1].distance {
                continue;
            }

            let node = &self.nodes[node_index];
            if !node.removed {
                let candidate = Neighbor {
                    point: node.point,
                    distance: distance(&query.section, &node.point.section),
                };
                if best.len() < k || rank(&candidate, &best[k - 1]) == Ordering::Less {
                    let at = best
                        .binary_search_by(|probe| rank(probe, &candidate))
                        .unwrap_or_else(|i| i);
                    best.insert(at, candidate);
                    best.truncate(k);
                }
            }

            let split = node.point.coordinate(node.axis);
            let query_left = query.coordinate(node.axis) < split;
            let (near, far) = if query_left {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };

            // far side first so the near side is popped next
            if let Some(far) = far {
                let far_bound = bound.max(axis_lower_bound(node.axis, query, split));
                stack.push((far, far_bound));
            }
            if let Some(near) = near {
                stack.push((near, bound));
            }
        }

        best
    }

    fn rebuild(&mut self, mut points: Vec<TreePoint>) {
        self.nodes.clear();
        self.positions.clear();
        self.nodes.reserve(points.len());
        self.root = self.build_balanced(&mut points, 0);
    }

    fn build_balanced(&mut self, points: &mut [TreePoint], axis: usize) -> Option<usize> {
        if points.is_empty() {
            return None;
        }

        points.sort_by(|a, b| a.coordinate(axis).total_cmp(&b.coordinate(axis)));

        // Equal coordinates must all land on the right (insert sends ties right)
        let mut median = points.len() / 2;
        while median > 0 && points[median - 1].coordinate(axis) == points[median].coordinate(axis)
        {
            median -= 1;
        }

        let point = points[median];
        let node_index = self.nodes.len();
        self.nodes.push(Node {
            point,
            axis,
            left: None,
            right: None,
            removed: false,
        });
        self.positions.insert(point.id(), node_index);

        let next_axis = (axis + 1) % DIMENSIONS;
        let (left, rest) = points.split_at_mut(median);
        let left = self.build_balanced(left, next_axis);
        let right = self.build_balanced(&mut rest[1..], next_axis);

        let node = &mut self.nodes[node_index];
        node.left = left;
        node.right = right;
        Some(node_index)
    }
}
