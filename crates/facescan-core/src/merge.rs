//! Rectangle grouping: collapse near-duplicate detections into one rectangle per object.
//!
//! Two rectangles are *similar* when their positions and sizes each differ by
//! at most `eps` times the smaller of the two extents along that axis. Groups
//! are the transitive closure of similarity, so a chain A~B~C forms one group
//! even if A and C are far apart.
//!
//! A group survives when it has at least `group_threshold + 1` members:
//! threshold 0 keeps singletons, threshold 2 needs three raw hits.

use crate::types::Rect;
use serde::{Deserialize, Serialize};

/// Smallest member count below which a group never shields nested groups.
const NESTED_MIN_WEIGHT: usize = 3;

/// Grouping settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupingParams {
    pub group_threshold: u32,
    pub eps: f64,
    /// Also drop surviving groups nested inside a better supported group.
    pub suppress_nested: bool,
}

impl Default for GroupingParams {
    fn default() -> Self {
        Self {
            group_threshold: 2,
            eps: 0.2,
            suppress_nested: false,
        }
    }
}

/// A consensus rectangle and the number of raw rectangles behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RectGroup {
    pub rect: Rect,
    pub members: usize,
}

/// Whether `a` and `b` are within the relative tolerance `eps` of each other.
pub fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let tol_w = eps * a.width.min(b.width) as f64;
    let tol_h = eps * a.height.min(b.height) as f64;
    let diff = |p: i32, q: i32| (p as i64 - q as i64).abs() as f64;

    diff(a.x, b.x) <= tol_w
        && diff(a.y, b.y) <= tol_h
        && diff(a.width, b.width) <= tol_w
        && diff(a.height, b.height) <= tol_h
}

/// Merge `rects` and return only the consensus rectangles.
pub fn group_rectangles(rects: &[Rect], group_threshold: u32, eps: f64) -> Vec<Rect> {
    let params = GroupingParams {
        group_threshold,
        eps,
        suppress_nested: false,
    };
    group(rects, &params).into_iter().map(|g| g.rect).collect()
}

/// Merge `rects` into groups.
///
/// Groups are reported in the order of their earliest member in `rects`.
pub fn group(rects: &[Rect], params: &GroupingParams) -> Vec<RectGroup> {
    if rects.is_empty() {
        return Vec::new();
    }

    let clusters = partition(rects, params.eps);
    let min_members = params.group_threshold as usize + 1;

    let groups: Vec<RectGroup> = clusters
        .iter()
        .filter(|members| members.len() >= min_members)
        .map(|members| RectGroup {
            rect: average(rects, members),
            members: members.len(),
        })
        .collect();

    tracing::trace!(
        input = rects.len(),
        clusters = clusters.len(),
        kept = groups.len(),
        "grouped rectangles"
    );

    if params.suppress_nested {
        suppress_nested(&groups, params.eps)
    } else {
        groups
    }
}

/// Split indices of `rects` into similarity classes (union-find).
///
/// Classes are ordered by their smallest index; members stay in input order.
fn partition(rects: &[Rect], eps: f64) -> Vec<Vec<usize>> {
    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if similar(&rects[i], &rects[j], eps) {
                let ri = find(&mut parent, i);
                let rj = find(&mut parent, j);
                if ri != rj {
                    // Keep the smaller index as root so class order is stable.
                    let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
                    parent[hi] = lo;
                }
            }
        }
    }

    let mut slot_of_root = vec![usize::MAX; n];
    let mut classes: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        if slot_of_root[root] == usize::MAX {
            slot_of_root[root] = classes.len();
            classes.push(Vec::new());
        }
        classes[slot_of_root[root]].push(i);
    }
    classes
}

fn average(rects: &[Rect], members: &[usize]) -> Rect {
    let mut sum = [0i64; 4];
    for &i in members {
        let r = &rects[i];
        sum[0] += r.x as i64;
        sum[1] += r.y as i64;
        sum[2] += r.width as i64;
        sum[3] += r.height as i64;
    }
    let n = members.len() as f64;
    let mean = |s: i64| (s as f64 / n).round() as i32;
    Rect::new(mean(sum[0]), mean(sum[1]), mean(sum[2]), mean(sum[3]))
}

/// Drop groups that sit inside another, better supported group.
fn suppress_nested(groups: &[RectGroup], eps: f64) -> Vec<RectGroup> {
    groups
        .iter()
        .enumerate()
        .filter(|(i, inner)| {
            !groups.iter().enumerate().any(|(j, outer)| {
                *i != j
                    && contains_with_margin(&outer.rect, &inner.rect, eps)
                    && (outer.members > NESTED_MIN_WEIGHT.max(inner.members)
                        || inner.members < NESTED_MIN_WEIGHT)
            })
        })
        .map(|(_, g)| *g)
        .collect()
}

fn contains_with_margin(outer: &Rect, inner: &Rect, eps: f64) -> bool {
    let dx = (outer.width as f64 * eps).round() as i64;
    let dy = (outer.height as f64 * eps).round() as i64;
    inner.x as i64 >= outer.x as i64 - dx
        && inner.y as i64 >= outer.y as i64 - dy
        && inner.right() <= outer.right() + dx
        && inner.bottom() <= outer.bottom() + dy
}
