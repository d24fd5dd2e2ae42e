//! Merge overlapping raw hits into final detections.

use crate::detect::Detection;

/// Relative tolerance used both for clustering and for nested-box suppression.
pub const GROUP_EPS: f64 = 0.2;

/// Two boxes belong to the same cluster when every edge is within `delta` of the other's.
fn similar(a: &Detection, b: &Detection, eps: f64) -> bool {
    let delta = eps * (a.width.min(b.width) + a.height.min(b.height)) as f64 * 0.5;
    let close = |p: i32, q: i32| ((p - q).abs() as f64) <= delta;
    close(a.x, b.x) && close(a.y, b.y) && close(a.right(), b.right()) && close(a.bottom(), b.bottom())
}

/// Union-find over the equivalence closure of `similar`. Labels are numbered in the
/// order each class is first seen.
fn partition(rects: &[Detection], eps: f64) -> (Vec<usize>, usize) {
    let n = rects.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut rank = vec![0u32; n];

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if !similar(&rects[i], &rects[j], eps) {
                continue;
            }
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri == rj {
                continue;
            }
            match rank[ri].cmp(&rank[rj]) {
                std::cmp::Ordering::Less => parent[ri] = rj,
                std::cmp::Ordering::Greater => parent[rj] = ri,
                std::cmp::Ordering::Equal => {
                    parent[rj] = ri;
                    rank[ri] += 1;
                }
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = find(&mut parent, i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = classes;
            classes += 1;
        }
        labels.push(class_of_root[root]);
    }
    (labels, classes)
}

fn round_i32(v: f64) -> i32 {
    v.round_ties_even() as i32
}

/// Cluster `rects`, keep clusters with more than `min_neighbors` members, average each
/// cluster and drop averaged boxes that sit inside a stronger neighbor.
///
/// With `min_neighbors == 0` the input is returned untouched.
pub fn group_rectangles(rects: Vec<Detection>, min_neighbors: u32, eps: f64) -> Vec<Detection> {
    if min_neighbors == 0 || rects.is_empty() {
        return rects;
    }
    let threshold = min_neighbors as usize;

    let (labels, classes) = partition(&rects, eps);
    let mut sums = vec![[0i64; 4]; classes];
    let mut weights = vec![0usize; classes];
    for (r, &label) in rects.iter().zip(&labels) {
        let s = &mut sums[label];
        s[0] += r.x as i64;
        s[1] += r.y as i64;
        s[2] += r.width as i64;
        s[3] += r.height as i64;
        weights[label] += 1;
    }

    let averaged: Vec<Detection> = sums
        .iter()
        .zip(&weights)
        .map(|(s, &n)| {
            let k = 1.0f32 / n as f32;
            let avg = |v: i64| round_i32((v as f32 * k) as f64);
            Detection::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
        })
        .collect();

    let mut out = Vec::new();
    for (i, r1) in averaged.iter().enumerate() {
        let n1 = weights[i];
        if n1 <= threshold {
            continue;
        }
        let swallowed = averaged.iter().enumerate().any(|(j, r2)| {
            let n2 = weights[j];
            if j == i || n2 <= threshold {
                return false;
            }
            let dx = round_i32(r2.width as f64 * eps);
            let dy = round_i32(r2.height as f64 * eps);
            r1.inside(r2, dx, dy) && (n2 > n1.max(3) || n1 < 3)
        });
        if !swallowed {
            out.push(*r1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_threshold_keeps_raw_hits() {
        let hits = vec![Detection::new(0, 0, 10, 10), Detection::new(1, 1, 10, 10)];
        assert_eq!(group_rectangles(hits.clone(), 0, GROUP_EPS), hits);
    }

    #[test]
    fn clusters_average_and_respect_threshold() {
        let hits = vec![
            Detection::new(10, 10, 20, 20),
            Detection::new(11, 10, 20, 20),
            Detection::new(12, 11, 20, 20),
            // lone far-away hit
            Detection::new(100, 100, 20, 20),
        ];
        let grouped = group_rectangles(hits, 2, GROUP_EPS);
        assert_eq!(grouped, vec![Detection::new(11, 10, 20, 20)]);
    }

    #[test]
    fn strong_outer_box_swallows_weak_inner_box() {
        let mut hits = vec![Detection::new(0, 0, 100, 100); 5];
        hits.extend(vec![Detection::new(30, 30, 40, 40); 2]);
        let grouped = group_rectangles(hits, 1, GROUP_EPS);
        assert_eq!(grouped, vec![Detection::new(0, 0, 100, 100)]);
    }

    #[test]
    fn labels_follow_first_appearance() {
        let rects = vec![
            Detection::new(50, 50, 10, 10),
            Detection::new(0, 0, 10, 10),
            Detection::new(50, 51, 10, 10),
        ];
        let (labels, classes) = partition(&rects, GROUP_EPS);
        assert_eq!(classes, 2);
        assert_eq!(labels, vec![0, 1, 0]);
    }
}
