//! Region merging.
//!
//! Cells form an adjacency graph through their neighbor id lists. A
//! breadth-first walk from each unvisited cell grows a merge group,
//! stepping to a neighbor only when it is compatible with the cell it was
//! reached from. Compatibility is checked per edge and never against the
//! group's origin, so long chains of gradually drifting cells still end up
//! in one group.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use safezone_area_models::Area;
use serde::Deserialize;

use crate::combine::combine;

/// Merge predicate parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MergerConfig {
    /// Largest safety score difference between two mergeable cells.
    pub max_score_delta: f64,
}

impl Default for MergerConfig {
    fn default() -> Self {
        Self {
            max_score_delta: 12.0,
        }
    }
}

/// Returns `true` if two adjacent cells may join the same group.
#[must_use]
pub fn compatible(a: &Area, b: &Area, config: &MergerConfig) -> bool {
    if (a.safety_score - b.safety_score).abs() > config.max_score_delta {
        return false;
    }
    if a.area_type != b.area_type {
        return false;
    }
    match (&a.score_result, &b.score_result) {
        (None, None) => true,
        (Some(x), Some(y)) => x.alert_level == y.alert_level,
        _ => false,
    }
}

/// Undirected adjacency built from every cell's neighbor ids.
///
/// Unknown ids and self references are ignored.
fn adjacency(cells: &[Area]) -> Vec<Vec<usize>> {
    let index: HashMap<&str, usize> = cells
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let mut edges = vec![Vec::new(); cells.len()];
    for (i, cell) in cells.iter().enumerate() {
        for &j in cell.neighbors.iter().filter_map(|id| index.get(id.as_str())) {
            if i == j {
                continue;
            }
            if !edges[i].contains(&j) {
                edges[i].push(j);
            }
            if !edges[j].contains(&i) {
                edges[j].push(i);
            }
        }
    }
    edges
}

/// Partitions cells into merge groups of indices, in traversal order.
///
/// Groups are ordered by their first cell's position in `cells`.
#[must_use]
pub fn merge_groups(cells: &[Area], config: &MergerConfig) -> Vec<Vec<usize>> {
    let edges = adjacency(cells);
    let mut visited = vec![false; cells.len()];
    let mut groups = Vec::new();

    for start in 0..cells.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;

        let mut group = vec![start];
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for &next in &edges[current] {
                if !visited[next] && compatible(&cells[current], &cells[next], config) {
                    visited[next] = true;
                    group.push(next);
                    queue.push_back(next);
                }
            }
        }

        groups.push(group);
    }

    groups
}

/// Merges compatible adjacent cells.
///
/// Singleton groups pass through unchanged; larger groups are replaced by
/// one combined area. A group whose cells have no usable outline keeps its
/// cells as they are.
#[must_use]
pub fn merge_cells(cells: Vec<Area>, config: &MergerConfig, now: DateTime<Utc>) -> Vec<Area> {
    let groups = merge_groups(&cells, config);
    let merged = groups.iter().filter(|g| g.len() > 1).count();
    log::debug!(
        "{} cells formed {} groups ({merged} merged)",
        cells.len(),
        groups.len()
    );

    let mut slots: Vec<Option<Area>> = cells.into_iter().map(Some).collect();
    let mut areas = Vec::with_capacity(groups.len());

    for group in groups {
        if let [single] = group.as_slice() {
            if let Some(area) = slots[*single].take() {
                areas.push(area);
            }
            continue;
        }

        let combined = {
            let members: Vec<&Area> = group.iter().filter_map(|&i| slots[i].as_ref()).collect();
            combine(&members, now)
        };
        match combined {
            Some(area) => areas.push(area),
            None => areas.extend(group.iter().filter_map(|&i| slots[i].take())),
        }
    }

    areas
}
