//! Hop-count traversal helpers over undirected adjacency lists.
//!
//! All functions take adjacency lists indexed by node position (as produced
//! by [`GraphSnapshot::adjacency`](crate::graph::snapshot::GraphSnapshot::adjacency)).

use std::collections::VecDeque;

/// Marker for nodes not reached by a BFS.
pub const UNREACHABLE: u32 = u32::MAX;

/// Single-source BFS hop distances. Unreached nodes hold [`UNREACHABLE`].
pub fn bfs_distances(adj: &[Vec<usize>], source: usize) -> Vec<u32> {
    let mut dist = vec![UNREACHABLE; adj.len()];
    dist[source] = 0;
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let next = dist[v] + 1;
        for &w in &adj[v] {
            if dist[w] == UNREACHABLE {
                dist[w] = next;
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Connected components, each sorted, largest first (ties by first member).
pub fn connected_components(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut component = vec![usize::MAX; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if component[start] != usize::MAX {
            continue;
        }
        let id = components.len();
        let mut members = vec![start];
        component[start] = id;
        let mut queue = VecDeque::from([start]);
        while let Some(v) = queue.pop_front() {
            for &w in &adj[v] {
                if component[w] == usize::MAX {
                    component[w] = id;
                    members.push(w);
                    queue.push_back(w);
                }
            }
        }
        members.sort_unstable();
        components.push(members);
    }

    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));
    components
}

/// Bridges and articulation points of an undirected simple graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CutStructure {
    /// Edges whose removal disconnects their component, as `(min, max)`.
    pub bridges: Vec<(usize, usize)>,
    /// Nodes whose removal disconnects their component.
    pub articulation_points: Vec<usize>,
}

/// Find bridges and articulation points with Tarjan's lowlink method.
///
/// Iterative so that long chains in large snapshots cannot overflow the
/// stack. Assumes no parallel edges (the topology graph aggregates them).
pub fn cut_structure(adj: &[Vec<usize>]) -> CutStructure {
    let n = adj.len();
    let mut disc = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut is_articulation = vec![false; n];
    let mut bridges = Vec::new();
    let mut timer = 0usize;

    for root in 0..n {
        if disc[root] != usize::MAX {
            continue;
        }
        disc[root] = timer;
        low[root] = timer;
        timer += 1;
        let mut root_children = 0usize;
        // (node, parent, next neighbor position)
        let mut stack: Vec<(usize, usize, usize)> = vec![(root, usize::MAX, 0)];

        while let Some(frame) = stack.last_mut() {
            let (v, parent, pos) = *frame;
            if pos < adj[v].len() {
                frame.2 += 1;
                let w = adj[v][pos];
                if w == parent {
                    continue;
                }
                if disc[w] == usize::MAX {
                    disc[w] = timer;
                    low[w] = timer;
                    timer += 1;
                    if v == root {
                        root_children += 1;
                    }
                    stack.push((w, v, 0));
                } else {
                    low[v] = low[v].min(disc[w]);
                }
            } else {
                stack.pop();
                if parent != usize::MAX {
                    low[parent] = low[parent].min(low[v]);
                    if low[v] > disc[parent] {
                        bridges.push((parent.min(v), parent.max(v)));
                    }
                    if parent != root && low[v] >= disc[parent] {
                        is_articulation[parent] = true;
                    }
                }
            }
        }

        if root_children > 1 {
            is_articulation[root] = true;
        }
    }

    bridges.sort_unstable();
    CutStructure {
        bridges,
        articulation_points: (0..n).filter(|&v| is_articulation[v]).collect(),
    }
}
