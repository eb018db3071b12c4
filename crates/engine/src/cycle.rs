//! Pure graph algorithms over the `blocks` subgraph. A `task_dependencies`
//! row `(task_id, depends_on_task_id, 'blocks')` means `depends_on_task_id`
//! blocks `task_id`, i.e. the graph edge runs blocker -> blocked. These
//! functions take the edge list already loaded by
//! `kanban_core_db::models::Dependency::blocks_edges_for_board` so the
//! service layer controls when a round trip happens.

use std::collections::{HashMap, HashSet, VecDeque};

use uuid::Uuid;

/// Adjacency list keyed by blocker, so `adjacency[&blocker]` is every task
/// that blocker directly blocks.
pub fn adjacency_by_blocker(edges: &[(Uuid, Uuid)]) -> HashMap<Uuid, Vec<Uuid>> {
    let mut adjacency: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for &(task_id, depends_on_task_id) in edges {
        adjacency.entry(depends_on_task_id).or_default().push(task_id);
    }
    adjacency
}

/// Whether adding a `depends_on -> task` blocking edge (i.e. `depends_on`
/// blocks `task`) would close a cycle, given the edges already present.
/// True iff `task` can already reach `depends_on` by following existing
/// blocker -> blocked edges forward from `task`.
pub fn would_cycle(adjacency: &HashMap<Uuid, Vec<Uuid>>, task: Uuid, depends_on: Uuid) -> bool {
    if task == depends_on {
        return true;
    }
    reachable_set(adjacency, task).contains(&depends_on)
}

/// Every task reachable from `start` by following blocker -> blocked edges,
/// not including `start` itself.
pub fn reachable_set(adjacency: &HashMap<Uuid, Vec<Uuid>>, start: Uuid) -> HashSet<Uuid> {
    let mut visited = HashSet::new();
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        if let Some(children) = adjacency.get(&node) {
            for &child in children {
                if visited.insert(child) {
                    stack.push(child);
                }
            }
        }
    }
    visited
}

/// Longest path, by edge count, starting at `start` and following
/// blocker -> blocked edges forward. Used as the critical-path-length
/// component of the priority score: how many tasks transitively wait on
/// this one finishing, along the longest such chain.
pub fn longest_path_from(adjacency: &HashMap<Uuid, Vec<Uuid>>, start: Uuid) -> u32 {
    let mut memo: HashMap<Uuid, u32> = HashMap::new();
    longest_path_rec(adjacency, start, &mut memo, &mut HashSet::new())
}

fn longest_path_rec(
    adjacency: &HashMap<Uuid, Vec<Uuid>>,
    node: Uuid,
    memo: &mut HashMap<Uuid, u32>,
    visiting: &mut HashSet<Uuid>,
) -> u32 {
    if let Some(&cached) = memo.get(&node) {
        return cached;
    }
    // The blocks graph is acyclic by construction (would_cycle rejects
    // edges that would close one), but guard against a stale edge list
    // rather than recursing forever.
    if !visiting.insert(node) {
        return 0;
    }
    let best = adjacency
        .get(&node)
        .map(|children| {
            children
                .iter()
                .map(|&child| 1 + longest_path_rec(adjacency, child, memo, visiting))
                .max()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    visiting.remove(&node);
    memo.insert(node, best);
    best
}

/// Direct + transitive block counts for `task`: how many tasks `task`
/// directly blocks, and how many it transitively blocks overall (the size
/// of its full reachable set).
pub fn block_counts(adjacency: &HashMap<Uuid, Vec<Uuid>>, task: Uuid) -> (u32, u32) {
    let direct = adjacency.get(&task).map(|c| c.len()).unwrap_or(0) as u32;
    let transitive = reachable_set(adjacency, task).len() as u32;
    (direct, transitive)
}

/// Breadth-first topological order over the full node set (both ends of
/// every edge), blockers before the tasks they block. Nodes with no
/// incident edges are appended in their input order. Used by the priority
/// recompute pass so each task's dependency factor can be computed only
/// after every task that blocks it has already been visited.
pub fn topological_order(edges: &[(Uuid, Uuid)], all_tasks: &[Uuid]) -> Vec<Uuid> {
    let adjacency = adjacency_by_blocker(edges);
    let mut in_degree: HashMap<Uuid, u32> = all_tasks.iter().map(|&t| (t, 0)).collect();
    for &(task_id, _) in edges {
        *in_degree.entry(task_id).or_insert(0) += 1;
    }

    let mut queue: VecDeque<Uuid> = all_tasks
        .iter()
        .copied()
        .filter(|t| in_degree.get(t).copied().unwrap_or(0) == 0)
        .collect();
    let mut order = Vec::with_capacity(all_tasks.len());
    let mut seen = HashSet::new();

    while let Some(node) = queue.pop_front() {
        if !seen.insert(node) {
            continue;
        }
        order.push(node);
        if let Some(children) = adjacency.get(&node) {
            for &child in children {
                if let Some(degree) = in_degree.get_mut(&child) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }
    // A stale edge list could leave a cycle unresolved; append any
    // remaining tasks so every task still gets scored.
    for &task in all_tasks {
        if !seen.contains(&task) {
            order.push(task);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uuid(n: u8) -> Uuid {
        Uuid::from_bytes([n; 16])
    }

    #[test]
    fn three_task_cycle_is_detected() {
        // T1 blocks T2, T2 blocks T3: edges (task, depends_on) = (T2, T1), (T3, T2).
        let (t1, t2, t3) = (uuid(1), uuid(2), uuid(3));
        let edges = vec![(t2, t1), (t3, t2)];
        let adjacency = adjacency_by_blocker(&edges);
        // Adding "T1 depends on T3" (T3 blocks T1) would close the loop.
        assert!(would_cycle(&adjacency, t1, t3));
        // But T1 blocking some unrelated task is fine.
        assert!(!would_cycle(&adjacency, uuid(9), t1));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let adjacency = adjacency_by_blocker(&[]);
        let t = uuid(1);
        assert!(would_cycle(&adjacency, t, t));
    }

    #[test]
    fn longest_path_counts_edges_not_nodes() {
        let (a, b, c) = (uuid(1), uuid(2), uuid(3));
        // a blocks b, b blocks c: chain of length 2 edges from a.
        let edges = vec![(b, a), (c, b)];
        let adjacency = adjacency_by_blocker(&edges);
        assert_eq!(longest_path_from(&adjacency, a), 2);
        assert_eq!(longest_path_from(&adjacency, b), 1);
        assert_eq!(longest_path_from(&adjacency, c), 0);
    }

    #[test]
    fn block_counts_distinguish_direct_from_transitive() {
        let (a, b, c) = (uuid(1), uuid(2), uuid(3));
        let edges = vec![(b, a), (c, b)];
        let adjacency = adjacency_by_blocker(&edges);
        let (direct, transitive) = block_counts(&adjacency, a);
        assert_eq!(direct, 1);
        assert_eq!(transitive, 2);
    }

    #[test]
    fn topological_order_respects_blocking_edges() {
        let (a, b, c) = (uuid(1), uuid(2), uuid(3));
        let edges = vec![(b, a), (c, b)];
        let order = topological_order(&edges, &[c, b, a]);
        let pos = |t: Uuid| order.iter().position(|&x| x == t).unwrap();
        assert!(pos(a) < pos(b));
        assert!(pos(b) < pos(c));
    }
}
