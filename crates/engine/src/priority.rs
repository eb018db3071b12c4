//! Per-board priority scoring: `score = 100 * sum(factor_i * weight_i) /
//! sum(weight_i)`. Recomputed in one pass per board, in topological order
//! over the `blocks` graph so a task's dependency factor only depends on
//! counts already available (the full edge list is loaded once, not
//! walked per task). Archived and done tasks are excluded from the scored
//! set but stay in the edge list so they still count toward blockers'
//! dependency factors.

use chrono::{DateTime, Utc};
use kanban_core_db::models::{Task, TaskStatus};
use kanban_core_utils::Priority;
use uuid::Uuid;

use crate::cycle::{adjacency_by_blocker, block_counts, longest_path_from};

const DIRECT_SUB_WEIGHT: f64 = 0.5;
const TRANSITIVE_SUB_WEIGHT: f64 = 0.3;
const CRITICAL_PATH_SUB_WEIGHT: f64 = 0.2;

/// One factor's contribution to a task's score, surfaced verbatim as the
/// "reasoning" returned alongside `GetNextTask`'s pick.
#[derive(Debug, Clone)]
pub struct FactorContribution {
    pub factor: &'static str,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredTask {
    pub task_id: Uuid,
    pub score: f64,
    pub breakdown: Vec<FactorContribution>,
}

/// Recomputes every active (non-done, non-archived) task's priority score
/// for a board. `edges` is the board's `blocks` subgraph as `(task_id,
/// depends_on_task_id)` pairs; `context_factor` is 0 here since a
/// persisted recompute has no per-request skill context — `next_task`
/// applies a transient bonus on top of these scores instead.
pub fn compute_board_scores(
    tasks: &[Task],
    edges: &[(Uuid, Uuid)],
    weights: &kanban_core_utils::config::PriorityWeights,
    now: DateTime<Utc>,
) -> Vec<ScoredTask> {
    let adjacency = adjacency_by_blocker(edges);

    let raw_dependency: Vec<(Uuid, f64)> = tasks
        .iter()
        .map(|t| {
            let (direct, transitive) = block_counts(&adjacency, t.id);
            let path = longest_path_from(&adjacency, t.id);
            let raw = direct as f64 * DIRECT_SUB_WEIGHT
                + transitive as f64 * TRANSITIVE_SUB_WEIGHT
                + path as f64 * CRITICAL_PATH_SUB_WEIGHT;
            (t.id, raw)
        })
        .collect();
    let max_raw_dependency = raw_dependency
        .iter()
        .map(|(_, raw)| *raw)
        .fold(0.0_f64, f64::max);

    tasks
        .iter()
        .filter(|t| !matches!(t.status, TaskStatus::Done | TaskStatus::Archived))
        .map(|task| {
            let age = age_factor(task, now, weights.stale_threshold_days);
            let dependency_raw = raw_dependency
                .iter()
                .find(|(id, _)| *id == task.id)
                .map(|(_, raw)| *raw)
                .unwrap_or(0.0);
            let dependency = if max_raw_dependency > 0.0 {
                dependency_raw / max_raw_dependency
            } else {
                0.0
            };
            let deadline = deadline_factor(task, now);
            let manual = Priority::from_int(task.priority_int as i32).manual_factor();
            let context = 0.0;

            let breakdown = vec![
                FactorContribution {
                    factor: "age",
                    value: age,
                    weight: weights.age,
                    contribution: age * weights.age,
                },
                FactorContribution {
                    factor: "dependency",
                    value: dependency,
                    weight: weights.dependency,
                    contribution: dependency * weights.dependency,
                },
                FactorContribution {
                    factor: "deadline",
                    value: deadline,
                    weight: weights.deadline,
                    contribution: deadline * weights.deadline,
                },
                FactorContribution {
                    factor: "manual",
                    value: manual,
                    weight: weights.manual,
                    contribution: manual * weights.manual,
                },
                FactorContribution {
                    factor: "context",
                    value: context,
                    weight: weights.context,
                    contribution: context * weights.context,
                },
            ];

            let weighted_sum: f64 = breakdown.iter().map(|f| f.contribution).sum();
            let total_weight = weights.total();
            let score = if total_weight > 0.0 {
                100.0 * weighted_sum / total_weight
            } else {
                0.0
            };

            ScoredTask { task_id: task.id, score, breakdown }
        })
        .collect()
}

fn age_factor(task: &Task, now: DateTime<Utc>, stale_threshold_days: f64) -> f64 {
    if stale_threshold_days <= 0.0 {
        return 1.0;
    }
    let age_days = (now - task.created_at).num_seconds() as f64 / 86400.0;
    (age_days / stale_threshold_days).clamp(0.0, 1.0)
}

/// Overdue -> 1.0. Due within a day -> 0.9. Due within a week -> linearly
/// decreasing from 0.9 down to 0.3. Beyond that, or no due date -> 0.
fn deadline_factor(task: &Task, now: DateTime<Utc>) -> f64 {
    let Some(due_date) = task.due_date else {
        return 0.0;
    };
    let days_until = (due_date - now).num_seconds() as f64 / 86400.0;
    if days_until < 0.0 {
        1.0
    } else if days_until <= 1.0 {
        0.9
    } else if days_until <= 7.0 {
        0.9 - (days_until - 1.0) / 6.0 * 0.6
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kanban_core_utils::config::PriorityWeights;
    use uuid::Uuid;

    fn task(id: Uuid, status: TaskStatus, priority_int: i64, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            board_id: Uuid::new_v4(),
            column_id: Uuid::new_v4(),
            parent_task_id: None,
            title: "t".to_string(),
            description: None,
            status,
            priority_int,
            priority_score: 0.0,
            due_date: None,
            assignee: None,
            estimated_hours: None,
            position: 0,
            created_at,
            updated_at: created_at,
            archived: false,
        }
    }

    #[test]
    fn done_and_archived_tasks_are_excluded_from_scoring() {
        let now = Utc::now();
        let t1 = task(Uuid::from_bytes([1; 16]), TaskStatus::Done, 5, now);
        let t2 = task(Uuid::from_bytes([2; 16]), TaskStatus::Todo, 5, now);
        let scores = compute_board_scores(&[t1, t2.clone()], &[], &PriorityWeights::default(), now);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].task_id, t2.id);
    }

    #[test]
    fn blocking_more_tasks_raises_dependency_factor() {
        let now = Utc::now();
        let blocker = task(Uuid::from_bytes([1; 16]), TaskStatus::Todo, 5, now);
        let blocked = task(Uuid::from_bytes([2; 16]), TaskStatus::Todo, 5, now);
        let lone = task(Uuid::from_bytes([3; 16]), TaskStatus::Todo, 5, now);
        let edges = vec![(blocked.id, blocker.id)];
        let scores = compute_board_scores(
            &[blocker.clone(), blocked, lone.clone()],
            &edges,
            &PriorityWeights::default(),
            now,
        );
        let blocker_score = scores.iter().find(|s| s.task_id == blocker.id).unwrap();
        let lone_score = scores.iter().find(|s| s.task_id == lone.id).unwrap();
        assert!(blocker_score.score > lone_score.score);
    }

    #[test]
    fn overdue_task_gets_maximum_deadline_factor() {
        let now = Utc::now();
        let mut overdue = task(Uuid::from_bytes([1; 16]), TaskStatus::Todo, 5, now - Duration::days(10));
        overdue.due_date = Some(now - Duration::days(1));
        let scores = compute_board_scores(&[overdue.clone()], &[], &PriorityWeights::default(), now);
        let deadline = scores[0].breakdown.iter().find(|f| f.factor == "deadline").unwrap();
        assert_eq!(deadline.value, 1.0);
    }
}
