//! `GetNextTask`: rank active, unblocked candidates by priority score and
//! pick the best one, optionally biased by a time budget and skill tags.
//! Candidates are never excluded by skill tags or time budget, only
//! re-ordered or, for time budget, skipped in favor of a task that fits —
//! falling back to the top-ranked task if nothing does.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use kanban_core_db::models::{Task, TaskStatus};
use uuid::Uuid;

use crate::context::context_multiplier;
use crate::cycle::adjacency_by_blocker;
use crate::priority::{FactorContribution, ScoredTask};

#[derive(Debug, Clone, Default)]
pub struct NextTaskFilter {
    pub board_id: Option<Uuid>,
    pub assignee: Option<String>,
    pub skill_tags: Vec<String>,
    pub time_available_minutes: Option<i64>,
    pub exclude_blocked: bool,
}

#[derive(Debug, Clone)]
pub struct NextTaskResult {
    pub task: Task,
    pub reasoning: Vec<FactorContribution>,
    pub unblocks: Vec<Uuid>,
}

/// `tasks`/`edges` should already be scoped to the board in question (or
/// the whole active set, if `filter.board_id` is `None`); `task_tags` maps
/// a task id to its attached tag names, used only for the skill-tag bonus.
pub fn select_next_task(
    tasks: &[Task],
    edges: &[(Uuid, Uuid)],
    task_tags: &HashMap<Uuid, Vec<String>>,
    scores: &[ScoredTask],
    filter: &NextTaskFilter,
) -> Option<NextTaskResult> {
    let tasks_by_id: HashMap<Uuid, &Task> = tasks.iter().map(|t| (t.id, t)).collect();
    let adjacency = adjacency_by_blocker(edges);
    let scores_by_id: HashMap<Uuid, &ScoredTask> = scores.iter().map(|s| (s.task_id, s)).collect();
    let empty_tags: Vec<String> = Vec::new();

    let mut candidates: Vec<&Task> = tasks
        .iter()
        .filter(|t| !matches!(t.status, TaskStatus::Done | TaskStatus::Archived))
        .filter(|t| filter.board_id.map(|b| b == t.board_id).unwrap_or(true))
        .filter(|t| filter.assignee.as_deref().map(|a| t.assignee.as_deref() == Some(a)).unwrap_or(true))
        .filter(|t| !filter.exclude_blocked || !is_blocked(&tasks_by_id, edges, t.id))
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let effective_score = |task: &Task| -> f64 {
        let base = scores_by_id.get(&task.id).map(|s| s.score).unwrap_or(0.0);
        let tags = task_tags.get(&task.id).unwrap_or(&empty_tags);
        base * context_multiplier(tags, &filter.skill_tags)
    };

    candidates.sort_by(|a, b| {
        effective_score(b)
            .partial_cmp(&effective_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| due_date_order(a.due_date, b.due_date))
            .then_with(|| a.updated_at.cmp(&b.updated_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let chosen = pick_within_budget(&candidates, filter.time_available_minutes)?;

    let reasoning = scores_by_id
        .get(&chosen.id)
        .map(|s| top_factors(&s.breakdown, 3))
        .unwrap_or_default();
    let unblocks = adjacency.get(&chosen.id).cloned().unwrap_or_default();

    Some(NextTaskResult { task: chosen.clone(), reasoning, unblocks })
}

fn is_blocked(tasks_by_id: &HashMap<Uuid, &Task>, edges: &[(Uuid, Uuid)], task_id: Uuid) -> bool {
    edges.iter().filter(|(t, _)| *t == task_id).any(|(_, blocker_id)| {
        tasks_by_id
            .get(blocker_id)
            .map(|t| !matches!(t.status, TaskStatus::Done | TaskStatus::Archived))
            .unwrap_or(false)
    })
}

fn due_date_order(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}

/// `candidates` is already ranked best-first. Returns the highest-ranked
/// task that fits `time_available_minutes`, or the top-ranked task if none
/// fits (or no budget was given). A task with no effort estimate is
/// assumed to fit.
fn pick_within_budget<'a>(candidates: &[&'a Task], time_available_minutes: Option<i64>) -> Option<&'a Task> {
    let Some(budget) = time_available_minutes else {
        return candidates.first().copied();
    };
    candidates
        .iter()
        .find(|t| {
            t.estimated_hours
                .map(|hours| (hours * 60.0) <= budget as f64)
                .unwrap_or(true)
        })
        .or_else(|| candidates.first())
        .copied()
}

fn top_factors(breakdown: &[FactorContribution], n: usize) -> Vec<FactorContribution> {
    let mut ranked = breakdown.to_vec();
    ranked.sort_by(|a, b| {
        b.contribution
            .abs()
            .partial_cmp(&a.contribution.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::priority::compute_board_scores;
    use kanban_core_utils::config::PriorityWeights;

    fn task(id: Uuid, status: TaskStatus, priority_int: i64) -> Task {
        let now = Utc::now();
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
            created_at: now,
            updated_at: now,
            archived: false,
        }
    }

    #[test]
    fn picks_highest_scoring_unblocked_candidate() {
        let low = task(Uuid::from_bytes([1; 16]), TaskStatus::Todo, 2);
        let high = task(Uuid::from_bytes([2; 16]), TaskStatus::Todo, 9);
        let tasks = vec![low.clone(), high.clone()];
        let now = Utc::now();
        let scores = compute_board_scores(&tasks, &[], &PriorityWeights::default(), now);
        let filter = NextTaskFilter { exclude_blocked: true, ..Default::default() };
        let result = select_next_task(&tasks, &[], &HashMap::new(), &scores, &filter).unwrap();
        assert_eq!(result.task.id, high.id);
    }

    #[test]
    fn excludes_blocked_tasks_by_default() {
        let blocker = task(Uuid::from_bytes([1; 16]), TaskStatus::Todo, 2);
        let blocked = task(Uuid::from_bytes([2; 16]), TaskStatus::Todo, 9);
        let tasks = vec![blocker.clone(), blocked.clone()];
        let edges = vec![(blocked.id, blocker.id)];
        let now = Utc::now();
        let scores = compute_board_scores(&tasks, &edges, &PriorityWeights::default(), now);
        let filter = NextTaskFilter { exclude_blocked: true, ..Default::default() };
        let result = select_next_task(&tasks, &edges, &HashMap::new(), &scores, &filter).unwrap();
        assert_eq!(result.task.id, blocker.id);
    }

    #[test]
    fn time_budget_skips_tasks_that_dont_fit() {
        let mut quick = task(Uuid::from_bytes([1; 16]), TaskStatus::Todo, 5);
        quick.estimated_hours = Some(0.5);
        let mut slow = task(Uuid::from_bytes([2; 16]), TaskStatus::Todo, 9);
        slow.estimated_hours = Some(8.0);
        let tasks = vec![quick.clone(), slow.clone()];
        let now = Utc::now();
        let scores = compute_board_scores(&tasks, &[], &PriorityWeights::default(), now);
        let filter = NextTaskFilter {
            exclude_blocked: true,
            time_available_minutes: Some(60),
            ..Default::default()
        };
        let result = select_next_task(&tasks, &[], &HashMap::new(), &scores, &filter).unwrap();
        assert_eq!(result.task.id, quick.id);
    }
}
