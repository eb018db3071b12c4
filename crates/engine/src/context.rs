//! The context factor is request-scoped, not persisted: `GetNextTask` can
//! bias ranking toward tasks matching the caller's declared skill tags,
//! but a board-wide priority recompute has no such context to apply, so it
//! always scores this factor at 0 (see `priority::compute_board_scores`).

/// Multiplier applied to a candidate's score during `next_task` ranking:
/// 1.0 for no match, >1.0 when its tags intersect the requested skill
/// tags. Never drops below 1.0 — it only nudges ranking among matches, it
/// never excludes a non-matching candidate.
pub fn context_multiplier(candidate_tags: &[String], skill_tags: &[String]) -> f64 {
    if skill_tags.is_empty() {
        return 1.0;
    }
    let intersects = candidate_tags
        .iter()
        .any(|tag| skill_tags.iter().any(|skill| skill.eq_ignore_ascii_case(tag)));
    if intersects {
        1.15
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_skill_tags_means_no_bonus() {
        assert_eq!(context_multiplier(&["rust".to_string()], &[]), 1.0);
    }

    #[test]
    fn intersecting_tag_gets_bonus_case_insensitively() {
        let candidate = vec!["Rust".to_string(), "backend".to_string()];
        let skill = vec!["rust".to_string()];
        assert_eq!(context_multiplier(&candidate, &skill), 1.15);
    }

    #[test]
    fn disjoint_tags_get_no_bonus() {
        let candidate = vec!["frontend".to_string()];
        let skill = vec!["rust".to_string()];
        assert_eq!(context_multiplier(&candidate, &skill), 1.0);
    }
}
