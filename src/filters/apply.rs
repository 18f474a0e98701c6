use std::ops::RangeInclusive;
use std::sync::Arc;

use super::criteria::FilterCriteria;
use crate::models::Session;

/// Keep the sessions matching every present criterion
pub fn apply_filters<'a, I>(sessions: I, criteria: &FilterCriteria) -> Vec<&'a Arc<Session>>
where
    I: IntoIterator<Item = &'a Arc<Session>>,
{
    sessions.into_iter().filter(|session| matches(session, criteria)).collect()
}

/// Evaluate all criteria against one session (logical AND)
pub fn matches(session: &Session, criteria: &FilterCriteria) -> bool {
    in_range(&criteria.message_count_range, session.message_count as u64)
        && in_range(&criteria.token_count_range, session.total_token_count)
        && in_range(&criteria.input_token_range, session.total_input_tokens)
        && in_range(&criteria.output_token_range, session.total_output_tokens)
        && match_date(session, criteria)
        && match_branch(session, criteria)
        && match_roles(session, criteria)
        && match_block_kinds(session, criteria)
        && match_project(session, criteria)
}

/// An inverted range (start > end) is empty and contains nothing
fn in_range(range: &Option<RangeInclusive<u64>>, value: u64) -> bool {
    range.as_ref().is_none_or(|range| range.contains(&value))
}

fn match_date(session: &Session, criteria: &FilterCriteria) -> bool {
    criteria.date_range.is_none_or(|window| window.contains(session.start_time.date_naive()))
}

fn match_branch(session: &Session, criteria: &FilterCriteria) -> bool {
    match &criteria.git_branch {
        None => true,
        Some(branch) => session.git_branch.as_deref().is_some_and(|name| branch.matches(name)),
    }
}

fn match_roles(session: &Session, criteria: &FilterCriteria) -> bool {
    criteria
        .sender_roles
        .as_ref()
        .is_none_or(|allowed| allowed.iter().any(|role| session.roles.contains(role)))
}

fn match_block_kinds(session: &Session, criteria: &FilterCriteria) -> bool {
    criteria
        .block_kinds
        .as_ref()
        .is_none_or(|allowed| allowed.iter().any(|kind| session.block_kinds.contains(kind)))
}

/// Case-insensitive substring match on the project path; `~` expands to home
fn match_project(session: &Session, criteria: &FilterCriteria) -> bool {
    let Some(needle) = &criteria.project else {
        return true;
    };
    let Some(project_path) = &session.project_path else {
        return false;
    };

    let lower_needle = needle.to_lowercase();
    let search = match (lower_needle.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => format!("{}{}", home.to_string_lossy().to_lowercase(), rest),
        _ => lower_needle,
    };
    project_path.to_lowercase().contains(&search)
}
