use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use chrono::NaiveDate;

use crate::models::{BlockKind, SenderRole};

/// Inclusive calendar-date window; either bound may be open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }

    /// `from > to` matches no date
    pub fn is_empty(&self) -> bool {
        matches!((self.from, self.to), (Some(from), Some(to)) if from > to)
    }
}

/// How a session's git branch is compared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchMatch {
    /// Whole name, case-sensitive
    Exact(String),
    /// Leading part of the name, case-sensitive
    Prefix(String),
    /// Substring anywhere in the name, case-insensitive
    Contains(String),
}

impl BranchMatch {
    pub fn matches(&self, branch: &str) -> bool {
        match self {
            BranchMatch::Exact(name) => branch == name,
            BranchMatch::Prefix(prefix) => branch.starts_with(prefix.as_str()),
            BranchMatch::Contains(needle) => branch.to_lowercase().contains(&needle.to_lowercase()),
        }
    }
}

/// Immutable set of session constraints, combined with AND.
///
/// `None` leaves a dimension unconstrained. A present but empty constraint
/// (an empty set, a range whose start exceeds its end, an inverted date
/// window) matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub message_count_range: Option<RangeInclusive<u64>>,
    pub token_count_range: Option<RangeInclusive<u64>>,
    pub input_token_range: Option<RangeInclusive<u64>>,
    pub output_token_range: Option<RangeInclusive<u64>>,
    /// Tested against the UTC calendar date of the session's start time
    pub date_range: Option<DateWindow>,
    /// Sessions without a branch never match
    pub git_branch: Option<BranchMatch>,
    /// Matches when any message has one of these roles
    pub sender_roles: Option<BTreeSet<SenderRole>>,
    /// Matches when any message has a block of one of these kinds
    pub block_kinds: Option<BTreeSet<BlockKind>>,
    /// Case-insensitive substring of the project path
    pub project: Option<String>,
}

impl FilterCriteria {
    /// Criteria that match every session
    pub fn any() -> Self {
        Self::default()
    }

    pub fn is_unconstrained(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_message_count(mut self, range: RangeInclusive<u64>) -> Self {
        self.message_count_range = Some(range);
        self
    }

    pub fn with_token_count(mut self, range: RangeInclusive<u64>) -> Self {
        self.token_count_range = Some(range);
        self
    }

    pub fn with_input_tokens(mut self, range: RangeInclusive<u64>) -> Self {
        self.input_token_range = Some(range);
        self
    }

    pub fn with_output_tokens(mut self, range: RangeInclusive<u64>) -> Self {
        self.output_token_range = Some(range);
        self
    }

    pub fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.date_range = Some(DateWindow::new(from, to));
        self
    }

    pub fn with_branch(mut self, branch: BranchMatch) -> Self {
        self.git_branch = Some(branch);
        self
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = SenderRole>) -> Self {
        self.sender_roles = Some(roles.into_iter().collect());
        self
    }

    pub fn with_block_kinds(mut self, kinds: impl IntoIterator<Item = BlockKind>) -> Self {
        self.block_kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }
}
