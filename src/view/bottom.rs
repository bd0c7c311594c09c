// Bottom-N repository view.
// Sorts a cached repo list by one field and projects the smallest entries as [name, value] pairs.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::ser::{Serialize, SerializeTuple, Serializer};

use crate::error::{CacheError, Result};
use crate::github::Repo;

/// Repository field a view is sorted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Stars,
    Forks,
    OpenIssues,
    LastUpdated,
}

impl SortField {
    /// URL segment for this field.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Stars => "stars",
            SortField::Forks => "forks",
            SortField::OpenIssues => "open_issues",
            SortField::LastUpdated => "last_updated",
        }
    }

    fn value(&self, repo: &Repo) -> FieldValue {
        match self {
            SortField::Stars => FieldValue::Count(repo.stargazers_count),
            SortField::Forks => FieldValue::Count(repo.forks_count),
            SortField::OpenIssues => FieldValue::Count(repo.open_issues_count),
            SortField::LastUpdated => FieldValue::Timestamp(repo.updated_at.clone()),
        }
    }

    fn compare(&self, a: &Repo, b: &Repo) -> Ordering {
        match self {
            SortField::Stars => a.stargazers_count.cmp(&b.stargazers_count),
            SortField::Forks => a.forks_count.cmp(&b.forks_count),
            SortField::OpenIssues => a.open_issues_count.cmp(&b.open_issues_count),
            // ISO-8601 strings sort chronologically.
            SortField::LastUpdated => a.updated_at.cmp(&b.updated_at),
        }
    }
}

impl FromStr for SortField {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stars" => Ok(SortField::Stars),
            "forks" => Ok(SortField::Forks),
            "open_issues" => Ok(SortField::OpenIssues),
            "last_updated" => Ok(SortField::LastUpdated),
            other => Err(CacheError::InvalidSortField(other.to_string())),
        }
    }
}

/// How names compare when two repos tie on the sort field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    CaseInsensitive,
    CaseSensitive,
}

impl TieBreak {
    fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            TieBreak::CaseInsensitive => a.to_lowercase().cmp(&b.to_lowercase()),
            TieBreak::CaseSensitive => a.cmp(b),
        }
    }
}

/// Value of the sorted field as it appears in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Count(u64),
    Timestamp(String),
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Count(n) => serializer.serialize_u64(*n),
            FieldValue::Timestamp(s) => serializer.serialize_str(s),
        }
    }
}

/// One output row. Always serializes as a two-element array `[name, value]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoPair {
    pub name: String,
    pub value: FieldValue,
}

impl Serialize for RepoPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.name)?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}

/// Sort in place, descending by `field`, ties ascending by name.
pub fn sort_repos(repos: &mut [Repo], field: SortField, tie_break: TieBreak) {
    repos.sort_by(|a, b| {
        field
            .compare(b, a)
            .then_with(|| tie_break.compare(&a.full_name, &b.full_name))
    });
}

/// The `n` repos with the smallest `field`, as a JSON array of `[name, value]` pairs.
///
/// Rows keep descending order. Negative `n` yields `[]`; `n` past the end yields every repo.
pub fn bottom_n(repos_json: &[u8], field: SortField, n: i64) -> Result<Vec<u8>> {
    bottom_n_with(repos_json, field, n, TieBreak::default())
}

pub fn bottom_n_with(
    repos_json: &[u8],
    field: SortField,
    n: i64,
    tie_break: TieBreak,
) -> Result<Vec<u8>> {
    let mut repos: Vec<Repo> = serde_json::from_slice(repos_json)?;
    sort_repos(&mut repos, field, tie_break);

    let n = usize::try_from(n.max(0)).unwrap_or(usize::MAX).min(repos.len());
    let pairs: Vec<RepoPair> = repos[repos.len() - n..]
        .iter()
        .map(|repo| RepoPair {
            name: repo.full_name.clone(),
            value: field.value(repo),
        })
        .collect();

    Ok(serde_json::to_vec(&pairs)?)
}
