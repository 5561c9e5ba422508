//! Filter and sort requests over stored tenders.
//!
//! Every sortable or filterable field is a closed enum variant mapped to a
//! fixed column expression. User-supplied values only ever travel as bound
//! parameters.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use procura_core::TenderStatus;
use thiserror::Error;

use crate::row::column_timestamp;

#[derive(Debug, Error)]
#[error("unknown {kind} {value:?}, expected one of: {expected}")]
pub struct ParseQueryError {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// Sort keys accepted by [`TenderQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    Value,
    #[default]
    DateModified,
    Title,
    StartDate,
    EndDate,
    Complexity,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Value => "value",
            Self::DateModified => "dateModified",
            Self::Title => "title",
            Self::StartDate => "startDate",
            Self::EndDate => "endDate",
            Self::Complexity => "complexity",
        }
    }

    fn expression(&self) -> &'static str {
        match self {
            Self::Value => "amount",
            Self::DateModified => "release_date",
            Self::Title => "lower(title)",
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
            Self::Complexity => "complexity",
        }
    }
}

impl FromStr for SortKey {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "value" => Ok(Self::Value),
            "dateModified" => Ok(Self::DateModified),
            "title" => Ok(Self::Title),
            "startDate" => Ok(Self::StartDate),
            "endDate" => Ok(Self::EndDate),
            "complexity" => Ok(Self::Complexity),
            other => Err(ParseQueryError {
                kind: "sort key",
                value: other.to_string(),
                expected: "value, dateModified, title, startDate, endDate, complexity",
            }),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the tender period start must be present or absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasDate {
    Yes,
    No,
}

impl FromStr for HasDate {
    type Err = ParseQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Self::Yes),
            "no" => Ok(Self::No),
            other => Err(ParseQueryError {
                kind: "has-date filter",
                value: other.to_string(),
                expected: "yes, no",
            }),
        }
    }
}

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Text(String),
    Double(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TenderQuery {
    /// Case-insensitive substring of title or external id.
    pub search: Option<String>,
    pub status: Option<TenderStatus>,
    /// Strictly greater than.
    pub min_value: Option<f64>,
    /// Tender period contains this instant.
    pub active_at: Option<DateTime<Utc>>,
    pub has_date: Option<HasDate>,
    pub sort: SortKey,
    pub descending: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for TenderQuery {
    fn default() -> Self {
        Self {
            search: None,
            status: None,
            min_value: None,
            active_at: None,
            has_date: None,
            sort: SortKey::default(),
            descending: true,
            limit: 50,
            offset: 0,
        }
    }
}

impl TenderQuery {
    /// `WHERE` clause (empty when unfiltered) and its parameters, in order.
    pub fn where_clause(&self) -> (String, Vec<Param>) {
        let mut preds: Vec<&'static str> = Vec::new();
        let mut params = Vec::new();

        if let Some(term) = self.search.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let term = term.to_lowercase();
            preds.push("(contains(lower(title), ?) OR contains(lower(external_id), ?))");
            params.push(Param::Text(term.clone()));
            params.push(Param::Text(term));
        }
        if let Some(status) = self.status {
            preds.push("status = ?");
            params.push(Param::Text(status.as_str().to_string()));
        }
        if let Some(min) = self.min_value {
            preds.push("amount > ?");
            params.push(Param::Double(min));
        }
        if let Some(at) = self.active_at {
            let at = column_timestamp(at);
            preds.push("start_date <= ? AND end_date >= ?");
            params.push(Param::Text(at.clone()));
            params.push(Param::Text(at));
        }
        match self.has_date {
            Some(HasDate::Yes) => preds.push("start_date IS NOT NULL"),
            Some(HasDate::No) => preds.push("start_date IS NULL"),
            None => {}
        }

        if preds.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", preds.join(" AND ")), params)
        }
    }

    /// `ORDER BY ... LIMIT ... OFFSET ...` tail. Ties break on external id.
    pub fn order_clause(&self) -> String {
        let dir = if self.descending { "DESC" } else { "ASC" };
        format!(
            " ORDER BY {} {dir} NULLS LAST, external_id ASC LIMIT {} OFFSET {}",
            self.sort.expression(),
            self.limit,
            self.offset
        )
    }
}
