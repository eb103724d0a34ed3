//! List students query
//!
//! Every filter is optional. Sorting accepts `name`, `subject` or `grade` in
//! either direction; the subject filter must name a catalogue course.

use roster_common::types::Course;
use serde::{Deserialize, Serialize};

use crate::api::response::PaginationMeta;
use crate::error::AppError;
use crate::features::shared::PaginationParams;
use crate::store::{
    sorted_by, with_name, with_subject, QueryPage, SortColumn, SortOrder, StoreError,
    StudentQuery, StudentStore,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListStudentsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub name: Option<String>,
    pub subject: Option<String>,
}

/// One page of results and where it sits in the full result set.
#[derive(Debug, Clone)]
pub struct StudentPage {
    pub page: QueryPage,
    pub meta: PaginationMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum ListStudentsError {
    #[error("Invalid sort column '{0}', expected one of: name, subject, grade")]
    InvalidSortColumn(String),

    #[error("Invalid sort order '{0}', expected asc or desc")]
    InvalidSortOrder(String),

    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<ListStudentsError> for AppError {
    fn from(err: ListStudentsError) -> Self {
        match err {
            ListStudentsError::Store(e) => e.into(),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

pub fn parse_sort_column(raw: &str) -> Result<SortColumn, ListStudentsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "name" => Ok(SortColumn::Name),
        "subject" => Ok(SortColumn::Subject),
        "grade" => Ok(SortColumn::Grade),
        _ => Err(ListStudentsError::InvalidSortColumn(raw.to_string())),
    }
}

pub fn parse_sort_order(raw: &str) -> Result<SortOrder, ListStudentsError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "asc" => Ok(SortOrder::Asc),
        "desc" => Ok(SortOrder::Desc),
        _ => Err(ListStudentsError::InvalidSortOrder(raw.to_string())),
    }
}

pub fn parse_subject(raw: &str) -> Result<Course, ListStudentsError> {
    raw.parse::<Course>()
        .map_err(|_| ListStudentsError::UnknownSubject(raw.to_string()))
}

impl ListStudentsQuery {
    /// Checks every parameter and folds them into a store query.
    pub fn validate(&self) -> Result<StudentQuery, ListStudentsError> {
        let order = self
            .sort_order
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(parse_sort_order)
            .transpose()?
            .unwrap_or_default();

        let mut options = vec![PaginationParams::new(self.page, self.size).option()];
        if let Some(raw) = self.sort_by.as_deref().filter(|raw| !raw.trim().is_empty()) {
            options.push(sorted_by(parse_sort_column(raw)?, order));
        }
        if let Some(name) = &self.name {
            options.push(with_name(name.clone()));
        }
        if let Some(raw) = self.subject.as_deref().filter(|raw| !raw.trim().is_empty()) {
            options.push(with_subject(parse_subject(raw)?.as_str()));
        }

        Ok(StudentQuery::from_options(options))
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn StudentStore,
    query: ListStudentsQuery,
) -> Result<StudentPage, ListStudentsError> {
    let query = query.validate()?;
    let page = store.query(&query).await?;
    tracing::debug!(count = page.count, returned = page.records.len(), "students listed");

    let meta = PaginationMeta::new(query.page, query.size, page.count);
    Ok(StudentPage { page, meta })
}
