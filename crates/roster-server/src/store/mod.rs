//! Record storage
//!
//! The ingestion pipeline only needs [`RecordStore`]: write a batch, write one.
//! The query surface additionally needs [`StudentQueries`]. Both are
//! implemented by the Postgres store used in production and by the
//! in-memory store used for tests and demos.

use async_trait::async_trait;
use roster_common::types::{Record, Student};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStudentStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Stored value out of range: {0}")]
    OutOfRange(String),

    /// Rejected by the backend for a reason other than a database error.
    #[error("{0}")]
    Rejected(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Write side used by the bulk persistence layer.
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    /// Writes every row or none of them.
    async fn insert_batch(&self, rows: &[R]) -> StoreResult<()>;

    async fn insert(&self, row: &R) -> StoreResult<()>;
}

/// Read side used by the students query surface.
#[async_trait]
pub trait StudentQueries: Send + Sync {
    async fn query(&self, query: &StudentQuery) -> StoreResult<QueryPage>;

    async fn find_by_name(&self, name: &str) -> StoreResult<Vec<Student>>;
}

/// Everything the server needs from a student backend.
pub trait StudentStore: RecordStore<Student> + StudentQueries {}

impl<T> StudentStore for T where T: RecordStore<Student> + StudentQueries {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPage {
    /// Matching rows across all pages.
    pub count: i64,
    pub records: Vec<Student>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Name,
    Subject,
    Grade,
}

impl SortColumn {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::Name => "name",
            SortColumn::Subject => "subject",
            SortColumn::Grade => "grade",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A filtered, sorted, paginated view over students, built from options.
///
/// ```rust,ignore
/// let query = StudentQuery::from_options([
///     with_subject("Physics"),
///     sorted_by(SortColumn::Grade, SortOrder::Desc),
///     paginate(2, 50),
/// ]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StudentQuery {
    /// Case-insensitive substring match on the name.
    pub name: Option<String>,
    /// Exact match on the subject.
    pub subject: Option<String>,
    pub sort: Option<(SortColumn, SortOrder)>,
    pub page: u32,
    pub size: u32,
}

impl Default for StudentQuery {
    fn default() -> Self {
        Self {
            name: None,
            subject: None,
            sort: None,
            page: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub type QueryOption = Box<dyn FnOnce(&mut StudentQuery) + Send>;

impl StudentQuery {
    pub fn from_options(options: impl IntoIterator<Item = QueryOption>) -> Self {
        let mut query = Self::default();
        for option in options {
            option(&mut query);
        }
        query
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.size)
    }

    /// Applies the query to rows already in memory.
    pub fn apply(&self, rows: &[Student]) -> QueryPage {
        let mut matched: Vec<Student> = rows
            .iter()
            .filter(|s| self.matches(s))
            .cloned()
            .collect();

        if let Some((column, order)) = self.sort {
            matched.sort_by(|a, b| {
                let ordering = match column {
                    SortColumn::Name => a.name.cmp(&b.name),
                    SortColumn::Subject => a.subject.cmp(&b.subject),
                    SortColumn::Grade => a.grade.cmp(&b.grade),
                };
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }

        let count = matched.len() as i64;
        let records = matched
            .into_iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(self.size as usize)
            .collect();

        QueryPage { count, records }
    }

    fn matches(&self, student: &Student) -> bool {
        let name_ok = self.name.as_ref().map_or(true, |needle| {
            student.name.to_lowercase().contains(&needle.to_lowercase())
        });
        let subject_ok = self
            .subject
            .as_ref()
            .map_or(true, |subject| &student.subject == subject);
        name_ok && subject_ok
    }
}

/// Filters by name; an empty name leaves the query unfiltered.
pub fn with_name(name: impl Into<String>) -> QueryOption {
    let name = name.into();
    Box::new(move |query| {
        if !name.trim().is_empty() {
            query.name = Some(name.trim().to_string());
        }
    })
}

pub fn with_subject(subject: impl Into<String>) -> QueryOption {
    let subject = subject.into();
    Box::new(move |query| {
        if !subject.trim().is_empty() {
            query.subject = Some(subject.trim().to_string());
        }
    })
}

pub fn sorted_by(column: SortColumn, order: SortOrder) -> QueryOption {
    Box::new(move |query| query.sort = Some((column, order)))
}

/// Out-of-range values fall back to the defaults rather than failing.
pub fn paginate(page: u32, size: u32) -> QueryOption {
    Box::new(move |query| {
        query.page = if page == 0 { DEFAULT_PAGE } else { page };
        query.size = if size == 0 || size > MAX_PAGE_SIZE {
            DEFAULT_PAGE_SIZE
        } else {
            size
        };
    })
}
