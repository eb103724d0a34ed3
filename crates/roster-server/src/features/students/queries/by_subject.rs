use roster_common::types::Course;
use serde::{Deserialize, Serialize};

use super::list::StudentPage;
use crate::api::response::PaginationMeta;
use crate::error::AppError;
use crate::features::shared::PaginationParams;
use crate::store::{with_subject, StoreError, StudentQuery, StudentStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BySubjectQuery {
    pub subject: String,
    pub pagination: PaginationParams,
}

#[derive(Debug, thiserror::Error)]
pub enum BySubjectError {
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<BySubjectError> for AppError {
    fn from(err: BySubjectError) -> Self {
        match err {
            BySubjectError::UnknownSubject(_) => AppError::BadRequest(err.to_string()),
            BySubjectError::Store(e) => e.into(),
        }
    }
}

#[tracing::instrument(skip(store), fields(subject = %query.subject))]
pub async fn handle(
    store: &dyn StudentStore,
    query: BySubjectQuery,
) -> Result<StudentPage, BySubjectError> {
    let course = query
        .subject
        .parse::<Course>()
        .map_err(|_| BySubjectError::UnknownSubject(query.subject.clone()))?;

    let filter = StudentQuery::from_options([
        with_subject(course.as_str()),
        query.pagination.option(),
    ]);
    let page = store.query(&filter).await?;

    let meta = PaginationMeta::new(filter.page, filter.size, page.count);
    Ok(StudentPage { page, meta })
}
