use roster_common::types::Student;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::store::{StoreError, StudentStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindByNameQuery {
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FindByNameError {
    #[error("Student name is required")]
    NameRequired,

    #[error("No student named '{0}'")]
    NotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<FindByNameError> for AppError {
    fn from(err: FindByNameError) -> Self {
        match err {
            FindByNameError::NameRequired => AppError::BadRequest(err.to_string()),
            FindByNameError::NotFound(_) => AppError::NotFound(err.to_string()),
            FindByNameError::Store(e) => e.into(),
        }
    }
}

/// Exact-name lookup. An empty result is reported as not found.
#[tracing::instrument(skip(store), fields(name = %query.name))]
pub async fn handle(
    store: &dyn StudentStore,
    query: FindByNameQuery,
) -> Result<Vec<Student>, FindByNameError> {
    if query.name.trim().is_empty() {
        return Err(FindByNameError::NameRequired);
    }
    let students = store.find_by_name(&query.name).await?;
    if students.is_empty() {
        return Err(FindByNameError::NotFound(query.name));
    }
    Ok(students)
}
