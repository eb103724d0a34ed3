//! Create student command
//!
//! Goes through the same validation as bulk persistence: name, subject and a
//! non-zero grade are required, and a missing id is generated.

use roster_common::types::Student;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::ingest::bulk::{insert_one, PersistError};
use crate::store::StudentStore;

/// Missing fields deserialize to empty values so they are reported as
/// missing data rather than as a malformed body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateStudentCommand {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub grade: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStudentResponse {
    pub id: Uuid,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateStudentError {
    #[error(transparent)]
    Persist(#[from] PersistError),
}

impl From<CreateStudentError> for AppError {
    fn from(err: CreateStudentError) -> Self {
        match err {
            CreateStudentError::Persist(e) => e.into(),
        }
    }
}

impl From<CreateStudentCommand> for Student {
    fn from(command: CreateStudentCommand) -> Self {
        let student = Student::new(command.name, command.subject, command.grade.unwrap_or(0));
        match command.id {
            Some(id) => student.with_id(id),
            None => student,
        }
    }
}

#[tracing::instrument(skip(store, command), fields(name = %command.name, subject = %command.subject))]
pub async fn handle(
    store: &dyn StudentStore,
    command: CreateStudentCommand,
) -> Result<CreateStudentResponse, CreateStudentError> {
    let student = insert_one(store, Student::from(command)).await?;
    tracing::info!(id = %student.id, "student created");
    Ok(CreateStudentResponse { id: student.id })
}
