//! Row mapping from CSV records to domain records

use csv_async::StringRecord;
use roster_common::types::{Student, STUDENT_CSV_HEADER};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("invalid {column} {value:?}: {reason}")]
    InvalidField {
        column: &'static str,
        value: String,
        reason: String,
    },
}

/// Turns one data row into a record. Called once per row, on the file's task.
pub trait RowMapper<R>: Send + Sync {
    fn map_row(&self, row: &StringRecord) -> Result<R, DecodeError>;
}

impl<R, F> RowMapper<R> for F
where
    F: Fn(&StringRecord) -> Result<R, DecodeError> + Send + Sync,
{
    fn map_row(&self, row: &StringRecord) -> Result<R, DecodeError> {
        self(row)
    }
}

/// Maps `id,name,subject,grade` rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StudentMapper;

impl RowMapper<Student> for StudentMapper {
    fn map_row(&self, row: &StringRecord) -> Result<Student, DecodeError> {
        if row.len() != STUDENT_CSV_HEADER.len() {
            return Err(DecodeError::ColumnCount {
                expected: STUDENT_CSV_HEADER.len(),
                found: row.len(),
            });
        }

        let field = |index: usize| row.get(index).unwrap_or_default().trim();

        let id = match field(0) {
            "" => Uuid::nil(),
            raw => Uuid::parse_str(raw).map_err(|e| DecodeError::InvalidField {
                column: "id",
                value: raw.to_string(),
                reason: e.to_string(),
            })?,
        };

        let grade = field(3).parse::<u32>().map_err(|e| DecodeError::InvalidField {
            column: "grade",
            value: field(3).to_string(),
            reason: e.to_string(),
        })?;

        Ok(Student {
            id,
            name: field(1).to_string(),
            subject: field(2).to_string(),
            grade,
        })
    }
}
