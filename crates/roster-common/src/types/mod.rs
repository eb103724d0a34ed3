//! Domain types shared by the ingestion pipeline and the query surface

mod course;
mod status;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use course::Course;
pub use status::StatusEvent;

/// Column names every uploaded students file must carry, in this order.
pub const STUDENT_CSV_HEADER: [&str; 4] = ["id", "name", "subject", "grade"];

/// Typed access to the fields the persistence layer validates and fills in.
///
/// The identifier is treated as absent when it is the nil UUID.
pub trait Record: Clone + Send + Sync + 'static {
    fn id(&self) -> Uuid;
    fn set_id(&mut self, id: Uuid);
    fn name(&self) -> &str;
    fn category(&self) -> &str;
    fn score(&self) -> u32;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    #[serde(default)]
    pub id: Uuid,
    pub name: String,
    pub subject: String,
    pub grade: u32,
}

impl Student {
    pub fn new(name: impl Into<String>, subject: impl Into<String>, grade: u32) -> Self {
        Self {
            id: Uuid::nil(),
            name: name.into(),
            subject: subject.into(),
            grade,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }
}

impl Record for Student {
    fn id(&self) -> Uuid {
        self.id
    }

    fn set_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> &str {
        &self.subject
    }

    fn score(&self) -> u32 {
        self.grade
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_student_record_accessors() {
        let id = Uuid::new_v4();
        let mut student = Student::new("Ada", "Mathematics", 91);
        assert!(student.id().is_nil());

        student.set_id(id);
        assert_eq!(student.id(), id);
        assert_eq!(student.name(), "Ada");
        assert_eq!(student.category(), "Mathematics");
        assert_eq!(student.score(), 91);
    }

    #[test]
    fn test_student_deserializes_without_id() {
        let student: Student =
            serde_json::from_str(r#"{"name":"Ada","subject":"Physics","grade":70}"#).unwrap();
        assert!(student.id.is_nil());
        assert_eq!(student.grade, 70);
    }
}
