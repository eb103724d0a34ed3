use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RosterError;

/// The catalogue of subjects a student record can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Course {
    Mathematics,
    Physics,
    Chemistry,
    Biology,
    History,
    EnglishLiterature,
    ComputerScience,
    Art,
    Music,
    Geography,
}

impl Course {
    pub const ALL: [Course; 10] = [
        Course::Mathematics,
        Course::Physics,
        Course::Chemistry,
        Course::Biology,
        Course::History,
        Course::EnglishLiterature,
        Course::ComputerScience,
        Course::Art,
        Course::Music,
        Course::Geography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Course::Mathematics => "Mathematics",
            Course::Physics => "Physics",
            Course::Chemistry => "Chemistry",
            Course::Biology => "Biology",
            Course::History => "History",
            Course::EnglishLiterature => "English Literature",
            Course::ComputerScience => "Computer Science",
            Course::Art => "Art",
            Course::Music => "Music",
            Course::Geography => "Geography",
        }
    }
}

impl fmt::Display for Course {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Course {
    type Err = RosterError;

    /// Case-insensitive match on the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Course::ALL
            .into_iter()
            .find(|course| course.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RosterError::UnknownCourse(s.to_string()))
    }
}

impl TryFrom<String> for Course {
    type Error = RosterError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Course> for String {
    fn from(course: Course) -> Self {
        course.as_str().to_string()
    }
}
