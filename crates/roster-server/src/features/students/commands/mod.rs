pub mod create;

pub use create::{CreateStudentCommand, CreateStudentError, CreateStudentResponse};
