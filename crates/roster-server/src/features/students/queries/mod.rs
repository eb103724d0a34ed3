pub mod by_name;
pub mod by_subject;
pub mod list;

pub use by_name::{FindByNameError, FindByNameQuery};
pub use by_subject::{BySubjectError, BySubjectQuery};
pub use list::{ListStudentsError, ListStudentsQuery, StudentPage};
