pub mod cancel;
pub mod submit;

pub use cancel::{CancelUploadCommand, CancelUploadError, CancelUploadResponse};
pub use submit::{SubmitUploadError, SubmitUploadResponse, FILES_FIELD};
