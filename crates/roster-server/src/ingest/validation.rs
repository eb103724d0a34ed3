//! Pre-flight checks run on every spooled file before any decoding starts

use std::io::SeekFrom;

use csv_async::{AsyncReaderBuilder, StringRecord};
use mime::Mime;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::coordinator::SpooledFile;

/// Bytes inspected when sniffing a file's content type.
pub const SNIFF_LEN: usize = 512;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid file type: {}", .files.join(", "))]
    InvalidFileType { files: Vec<String> },

    #[error("Invalid CSV header, expected {expected}: {}", .files.join(", "))]
    InvalidSchema { expected: String, files: Vec<String> },

    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Detects the content type of a file prefix.
///
/// Known binary signatures win, then any control byte that never appears
/// in text marks the prefix as binary, and everything else is plain text.
pub fn sniff(prefix: &[u8]) -> Mime {
    if let Some(kind) = infer::get(prefix) {
        return kind
            .mime_type()
            .parse()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
    }

    let binary = prefix
        .iter()
        .any(|&b| matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F));
    if binary {
        mime::APPLICATION_OCTET_STREAM
    } else {
        mime::TEXT_PLAIN_UTF_8
    }
}

pub fn is_accepted(content_type: &Mime) -> bool {
    let essence = content_type.essence_str();
    essence.contains("csv") || essence == "text/plain"
}

async fn read_prefix(file: &mut tokio::fs::File) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0)).await?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut *file).take(SNIFF_LEN as u64).read_to_end(&mut prefix).await?;
    file.seek(SeekFrom::Start(0)).await?;
    Ok(prefix)
}

/// Compares the first row with `expected`, position by position and byte
/// for byte.
///
/// A file with no first row passes; the worker reports it as empty.
async fn header_matches(file: &mut tokio::fs::File, expected: &[&str]) -> std::io::Result<bool> {
    file.seek(SeekFrom::Start(0)).await?;
    let matches = {
        let mut reader = AsyncReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .create_reader(&mut *file);
        let mut first = StringRecord::new();
        match reader.read_record(&mut first).await {
            Ok(false) => true,
            Err(_) => false,
            Ok(true) => {
                first.len() == expected.len()
                    && first.iter().zip(expected).all(|(got, want)| got == *want)
            },
        }
    };
    file.seek(SeekFrom::Start(0)).await?;
    Ok(matches)
}

/// Sniffs every file, then checks every header.
///
/// All offending files are named in the error. Every file is rewound to
/// its start whether or not the upload passes.
pub async fn validate_files(
    files: &mut [SpooledFile],
    expected_header: &[&str],
) -> Result<(), ValidationError> {
    let mut wrong_type = Vec::new();
    for spooled in files.iter_mut() {
        let content_type = sniff(&read_prefix(&mut spooled.file).await?);
        if !is_accepted(&content_type) {
            wrong_type.push(format!("{} ({})", spooled.name, content_type));
        }
    }
    if !wrong_type.is_empty() {
        return Err(ValidationError::InvalidFileType { files: wrong_type });
    }

    let mut wrong_header = Vec::new();
    for spooled in files.iter_mut() {
        if !header_matches(&mut spooled.file, expected_header).await? {
            wrong_header.push(spooled.name.clone());
        }
    }
    if !wrong_header.is_empty() {
        return Err(ValidationError::InvalidSchema {
            expected: expected_header.join(","),
            files: wrong_header,
        });
    }

    Ok(())
}
