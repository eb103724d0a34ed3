//! Random student CSV fixtures

use rand::{seq::SliceRandom, Rng};
use roster_common::types::{Course, STUDENT_CSV_HEADER};
use std::io::Write;
use tempfile::NamedTempFile;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Grace", "Marie", "Niels", "Emmy", "Carl", "Rosalind", "Srinivasa", "Hedy",
];
const LAST_NAMES: &[&str] = &[
    "Lovelace", "Turing", "Hopper", "Curie", "Bohr", "Noether", "Gauss", "Franklin", "Ramanujan",
    "Lamarr",
];

/// A students CSV with a header and `rows` random records, ids left blank.
pub fn random_students_csv(rows: usize) -> String {
    let mut rng = rand::thread_rng();
    let mut csv = STUDENT_CSV_HEADER.join(",");
    csv.push('\n');

    for _ in 0..rows {
        let first = FIRST_NAMES.choose(&mut rng).copied().unwrap_or("Ada");
        let last = LAST_NAMES.choose(&mut rng).copied().unwrap_or("Lovelace");
        let course = Course::ALL.choose(&mut rng).copied().unwrap_or(Course::Mathematics);
        let grade: u32 = rng.gen_range(1..=100);
        csv.push_str(&format!(",{first} {last},{},{grade}\n", course.as_str()));
    }
    csv
}

/// Writes [`random_students_csv`] to a temporary file.
pub fn seed_csv_file(rows: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create seed file");
    file.write_all(random_students_csv(rows).as_bytes())
        .expect("Failed to write seed file");
    file
}
