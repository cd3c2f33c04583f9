//! Statement classification.
//!
//! A coarse allow-list: the leading verb of the trimmed statement,
//! compared case-insensitively, decides what an entry point accepts. This is not a
//! SQL validator. Comments, multiple statements and unusual verbs are not inspected.

use crate::models::{EntryPoint, VerbCategory};

/// Verbs accepted by the read entry point.
pub const READ_VERBS: &[&str] = &["SELECT"];

/// Data-changing verbs accepted by the write entry point; these require a commit.
pub const WRITE_VERBS: &[&str] = &["INSERT", "UPDATE", "DELETE", "EXECUTE"];

/// Schema verbs accepted by the write entry point; these commit implicitly.
pub const DDL_VERBS: &[&str] = &["CREATE", "DROP", "ALTER"];

/// Classify `sql` for the given entry point.
///
/// The same text can be accepted on one entry point and rejected on the other.
pub fn classify(entry_point: EntryPoint, sql: &str) -> VerbCategory {
    let statement = sql.trim();
    let matches_any = |verbs: &[&str]| verbs.iter().any(|verb| has_prefix(statement, verb));

    match entry_point {
        EntryPoint::Read if matches_any(READ_VERBS) => VerbCategory::Read,
        EntryPoint::Write if matches_any(WRITE_VERBS) => VerbCategory::Write,
        EntryPoint::Write if matches_any(DDL_VERBS) => VerbCategory::Ddl,
        _ => VerbCategory::Rejected,
    }
}

/// ASCII case-insensitive prefix test.
fn has_prefix(statement: &str, verb: &str) -> bool {
    statement
        .get(..verb.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(verb))
}
