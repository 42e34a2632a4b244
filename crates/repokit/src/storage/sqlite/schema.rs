//! SQLite schema definitions and SQL query constants.

/// SQL statement to create the document table.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    body TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
"#;

pub const INSERT_DOCUMENT: &str =
    "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)";

pub const REPLACE_DOCUMENT: &str =
    "UPDATE documents SET body = ?3 WHERE collection = ?1 AND id = ?2";

pub const DELETE_DOCUMENT: &str = "DELETE FROM documents WHERE collection = ?1 AND id = ?2";

pub const SELECT_DOCUMENT: &str = "SELECT body FROM documents WHERE collection = ?1 AND id = ?2";

pub const SELECT_DOCUMENTS: &str =
    "SELECT body FROM documents WHERE collection = ?1 ORDER BY rowid";

pub const COUNT_DOCUMENTS: &str = "SELECT COUNT(*) FROM documents WHERE collection = ?1";
