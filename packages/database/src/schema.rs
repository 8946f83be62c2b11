//! Catalog table layout and statement builders (MySQL dialect).
//!
//! Books and magazines share one table. Attributes a kind does not have are
//! stored as `NULL`, and `is_book` tells the two apart.

use std::fmt::Write as _;

use catalog_refresh_catalog_models::{BookRecord, CatalogRecord, MagazineRecord};
use rand::Rng as _;
use switchy_database::DatabaseValue;

use crate::DbError;

/// Longest identifier MySQL accepts.
pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Column definitions, in table order. `row_id` is generated by the store
/// and never inserted. Source-supplied strings are unbounded, so every one
/// of them is `TEXT`.
pub const COLUMNS: &[(&str, &str)] = &[
    ("row_id", "INT UNSIGNED NOT NULL AUTO_INCREMENT"),
    ("name", "TEXT"),
    ("author", "TEXT"),
    ("id", "TEXT"),
    ("publish", "TEXT"),
    ("summary", "TEXT"),
    ("bigCover", "TEXT"),
    ("smallCover", "TEXT"),
    ("cover", "TEXT"),
    ("surl", "TEXT"),
    ("price", "TEXT"),
    ("cn", "TEXT"),
    ("issn", "TEXT"),
    ("isbn", "TEXT"),
    ("is_book", "TINYINT(1) NOT NULL"),
    ("type", "TEXT"),
];

/// Columns written by `INSERT`, in parameter order.
pub const INSERT_COLUMNS: &[&str] = &[
    "name",
    "author",
    "id",
    "publish",
    "summary",
    "bigCover",
    "smallCover",
    "cover",
    "surl",
    "price",
    "cn",
    "issn",
    "isbn",
    "is_book",
    "type",
];

/// Checks that `name` can be interpolated into a statement.
///
/// # Errors
///
/// Returns [`DbError::InvalidIdentifier`] unless the name is 1 to 64
/// characters of `[A-Za-z0-9_]`.
pub fn validate_identifier(name: &str) -> Result<(), DbError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}

/// Builds a staging table name from its parts: `<prefix><millis><suffix>`.
#[must_use]
pub fn staging_table_name(prefix: &str, unix_millis: i64, suffix: u16) -> String {
    format!("{prefix}{unix_millis}{suffix}")
}

/// Generates a fresh staging table name from the current time and a random
/// suffix in `0..1000`.
#[must_use]
pub fn new_staging_table_name(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = rand::thread_rng().gen_range(0..1000u16);
    staging_table_name(prefix, millis, suffix)
}

/// Name the previous live table is parked under during an atomic swap.
#[must_use]
pub fn retired_table_name(staging: &str) -> String {
    format!("{staging}_old")
}

/// `CREATE TABLE IF NOT EXISTS` with the full catalog layout.
#[must_use]
pub fn create_table_sql(table: &str) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS `{table}` (\n");
    for (name, definition) in COLUMNS {
        writeln!(sql, "  `{name}` {definition},").unwrap_or_default();
    }
    sql.push_str("  PRIMARY KEY (`row_id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4");
    sql
}

/// `CREATE TABLE IF NOT EXISTS <table> LIKE <template>`.
#[must_use]
pub fn create_table_like_sql(table: &str, template: &str) -> String {
    format!("CREATE TABLE IF NOT EXISTS `{table}` LIKE `{template}`")
}

/// Multi-row `INSERT` for `rows` rows with `?` placeholders.
#[must_use]
pub fn insert_sql(table: &str, rows: usize) -> String {
    let columns = INSERT_COLUMNS
        .iter()
        .map(|c| format!("`{c}`"))
        .collect::<Vec<_>>()
        .join(", ");
    let row = format!("({})", vec!["?"; INSERT_COLUMNS.len()].join(", "));
    let values = vec![row; rows].join(", ");
    format!("INSERT INTO `{table}` ({columns}) VALUES {values}")
}

/// `DROP TABLE IF EXISTS <table>`.
#[must_use]
pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS `{table}`")
}

/// `RENAME TABLE a TO b[, c TO d ...]`, applied by MySQL as one atomic
/// operation.
#[must_use]
pub fn rename_tables_sql(pairs: &[(&str, &str)]) -> String {
    let renames = pairs
        .iter()
        .map(|(from, to)| format!("`{from}` TO `{to}`"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("RENAME TABLE {renames}")
}

fn text(value: &str) -> DatabaseValue {
    DatabaseValue::String(value.to_string())
}

fn opt_text(value: Option<&String>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |v| DatabaseValue::String(v.clone()))
}

fn book_row(book: &BookRecord) -> Vec<DatabaseValue> {
    vec![
        text(&book.name),
        opt_text(book.author.as_ref()),
        text(&book.id),
        opt_text(book.publisher.as_ref()),
        text(&book.summary),
        opt_text(book.big_cover.as_ref()),
        opt_text(book.small_cover.as_ref()),
        DatabaseValue::Null,
        opt_text(book.surl.as_ref()),
        opt_text(book.price.as_ref()),
        DatabaseValue::Null,
        DatabaseValue::Null,
        opt_text(book.isbn.as_ref()),
        DatabaseValue::Int32(1),
        opt_text(book.book_type.as_ref()),
    ]
}

fn magazine_row(magazine: &MagazineRecord) -> Vec<DatabaseValue> {
    vec![
        text(&magazine.name),
        DatabaseValue::Null,
        text(&magazine.id),
        DatabaseValue::Null,
        text(&magazine.summary),
        DatabaseValue::Null,
        DatabaseValue::Null,
        opt_text(magazine.cover.as_ref()),
        opt_text(magazine.surl.as_ref()),
        DatabaseValue::Null,
        opt_text(magazine.cn.as_ref()),
        opt_text(magazine.issn.as_ref()),
        DatabaseValue::Null,
        DatabaseValue::Int32(0),
        DatabaseValue::Null,
    ]
}

/// Maps a record onto [`INSERT_COLUMNS`].
#[must_use]
pub fn row_values(record: &CatalogRecord) -> Vec<DatabaseValue> {
    match record {
        CatalogRecord::Book(book) => book_row(book),
        CatalogRecord::Magazine(magazine) => magazine_row(magazine),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_has_sixteen_columns_and_fifteen_inserted() {
        assert_eq!(COLUMNS.len(), 16);
        assert_eq!(INSERT_COLUMNS.len(), COLUMNS.len() - 1);
        for (column, (name, _)) in INSERT_COLUMNS.iter().zip(&COLUMNS[1..]) {
            assert_eq!(column, name);
        }
    }

    #[test]
    fn source_text_columns_are_unbounded() {
        for (name, definition) in COLUMNS {
            match *name {
                "row_id" | "is_book" => {}
                _ => assert_eq!(*definition, "TEXT", "{name}"),
            }
        }
        assert!(!create_table_sql("t").contains("VARCHAR"));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        assert!(validate_identifier("book_1700000000000123").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("book; DROP TABLE x").is_err());
        assert!(validate_identifier("book`").is_err());
        assert!(validate_identifier(&"a".repeat(65)).is_err());
    }

    #[test]
    fn staging_name_concatenates_parts() {
        assert_eq!(
            staging_table_name("book_", 1_700_000_000_000, 42),
            "book_170000000000042"
        );
        let generated = new_staging_table_name("book_");
        assert!(generated.starts_with("book_"));
        assert!(validate_identifier(&generated).is_ok());
    }

    #[test]
    fn insert_sql_has_one_group_per_row() {
        let sql = insert_sql("t", 3);
        assert!(sql.starts_with("INSERT INTO `t` (`name`, `author`"));
        assert_eq!(sql.matches('?').count(), 3 * INSERT_COLUMNS.len());
        assert_eq!(sql.matches("), (").count(), 2);
    }

    #[test]
    fn create_sql_declares_every_column() {
        let sql = create_table_sql("book_1");
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `book_1` ("));
        for (name, _) in COLUMNS {
            assert!(sql.contains(&format!("`{name}`")), "missing {name}");
        }
        assert!(sql.contains("PRIMARY KEY (`row_id`)"));
    }

    #[test]
    fn rename_sql_lists_all_pairs() {
        assert_eq!(
            rename_tables_sql(&[("book", "s_old"), ("s", "book")]),
            "RENAME TABLE `book` TO `s_old`, `s` TO `book`"
        );
    }

    #[test]
    fn book_row_fills_book_columns_and_nulls_the_rest() {
        let record = CatalogRecord::Book(BookRecord {
            name: "Dune".to_string(),
            id: "b1".to_string(),
            summary: "Spice".to_string(),
            author: Some("Herbert".to_string()),
            publisher: Some("Chilton".to_string()),
            isbn: Some("978-0441013593".to_string()),
            ..BookRecord::default()
        });
        let row = row_values(&record);
        assert_eq!(row.len(), INSERT_COLUMNS.len());

        let at = |column: &str| {
            let idx = INSERT_COLUMNS.iter().position(|c| *c == column).unwrap();
            &row[idx]
        };
        assert!(matches!(at("publish"), DatabaseValue::String(s) if s == "Chilton"));
        assert!(matches!(at("isbn"), DatabaseValue::String(s) if s == "978-0441013593"));
        assert!(matches!(at("is_book"), DatabaseValue::Int32(1)));
        assert!(matches!(at("cn"), DatabaseValue::Null));
        assert!(matches!(at("issn"), DatabaseValue::Null));
        assert!(matches!(at("cover"), DatabaseValue::Null));
        assert!(matches!(at("bigCover"), DatabaseValue::Null));
    }

    #[test]
    fn magazine_row_uses_complementary_null_pattern() {
        let record = CatalogRecord::Magazine(MagazineRecord {
            name: "Nature".to_string(),
            id: "m1".to_string(),
            cover: Some("http://img/n.jpg".to_string()),
            cn: Some("11-1234".to_string()),
            issn: Some("0028-0836".to_string()),
            ..MagazineRecord::default()
        });
        let row = row_values(&record);

        let at = |column: &str| {
            let idx = INSERT_COLUMNS.iter().position(|c| *c == column).unwrap();
            &row[idx]
        };
        assert!(matches!(at("is_book"), DatabaseValue::Int32(0)));
        assert!(matches!(at("cn"), DatabaseValue::String(s) if s == "11-1234"));
        assert!(matches!(at("issn"), DatabaseValue::String(s) if s == "0028-0836"));
        assert!(matches!(at("cover"), DatabaseValue::String(_)));
        assert!(matches!(at("author"), DatabaseValue::Null));
        assert!(matches!(at("publish"), DatabaseValue::Null));
        assert!(matches!(at("isbn"), DatabaseValue::Null));
        assert!(matches!(at("type"), DatabaseValue::Null));
    }
}
