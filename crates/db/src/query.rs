//! A small typed-query guard: dynamic `ORDER BY` fragments are only ever
//! built from column names declared on a table's allow-list, so a
//! caller-supplied sort key cannot smuggle arbitrary SQL into a query
//! string.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("unknown column '{0}' for this table")]
    UnknownColumn(String),
}

pub trait Filterable {
    const ALLOWED_COLUMNS: &'static [&'static str];

    fn check_column(name: &str) -> Result<(), QueryError> {
        if Self::ALLOWED_COLUMNS.contains(&name) {
            Ok(())
        } else {
            Err(QueryError::UnknownColumn(name.to_string()))
        }
    }
}

/// Builds an `ORDER BY <column> <ASC|DESC>` fragment after validating the
/// column against `T::ALLOWED_COLUMNS`.
pub fn order_by_clause<T: Filterable>(column: &str, descending: bool) -> Result<String, QueryError> {
    T::check_column(column)?;
    let direction = if descending { "DESC" } else { "ASC" };
    Ok(format!("{column} {direction}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;
    impl Filterable for Dummy {
        const ALLOWED_COLUMNS: &'static [&'static str] = &["id", "name"];
    }

    #[test]
    fn rejects_unknown_columns() {
        assert!(Dummy::check_column("id").is_ok());
        assert_eq!(
            Dummy::check_column("evil; DROP TABLE boards"),
            Err(QueryError::UnknownColumn("evil; DROP TABLE boards".to_string()))
        );
    }

    #[test]
    fn order_by_clause_picks_direction() {
        assert_eq!(order_by_clause::<Dummy>("name", false).unwrap(), "name ASC");
        assert_eq!(order_by_clause::<Dummy>("name", true).unwrap(), "name DESC");
        assert!(order_by_clause::<Dummy>("evil", false).is_err());
    }
}
