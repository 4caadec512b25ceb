//! Partial updates as data.
//!
//! A patch is a list of `(column, value)` pairs for the fields the client
//! actually supplied. Column names come from closed enums, values are always
//! bound parameters.

use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use time::Date;

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Text(String),
    Date(Date),
    BigInt(i64),
    Decimal(Decimal),
}

pub trait Column: Copy {
    fn name(self) -> &'static str;
}

/// Trims the value and treats an empty string as "not supplied".
pub fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `UPDATE <table> SET <col> = $n, ..., updated_at = now() WHERE <key> = $m RETURNING <returning>`
pub fn update_query<'a, C: Column>(
    table: &'static str,
    set: Vec<(C, PatchValue)>,
    key_column: &'static str,
    key: i64,
    returning: &'static str,
) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE ");
    qb.push(table).push(" SET ");
    {
        let mut assignments = qb.separated(", ");
        for (column, value) in set {
            assignments.push(column.name());
            assignments.push_unseparated(" = ");
            match value {
                PatchValue::Text(v) => assignments.push_bind_unseparated(v),
                PatchValue::Date(v) => assignments.push_bind_unseparated(v),
                PatchValue::BigInt(v) => assignments.push_bind_unseparated(v),
                PatchValue::Decimal(v) => assignments.push_bind_unseparated(v),
            };
        }
        assignments.push("updated_at = now()");
    }
    qb.push(" WHERE ")
        .push(key_column)
        .push(" = ")
        .push_bind(key)
        .push(" RETURNING ")
        .push(returning);
    qb
}
