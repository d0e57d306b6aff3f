use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use serde_json::Value;
use sqlx::{PgPool, Postgres, QueryBuilder};

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, serde::Serialize)]
pub struct Model {
    /// The unique identifier for the assignment.
    pub id: i32,
    /// The title of the assignment. Unique, 1 to 128 characters.
    pub title: String,
    /// The due date of the assignment, if it has one.
    pub due: Option<NaiveDateTime>,
    /// The position of the assignment in its list.
    pub position: i32,
    /// Whether the assignment is completed or not.
    pub completed: bool,
    /// The time the assignment was created.
    pub created: NaiveDateTime,
    /// The time the assignment was last updated.
    pub updated: NaiveDateTime,
}

/// The row identity returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow, serde::Serialize)]
pub struct Deleted {
    pub id: i32,
    pub title: String,
}

/// A single validation failure, keyed by the input field it concerns.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub error: &'static str,
}

/// The fields a client may supply when creating or updating an assignment.
///
/// Fields are kept as raw JSON values so that a wrong-typed field surfaces as
/// a validation error on that field rather than a deserialization failure for
/// the whole body.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct AssignmentInput {
    pub title: Value,
    pub due: Value,
    pub position: Value,
    pub completed: Value,
}

/// Outcome of a mutating repository operation.
#[derive(Debug, PartialEq)]
pub enum MutationResult<T> {
    Ok(T),
    ValidationFailed(Vec<FieldError>),
    NotFound,
}

// Absent fields are skipped by validation and left untouched by updates.
fn is_empty(value: &Value) -> bool {
    value.is_null() || value.as_str().map_or(false, str::is_empty)
}

fn check_title(value: &Value) -> Result<(), &'static str> {
    match value.as_str() {
        Some(title) if (1..=128).contains(&title.chars().count()) => Ok(()),
        _ => Err("title must be a string of 1 to 128 characters"),
    }
}

fn check_due(value: &Value) -> Result<(), &'static str> {
    match value.as_str().and_then(parse_due) {
        Some(_) => Ok(()),
        None => Err("due must be a valid ISO 8601 date"),
    }
}

fn check_position(value: &Value) -> Result<(), &'static str> {
    match position_value(value) {
        Some(position) if position >= 0 => Ok(()),
        _ => Err("position must be an integer of 0 or greater"),
    }
}

fn check_completed(value: &Value) -> Result<(), &'static str> {
    match value.as_bool() {
        Some(_) => Ok(()),
        None => Err("completed must be a boolean"),
    }
}

/// Validates the fields of a new assignment. `title` and `completed` are
/// required, `due` and `position` only checked when supplied.
pub fn validate_insert(input: &AssignmentInput) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if let Err(error) = check_title(&input.title) {
        errors.push(FieldError { field: "title", error });
    }

    if !is_empty(&input.due) {
        if let Err(error) = check_due(&input.due) {
            errors.push(FieldError { field: "due", error });
        }
    }

    if !is_empty(&input.position) {
        if let Err(error) = check_position(&input.position) {
            errors.push(FieldError { field: "position", error });
        }
    }

    if let Err(error) = check_completed(&input.completed) {
        errors.push(FieldError { field: "completed", error });
    }

    errors
}

/// Validates a partial update. Only supplied fields are checked.
pub fn validate_update(input: &AssignmentInput) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if !is_empty(&input.title) {
        if let Err(error) = check_title(&input.title) {
            errors.push(FieldError { field: "title", error });
        }
    }

    if !is_empty(&input.due) {
        if let Err(error) = check_due(&input.due) {
            errors.push(FieldError { field: "due", error });
        }
    }

    if !is_empty(&input.position) {
        if let Err(error) = check_position(&input.position) {
            errors.push(FieldError { field: "position", error });
        }
    }

    if !is_empty(&input.completed) {
        if let Err(error) = check_completed(&input.completed) {
            errors.push(FieldError { field: "completed", error });
        }
    }

    errors
}

static SANITIZER: Lazy<ammonia::Builder<'static>> = Lazy::new(|| {
    let mut builder = ammonia::Builder::default();
    builder.tags(HashSet::new());
    builder
});

/// Strips all HTML markup and script content from a string before it is
/// stored. Parameter binding already guards the SQL side.
pub fn sanitize(input: &str) -> String {
    SANITIZER.clean(input).to_string()
}

/// Parses an ISO 8601 due date. Accepts a full RFC 3339 timestamp, a naive
/// date-time with either a `T` or a space separator, or a bare date.
fn parse_due(input: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.naive_utc());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(input, format) {
            return Some(parsed);
        }
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn position_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(number) => number.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(string) => string.trim().parse().ok(),
        _ => None,
    }
}

/// The validated, typed subset of an update body. `None` fields are left
/// untouched by the generated statement.
#[derive(Debug, Default, PartialEq)]
struct AssignmentChanges {
    title: Option<String>,
    due: Option<NaiveDateTime>,
    position: Option<i32>,
    completed: Option<bool>,
}

impl AssignmentChanges {
    fn from_input(input: &AssignmentInput) -> Self {
        Self {
            title: input.title.as_str().filter(|title| !title.is_empty()).map(sanitize),
            due: input.due.as_str().and_then(parse_due),
            position: if is_empty(&input.position) {
                None
            } else {
                position_value(&input.position)
            },
            completed: input.completed.as_bool(),
        }
    }

    fn is_empty(&self) -> bool {
        self.title.is_none() && self.due.is_none() && self.position.is_none() && self.completed.is_none()
    }
}

const RETURNING_COLUMNS: &str = "id, title, due, position, completed, created, updated";

/// Builds the partial update statement, touching only the supplied columns.
/// Pure so the generated SQL can be asserted without a database.
fn update_statement(id: i32, changes: AssignmentChanges) -> QueryBuilder<'static, Postgres> {
    let mut statement = QueryBuilder::new("UPDATE assignments SET ");

    {
        let mut columns = statement.separated(", ");

        if let Some(title) = changes.title {
            columns.push("title = ");
            columns.push_bind_unseparated(title);
        }

        if let Some(due) = changes.due {
            columns.push("due = ");
            columns.push_bind_unseparated(due);
        }

        if let Some(position) = changes.position {
            columns.push("position = ");
            columns.push_bind_unseparated(position);
        }

        if let Some(completed) = changes.completed {
            columns.push("completed = ");
            columns.push_bind_unseparated(completed);
        }

        columns.push("updated = current_timestamp");
    }

    statement.push(" WHERE id = ");
    statement.push_bind(id);
    statement.push(" RETURNING ");
    statement.push(RETURNING_COLUMNS);

    statement
}

/// Fetches all assignments in store order.
pub async fn list(db: &PgPool) -> sqlx::Result<Vec<Model>> {
    sqlx::query_as::<_, Model>("SELECT * FROM assignments")
        .fetch_all(db)
        .await
}

/// Inserts a new assignment after validating and sanitizing the input.
pub async fn insert(db: &PgPool, input: &AssignmentInput) -> sqlx::Result<MutationResult<Model>> {
    let errors = validate_insert(input);
    if !errors.is_empty() {
        return Ok(MutationResult::ValidationFailed(errors));
    }

    let title = sanitize(input.title.as_str().unwrap_or_default());
    let due = input.due.as_str().and_then(parse_due);
    let position = position_value(&input.position).unwrap_or(0);
    let completed = input.completed.as_bool().unwrap_or_default();

    let assignment = sqlx::query_as::<_, Model>(
        "INSERT INTO assignments (title, due, position, completed) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, title, due, position, completed, created, updated",
    )
    .bind(title)
    .bind(due)
    .bind(position)
    .bind(completed)
    .fetch_one(db)
    .await?;

    Ok(MutationResult::Ok(assignment))
}

/// Finds an assignment by its id. `None` means no row matched; the caller
/// decides what not-found looks like.
pub async fn find_by_id(db: &PgPool, id: i32) -> sqlx::Result<Option<Model>> {
    sqlx::query_as::<_, Model>("SELECT * FROM assignments WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Applies a partial update to an assignment. Supplying no fields at all is a
/// no-op that returns the current row.
pub async fn update(db: &PgPool, id: i32, input: &AssignmentInput) -> sqlx::Result<MutationResult<Model>> {
    let Some(existing) = find_by_id(db, id).await? else {
        return Ok(MutationResult::NotFound);
    };

    let errors = validate_update(input);
    if !errors.is_empty() {
        return Ok(MutationResult::ValidationFailed(errors));
    }

    let changes = AssignmentChanges::from_input(input);
    if changes.is_empty() {
        return Ok(MutationResult::Ok(existing));
    }

    let updated = update_statement(id, changes)
        .build_query_as::<Model>()
        .fetch_optional(db)
        .await?;

    // The row can disappear between the existence check and the update.
    Ok(match updated {
        Some(assignment) => MutationResult::Ok(assignment),
        None => MutationResult::NotFound,
    })
}

/// Deletes an assignment by its id, returning the deleted row's identity.
pub async fn delete(db: &PgPool, id: i32) -> sqlx::Result<Option<Deleted>> {
    sqlx::query_as::<_, Deleted>("DELETE FROM assignments WHERE id = $1 RETURNING id, title")
        .bind(id)
        .fetch_optional(db)
        .await
}

#[cfg(test)]
mod tests;
