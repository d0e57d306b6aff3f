use chrono::NaiveDate;
use serde_json::json;
use sqlx::Execute;

use super::*;

fn input(value: serde_json::Value) -> AssignmentInput {
    serde_json::from_value(value).expect("valid input")
}

fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .expect("valid date")
        .and_hms_opt(h, mi, s)
        .expect("valid time")
}

#[test]
fn test_is_empty() {
    assert!(is_empty(&json!(null)));
    assert!(is_empty(&json!("")));
    assert!(!is_empty(&json!("x")));
    assert!(!is_empty(&json!(false)));
    assert!(!is_empty(&json!(0)));
}

#[test]
fn test_validate_insert_ok() {
    let errors = validate_insert(&input(json!({
        "title": "Buy milk",
        "completed": false,
    })));
    assert!(errors.is_empty());

    let errors = validate_insert(&input(json!({
        "title": "Buy milk",
        "due": "2019-03-08 23:59:59",
        "position": "7",
        "completed": true,
    })));
    assert!(errors.is_empty());
}

#[test]
fn test_validate_insert_requires_title() {
    let errors = validate_insert(&input(json!({ "completed": false })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "title");

    let errors = validate_insert(&input(json!({ "title": "", "completed": false })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "title");

    let errors = validate_insert(&input(json!({ "title": 42, "completed": false })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "title");
}

#[test]
fn test_validate_insert_title_too_long() {
    let errors = validate_insert(&input(json!({
        "title": "x".repeat(129),
        "completed": false,
    })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "title");

    // 128 characters is still fine
    let errors = validate_insert(&input(json!({
        "title": "x".repeat(128),
        "completed": false,
    })));
    assert!(errors.is_empty());
}

#[test]
fn test_validate_insert_due() {
    for due in ["2019-03-08", "2019-03-08T23:59:59", "2019-03-08T23:59:59Z"] {
        let errors = validate_insert(&input(json!({
            "title": "Buy milk",
            "due": due,
            "completed": false,
        })));
        assert!(errors.is_empty(), "due {:?} should be accepted", due);
    }

    for due in [json!("not a date"), json!("2019-13-40"), json!(5)] {
        let errors = validate_insert(&input(json!({
            "title": "Buy milk",
            "due": due.clone(),
            "completed": false,
        })));
        assert_eq!(errors.len(), 1, "due {:?} should be rejected", due);
        assert_eq!(errors[0].field, "due");
    }
}

#[test]
fn test_validate_insert_position() {
    for position in [json!(0), json!(7), json!("7"), json!("007")] {
        let errors = validate_insert(&input(json!({
            "title": "Buy milk",
            "position": position.clone(),
            "completed": false,
        })));
        assert!(errors.is_empty(), "position {:?} should be accepted", position);
    }

    for position in [json!(-1), json!("-3"), json!("abc"), json!(1.5), json!(true)] {
        let errors = validate_insert(&input(json!({
            "title": "Buy milk",
            "position": position.clone(),
            "completed": false,
        })));
        assert_eq!(errors.len(), 1, "position {:?} should be rejected", position);
        assert_eq!(errors[0].field, "position");
    }
}

#[test]
fn test_validate_insert_completed() {
    // A missing completed is an error, and so is anything but a literal bool
    let errors = validate_insert(&input(json!({ "title": "Buy milk" })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "completed");

    let errors = validate_insert(&input(json!({ "title": "Buy milk", "completed": "true" })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "completed");

    let errors = validate_insert(&input(json!({ "title": "Buy milk", "completed": 1 })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "completed");
}

#[test]
fn test_validate_insert_error_order() {
    let errors = validate_insert(&input(json!({
        "title": 7,
        "due": "nope",
        "position": -2,
        "completed": "yes",
    })));

    let fields = errors.iter().map(|e| e.field).collect::<Vec<_>>();
    assert_eq!(fields, ["title", "due", "position", "completed"]);
}

#[test]
fn test_validate_update_skips_absent_fields() {
    assert!(validate_update(&AssignmentInput::default()).is_empty());

    // Empty strings count as absent for updates
    let errors = validate_update(&input(json!({ "title": "", "due": "", "position": "" })));
    assert!(errors.is_empty());

    let errors = validate_update(&input(json!({ "completed": "true" })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "completed");

    let errors = validate_update(&input(json!({ "position": "abc" })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "position");

    let errors = validate_update(&input(json!({ "title": "x".repeat(129) })));
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "title");
}

#[test]
fn test_field_error_shape() {
    let error = FieldError {
        field: "title",
        error: "title must be a string of 1 to 128 characters",
    };

    assert_eq!(
        serde_json::to_value(&error).expect("serializes"),
        json!({ "field": "title", "error": "title must be a string of 1 to 128 characters" })
    );
}

#[test]
fn test_parse_due() {
    assert_eq!(
        parse_due("2019-03-08 23:59:59"),
        Some(datetime(2019, 3, 8, 23, 59, 59))
    );
    assert_eq!(
        parse_due("2019-03-08T23:59:59"),
        Some(datetime(2019, 3, 8, 23, 59, 59))
    );
    // Offsets are normalized to UTC
    assert_eq!(
        parse_due("2019-03-08T23:59:59+01:00"),
        Some(datetime(2019, 3, 8, 22, 59, 59))
    );
    assert_eq!(parse_due("2019-03-08"), Some(datetime(2019, 3, 8, 0, 0, 0)));

    assert_eq!(parse_due("not a date"), None);
    assert_eq!(parse_due("2019-13-40"), None);
    assert_eq!(parse_due(""), None);
}

#[test]
fn test_sanitize() {
    assert_eq!(sanitize("Buy milk"), "Buy milk");
    assert_eq!(sanitize("<b>Buy milk</b>"), "Buy milk");
    assert_eq!(sanitize("<script>alert(1)</script>"), "");
    assert_eq!(
        sanitize("Walk the dog<script>document.cookie</script>"),
        "Walk the dog"
    );
}

#[test]
fn test_changes_from_input() {
    let changes = AssignmentChanges::from_input(&input(json!({
        "title": "<b>Buy milk</b>",
        "due": "2019-03-08",
        "position": "3",
        "completed": true,
    })));

    assert_eq!(
        changes,
        AssignmentChanges {
            title: Some("Buy milk".to_string()),
            due: Some(datetime(2019, 3, 8, 0, 0, 0)),
            position: Some(3),
            completed: Some(true),
        }
    );

    assert!(AssignmentChanges::from_input(&AssignmentInput::default()).is_empty());

    // Empty strings leave their columns untouched
    let changes = AssignmentChanges::from_input(&input(json!({ "title": "", "due": "" })));
    assert!(changes.is_empty());
}

#[test]
fn test_update_statement_single_column() {
    let mut statement = update_statement(
        9,
        AssignmentChanges {
            title: Some("Buy milk".to_string()),
            ..Default::default()
        },
    );

    assert_eq!(
        statement.build().sql(),
        "UPDATE assignments SET title = $1, updated = current_timestamp \
         WHERE id = $2 RETURNING id, title, due, position, completed, created, updated"
    );
}

#[test]
fn test_update_statement_all_columns() {
    let mut statement = update_statement(
        3,
        AssignmentChanges {
            title: Some("Buy milk".to_string()),
            due: Some(datetime(2019, 3, 8, 0, 0, 0)),
            position: Some(4),
            completed: Some(true),
        },
    );

    assert_eq!(
        statement.build().sql(),
        "UPDATE assignments SET title = $1, due = $2, position = $3, completed = $4, \
         updated = current_timestamp WHERE id = $5 \
         RETURNING id, title, due, position, completed, created, updated"
    );
}

#[test]
fn test_model_serialization() {
    let model = Model {
        id: 1,
        title: "Buy milk".to_string(),
        due: Some(datetime(2019, 3, 8, 23, 59, 59)),
        position: 1,
        completed: false,
        created: datetime(2019, 3, 1, 12, 0, 0),
        updated: datetime(2019, 3, 1, 12, 0, 0),
    };

    let value = serde_json::to_value(&model).expect("serializes");
    assert_eq!(value["id"], json!(1));
    assert_eq!(value["title"], json!("Buy milk"));
    assert_eq!(value["due"], json!("2019-03-08T23:59:59"));
    assert_eq!(value["completed"], json!(false));
}
