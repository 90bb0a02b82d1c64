use joinery::config::Dialect;
use joinery::convert::instance_to_delete_criteria;
use joinery::criteria::Criterion;
use joinery::executor::mock::MockExecutor;
use joinery::executor::ExecuteResult;
use joinery::persist::is_persisted;
use joinery::schema::Side;
use joinery::store::{delete, save};
use joinery::OrmError;
use serde_json::json;

use crate::common::{blog_schema, row};

#[test]
fn test_save_new_then_existing_post() {
    let schema = blog_schema();
    let posts = schema.get_table("posts").expect("registered");
    let mock = MockExecutor::new();
    mock.push_rows(vec![row(json!({ "id": 3, "author_id": 10, "title": "Draft", "published": false }))])
        .push_execute(ExecuteResult {
            affected_rows: 1,
            insert_id: None,
        });

    let draft = posts.instance_to_row(&row(json!({ "authorId": 10, "title": "Draft", "published": false })));
    let stored = save(posts, &mock, &draft, Dialect::Postgres).expect("inserted");
    assert_eq!(stored.get("id"), Some(&json!(3)));
    assert!(is_persisted(posts, &mock, &posts.row_to_instance(&stored), Side::Instance, Dialect::Postgres)
        .expect("consistent keys"));

    let mut published = stored.clone();
    published.insert("published".into(), json!(true));
    save(posts, &mock, &published, Dialect::Postgres).expect("updated");

    let statements = mock.statements();
    assert_eq!(
        statements[0].sql,
        r#"INSERT INTO "posts" ("author_id", "title", "published") VALUES ($1, $2, $3) RETURNING *"#
    );
    assert_eq!(
        statements[1].sql,
        r#"UPDATE "posts" SET "author_id" = $1, "title" = $2, "published" = $3 WHERE "id" = $4"#
    );
    assert_eq!(statements[1].values, vec![json!(10), json!("Draft"), json!(true), json!(3)]);
}

#[test]
fn test_sqlite_insert_reads_insert_id() {
    let schema = blog_schema();
    let authors = schema.get_table("authors").expect("registered");
    let mock = MockExecutor::new();
    mock.push_execute(ExecuteResult {
        affected_rows: 1,
        insert_id: Some(json!(42)),
    });

    let stored = save(authors, &mock, &row(json!({ "name": "Ada" })), Dialect::Sqlite).expect("inserted");
    assert_eq!(stored, row(json!({ "name": "Ada", "id": 42 })));
    assert_eq!(mock.statements()[0].sql, r#"INSERT INTO "authors" ("name") VALUES (?)"#);
}

#[test]
fn test_delete_comment() {
    let schema = blog_schema();
    let comments = schema.get_table("comments").expect("registered");
    let instance = row(json!({ "id": 100, "postId": 1, "body": "nice" }));

    let criteria = instance_to_delete_criteria(comments, &instance);
    assert_eq!(criteria.get("id"), Some(&Criterion::Value(json!(100))));

    let mock = MockExecutor::new();
    mock.push_execute(ExecuteResult {
        affected_rows: 1,
        insert_id: None,
    });
    let removed = delete(comments, &mock, &comments.instance_to_row(&instance), Dialect::Postgres).expect("deleted");
    assert_eq!(removed, 1);
    assert_eq!(mock.statements()[0].sql, r#"DELETE FROM "comments" WHERE "id" = $1"#);

    let missing = delete(comments, &mock, &row(json!({ "body": "orphan" })), Dialect::Postgres);
    assert!(matches!(missing, Err(OrmError::MissingPrimaryKey { .. })));
}

#[test]
fn test_executor_errors_surface_from_save() {
    let schema = blog_schema();
    let authors = schema.get_table("authors").expect("registered");
    let mock = MockExecutor::new();
    mock.push_error("duplicate key value violates unique constraint");

    let result = save(authors, &mock, &row(json!({ "name": "Ada" })), Dialect::Postgres);
    match result {
        Err(OrmError::Executor(e)) => assert!(e.to_string().contains("duplicate key")),
        other => panic!("expected an executor error, got {other:?}"),
    }
}
