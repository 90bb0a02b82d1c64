use joinery::config::{Dialect, OrmConfig};
use joinery::convert::{instance_criteria_to_row_criteria, rows_to_instances_json};
use joinery::criteria::{validate_criteria, Criteria};
use joinery::executor::mock::MockExecutor;
use joinery::Loader;
use serde_json::json;

use crate::common::{blog_schema, row};

fn criteria(value: serde_json::Value) -> Criteria {
    Criteria::try_from(value).expect("valid criteria")
}

#[test]
fn test_joined_load_builds_nested_instances() {
    let schema = blog_schema();
    let config = OrmConfig::default();
    let mock = MockExecutor::new();
    mock.push_rows(vec![
        row(json!({
            "t_0": 1, "t_1": 10, "t_2": "Rust", "t_3": true,
            "t__0_0": 10, "t__0_1": "Ada",
            "t__1_0": 100, "t__1_1": 1, "t__1_2": 11, "t__1_3": "nice"
        })),
        row(json!({
            "t_0": 1, "t_1": 10, "t_2": "Rust", "t_3": true,
            "t__0_0": 10, "t__0_1": "Ada",
            "t__1_0": 101, "t__1_1": 1, "t__1_2": 12, "t__1_3": "agreed"
        })),
        row(json!({
            "t_0": 2, "t_1": 10, "t_2": "Rusty", "t_3": false,
            "t__0_0": 10, "t__0_1": "Ada",
            "t__1_0": null, "t__1_1": null, "t__1_2": null, "t__1_3": null
        })),
    ]);

    let instance_criteria = criteria(json!({
        "title": { "@operator": "like", "@value": "Rust%" },
        "author": { "@load": true },
        "comments": { "@load": true },
        "@orderBy": { "field": "id", "direction": "DESC" },
        "@limit": 5
    }));
    let row_criteria =
        instance_criteria_to_row_criteria(&schema, "posts", &instance_criteria).expect("known table");
    let loaded = Loader::new(&schema, &mock, &config)
        .load("posts", &row_criteria)
        .expect("loaded");

    let statements = mock.statements();
    assert_eq!(statements.len(), 1);
    let sql = &statements[0].sql;
    assert!(sql.starts_with(r#"SELECT t.id "t_0", t.author_id "t_1""#), "unexpected select: {sql}");
    assert!(sql.contains("FROM posts t LEFT JOIN authors t__0 ON t.author_id = t__0.id"));
    assert!(sql.contains("LEFT JOIN comments t__1 ON t.id = t__1.post_id"));
    assert!(sql.ends_with("WHERE t.title LIKE $1 ORDER BY t.id DESC LIMIT 5"), "unexpected tail: {sql}");
    assert_eq!(statements[0].values, vec![json!("Rust%")]);

    let instances = rows_to_instances_json(&schema, &loaded.graph, &loaded.roots).expect("rendered");
    assert_eq!(
        instances,
        json!([
            {
                "id": 1, "authorId": 10, "title": "Rust", "published": true,
                "author": { "id": 10, "name": "Ada" },
                "comments": [
                    { "id": 100, "postId": 1, "authorId": 11, "body": "nice" },
                    { "id": 101, "postId": 1, "authorId": 12, "body": "agreed" }
                ]
            },
            {
                "id": 2, "authorId": 10, "title": "Rusty", "published": false,
                "author": { "id": 10, "name": "Ada" },
                "comments": []
            }
        ])
    );
}

#[test]
fn test_separate_load_nested_under_join() {
    let schema = blog_schema();
    let config = OrmConfig::default();
    let mock = MockExecutor::new();
    mock.push_rows(vec![
        row(json!({ "t_0": 1, "t_1": 10, "t__1_0": 100, "t__1_1": 1, "t__1_2": 11 })),
        row(json!({ "t_0": 1, "t_1": 10, "t__1_0": 101, "t__1_1": 1, "t__1_2": 11 })),
    ])
    .push_rows(vec![row(json!({ "t_0": 11, "t_1": "Grace" }))]);

    let loaded = Loader::new(&schema, &mock, &config)
        .load(
            "posts",
            &criteria(json!({
                "comments": { "@load": true, "author": { "@loadSeparately": true } }
            })),
        )
        .expect("loaded");

    let statements = mock.statements();
    assert_eq!(statements.len(), 2, "one follow-up per separately loaded path");
    assert!(statements[1].sql.ends_with("FROM authors t WHERE t.id IN ($1)"));
    assert_eq!(statements[1].values, vec![json!(11)], "the shared author is asked for once");

    let rendered = loaded.to_json().expect("acyclic");
    assert_eq!(rendered[0]["comments"][0]["author"], json!({ "id": 11, "name": "Grace" }));
    assert_eq!(rendered[0]["comments"][1]["author"], json!({ "id": 11, "name": "Grace" }));
}

#[test]
fn test_mysql_rendering_of_alternatives() {
    let schema = blog_schema();
    let config = OrmConfig {
        dialect: Dialect::MySql,
        ..OrmConfig::default()
    };
    let mock = MockExecutor::new();

    Loader::new(&schema, &mock, &config)
        .load(
            "posts",
            &criteria(json!([
                { "published": true },
                "XOR",
                { "author": { "name": ["Ada", "Grace"] } }
            ])),
        )
        .expect("loaded");

    let statements = mock.statements();
    let sql = &statements[0].sql;
    assert!(sql.contains(r#"t.id `t_0`"#), "MySQL labels use backticks: {sql}");
    assert!(
        sql.ends_with("WHERE t.published = ? XOR t__0.name IN (?, ?)"),
        "unexpected where: {sql}"
    );
}

#[test]
fn test_validation_flags_unknown_keys() {
    let schema = blog_schema();
    let issues = validate_criteria(
        &schema,
        "posts",
        &criteria(json!({ "titel": "x", "author": { "nam": "Ada" } })),
    )
    .expect("known table");

    let locations: Vec<_> = issues.iter().map(|issue| issue.location.as_str()).collect();
    assert_eq!(locations, vec!["titel", "author.nam"]);
}

#[test]
fn test_property_keyed_criteria_filter_the_load() {
    let schema = blog_schema();
    let config = OrmConfig::default();
    let mock = MockExecutor::new();

    Loader::new(&schema, &mock, &config)
        .load("posts", &criteria(json!({ "authorId": 10, "published": true })))
        .expect("loaded");

    let statements = mock.statements();
    let statement = &statements[0];
    assert!(
        statement.sql.ends_with("FROM posts t WHERE t.author_id = $1 AND t.published = $2"),
        "unexpected where: {}",
        statement.sql
    );
    assert_eq!(statement.values, vec![json!(10), json!(true)]);
}
