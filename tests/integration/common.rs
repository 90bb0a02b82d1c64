use joinery::schema::{Column, Relationship, Schema, TableDefinition};
use joinery::value::Row;
use serde_json::Value;

/// `authors` 1:n `posts` 1:n `comments`, comments also point at their author
pub fn blog_schema() -> Schema {
    let authors = TableDefinition::new("authors")
        .column(Column::new("id", "id").primary_key().generated())
        .column(Column::new("name", "name"))
        .relationship(Relationship::one_to_many("posts", "id", "posts", "author_id").with_other_relationship("author"));

    let posts = TableDefinition::new("posts")
        .column(Column::new("id", "id").primary_key().generated())
        .column(Column::new("author_id", "authorId"))
        .column(Column::new("title", "title"))
        .column(Column::new("published", "published"))
        .relationship(Relationship::many_to_one("author", "author_id", "authors", "id").with_other_relationship("posts"))
        .relationship(Relationship::one_to_many("comments", "id", "comments", "post_id").with_other_relationship("post"));

    let comments = TableDefinition::new("comments")
        .column(Column::new("id", "id").primary_key().generated())
        .column(Column::new("post_id", "postId"))
        .column(Column::new("author_id", "authorId"))
        .column(Column::new("body", "body"))
        .relationship(Relationship::many_to_one("post", "post_id", "posts", "id").with_other_relationship("comments"))
        .relationship(Relationship::many_to_one("author", "author_id", "authors", "id"));

    Schema::builder()
        .table(authors)
        .table(posts)
        .table(comments)
        .build()
        .expect("blog schema is valid")
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}
