use std::sync::Arc;

use joinery::criteria::Criteria;
use joinery::unjoin::unjoin_rows;
use serde_json::json;

use crate::common::{blog_schema, row};

#[test]
fn test_reconstruction_in_parallel_coroutines() {
    let schema = Arc::new(blog_schema());
    let criteria = Arc::new(Criteria::try_from(json!({ "comments": { "@load": true } })).expect("valid criteria"));

    let handles: Vec<_> = (0..8i64)
        .map(|post| {
            let schema = Arc::clone(&schema);
            let criteria = Arc::clone(&criteria);
            may::go!(move || {
                let rows: Vec<_> = (0..post)
                    .map(|comment| row(json!({ "t_0": post, "t__1_0": post * 100 + comment, "t__1_1": post })))
                    .collect();
                let unjoined = unjoin_rows(&schema, "posts", &rows, &criteria, "t").expect("unjoined");
                (post, unjoined.to_json().expect("acyclic"))
            })
        })
        .collect();

    for handle in handles {
        let (post, rendered) = handle.join().expect("coroutine finished");
        if post == 0 {
            assert_eq!(rendered, json!([]), "no rows, no entities");
            continue;
        }
        let comments = rendered[0]["comments"].as_array().map(Vec::len);
        assert_eq!(comments, Some(post as usize), "post {post} keeps its own comments");
    }
}
