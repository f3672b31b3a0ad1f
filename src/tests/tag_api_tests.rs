#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, Method, Request, StatusCode},
    };
    use serde_json::json;

    use crate::tests::support::{field_errors, setup_test_app};

    #[tokio::test]
    async fn test_create_then_get_tag() {
        let t = setup_test_app().await;

        let (status, created) = t
            .post_json("/api/v1/tag", json!({ "name": "golang", "created_by": "alice", "updated_by": "alice" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "golang");
        assert_eq!(created["status"], 0);
        assert_eq!(created["created_by"], "alice");

        let id = created["id"].as_i64().unwrap();
        let (status, fetched) = t.get(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_get_tag_is_served_from_cache_second_time() {
        let t = setup_test_app().await;
        let id = t.create_tag("rust").await;

        t.get(&format!("/api/v1/tag/{}", id)).await;
        t.get(&format!("/api/v1/tag/{}", id)).await;

        let m = t.state.metrics.get_snapshot();
        assert_eq!(m.cache_misses, 1);
        assert_eq!(m.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_create_accepts_title_alias() {
        let t = setup_test_app().await;
        let (status, body) = t
            .post_json("/api/v1/tag", json!({ "title": "golang", "created_by": "alice", "updated_by": "alice" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "golang");
    }

    #[tokio::test]
    async fn test_create_short_name_is_rejected_and_nothing_written() {
        let t = setup_test_app().await;

        let (status, body) = t
            .post_json("/api/v1/tag", json!({ "name": "g", "created_by": "alice", "updated_by": "alice" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("name".to_string(), "length".to_string())]);
        assert_eq!(t.count("SELECT COUNT(*) FROM tag").await, 0);
    }

    #[tokio::test]
    async fn test_create_missing_fields_are_reported_per_field() {
        let t = setup_test_app().await;

        let (status, body) = t.post_json("/api/v1/tag", json!({ "name": "golang" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            field_errors(&body),
            vec![
                ("created_by".to_string(), "required".to_string()),
                ("updated_by".to_string(), "required".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let t = setup_test_app().await;

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/tag")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let (status, body) = t.send(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_non_numeric_and_zero_ids_are_rejected() {
        let t = setup_test_app().await;

        let (status, body) = t.get("/api/v1/tag/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("id".to_string(), "numeric".to_string())]);

        let (status, body) = t.get("/api/v1/tag/0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("id".to_string(), "range".to_string())]);
    }

    #[tokio::test]
    async fn test_get_missing_tag_is_not_found() {
        let t = setup_test_app().await;
        let (status, body) = t.get("/api/v1/tag/42").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_update_status_out_of_range_leaves_tag_unchanged() {
        let t = setup_test_app().await;
        let id = t.create_tag("golang").await;

        let (status, body) = t.put_json(&format!("/api/v1/tag/{}", id), json!({ "status": 2 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("status".to_string(), "range".to_string())]);

        let (_, fetched) = t.get(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(fetched["status"], 0);
    }

    #[tokio::test]
    async fn test_partial_update_keeps_absent_fields() {
        let t = setup_test_app().await;
        let id = t.create_tag("golang").await;
        // Populate the cache so the update has something to evict.
        t.get(&format!("/api/v1/tag/{}", id)).await;

        let (status, updated) =
            t.put_json(&format!("/api/v1/tag/{}", id), json!({ "status": 1, "updated_by": "bob" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["name"], "golang");
        assert_eq!(updated["status"], 1);
        assert_eq!(updated["created_by"], "alice");
        assert_eq!(updated["updated_by"], "bob");

        let (_, fetched) = t.get(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(fetched["status"], 1);
        assert_eq!(fetched["updated_by"], "bob");
    }

    #[tokio::test]
    async fn test_update_present_but_empty_name_is_invalid() {
        let t = setup_test_app().await;
        let id = t.create_tag("golang").await;

        let (status, body) = t.put_json(&format!("/api/v1/tag/{}", id), json!({ "name": "" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("name".to_string(), "length".to_string())]);
    }

    #[tokio::test]
    async fn test_update_missing_tag_is_not_found() {
        let t = setup_test_app().await;
        let (status, _) = t.put_json("/api/v1/tag/7", json!({ "status": 1 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_is_soft_and_hides_the_tag() {
        let t = setup_test_app().await;
        let id = t.create_tag("golang").await;
        t.get(&format!("/api/v1/tag/{}", id)).await;

        let (status, body) = t.delete(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());

        let (status, _) = t.get(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.delete(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.put_json(&format!("/api/v1/tag/{}", id), json!({ "status": 1 })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The row stays, marked deleted.
        assert_eq!(t.count("SELECT COUNT(*) FROM tag WHERE deleted_at IS NOT NULL").await, 1);
    }

    #[tokio::test]
    async fn test_list_tags_paginates_and_filters() {
        let t = setup_test_app().await;
        let go = t.create_tag("golang").await;
        t.create_tag("rust").await;
        let gone = t.create_tag("python").await;
        t.put_json(&format!("/api/v1/tag/{}", go), json!({ "status": 1 })).await;
        t.delete(&format!("/api/v1/tag/{}", gone)).await;

        let (status, page) = t.get("/api/v1/tag?page=1&page_size=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 2);
        assert_eq!(page["page_size"], 1);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["name"], "golang");

        let (_, page) = t.get("/api/v1/tag?page=2&page_size=1").await;
        assert_eq!(page["items"][0]["name"], "rust");

        let (_, enabled) = t.get("/api/v1/tag?status=1").await;
        assert_eq!(enabled["total"], 1);
        assert_eq!(enabled["items"][0]["id"], go);

        let (_, by_name) = t.get("/api/v1/tag?name=rust").await;
        assert_eq!(by_name["total"], 1);

        let (status, body) = t.get("/api/v1/tag?page_size=500").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("page_size".to_string(), "range".to_string())]);
    }

    #[tokio::test]
    async fn test_failed_tag_update_writes_nothing() {
        let t = setup_test_app().await;
        let id = t.create_tag("golang").await;
        // Breaks the attached-articles lookup that precedes the write.
        sqlx::query("DROP TABLE article_tag").execute(t.state.data.db()).await.unwrap();

        let (status, body) = t.put_json(&format!("/api/v1/tag/{}", id), json!({ "name": "go" })).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");

        let (_, tag) = t.get(&format!("/api/v1/tag/{}", id)).await;
        assert_eq!(tag["name"], "golang");
    }
}
