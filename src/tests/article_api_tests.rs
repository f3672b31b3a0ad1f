#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{json, Value};

    use crate::models::{ArticleTag, STATE_DISABLED, STATE_ENABLED};
    use crate::repo::ArticleRepo;
    use crate::tests::support::{field_errors, json_request, send_to, setup_test_app, TestApp};

    fn tag_ids(article: &Value) -> Vec<i64> {
        article["tags"].as_array().unwrap().iter().map(|t| t["id"].as_i64().unwrap()).collect()
    }

    async fn create_article(t: &TestApp, tags: &[i64]) -> Value {
        let (status, body) = t
            .post_json(
                "/api/v1/article",
                json!({
                    "title": "Hello blog",
                    "description": "first post",
                    "content": "# Hello",
                    "cover_image_url": "http://blog.test/c/static/cover.png",
                    "created_by": "alice",
                    "tag_ids": tags,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body
    }

    async fn links(t: &TestApp, article_id: i64) -> Vec<ArticleTag> {
        ArticleRepo::new(t.state.data.db()).associations(article_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_article_with_tags() {
        let t = setup_test_app().await;
        let go = t.create_tag("golang").await;
        let rust = t.create_tag("rust").await;

        let created = create_article(&t, &[rust, go, rust]).await;
        assert_eq!(created["state"], 1);
        assert_eq!(created["created_by"], "alice");
        assert_eq!(tag_ids(&created), vec![go, rust]);
        assert_eq!(created["tags"][0]["name"], "golang");

        let id = created["id"].as_i64().unwrap();
        let (status, fetched) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let rows = links(&t, id).await;
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!((row.state, row.updated_by), (STATE_ENABLED, 0));
            assert_eq!(row.created_by, "alice");
            assert!(row.deleted_at.is_none());
        }
    }

    #[tokio::test]
    async fn test_create_with_unknown_tag_writes_nothing() {
        let t = setup_test_app().await;
        let go = t.create_tag("golang").await;

        let (status, body) = t
            .post_json(
                "/api/v1/article",
                json!({ "title": "Hello", "content": "x", "created_by": "alice", "tag_ids": [go, 999] }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"]["message"].as_str().unwrap().contains("999"));
        assert_eq!(t.count("SELECT COUNT(*) FROM article").await, 0);
        assert_eq!(t.count("SELECT COUNT(*) FROM article_tag").await, 0);
    }

    #[tokio::test]
    async fn test_create_with_deleted_tag_is_rejected() {
        let t = setup_test_app().await;
        let go = t.create_tag("golang").await;
        t.delete(&format!("/api/v1/tag/{}", go)).await;

        let (status, _) = t
            .post_json(
                "/api/v1/article",
                json!({ "title": "Hello", "content": "x", "created_by": "alice", "tag_ids": [go] }),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let t = setup_test_app().await;

        let (status, body) = t.post_json("/api/v1/article", json!({ "title": "Hello", "created_by": "alice" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("content".to_string(), "required".to_string())]);

        let (status, body) = t
            .post_json(
                "/api/v1/article",
                json!({ "title": "Hello", "content": "x", "created_by": "alice", "state": 3, "tag_ids": [0] }),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(field_errors(&body), vec![("state".to_string(), "range".to_string())]);
        assert_eq!(t.count("SELECT COUNT(*) FROM article").await, 0);
    }

    #[tokio::test]
    async fn test_update_replaces_tag_set() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let b = t.create_tag("rust").await;
        let c = t.create_tag("python").await;
        let created = create_article(&t, &[a, b]).await;
        let id = created["id"].as_i64().unwrap();
        let before = links(&t, id).await;
        t.get(&format!("/api/v1/article/{}", id)).await;

        let (status, updated) = t
            .put_json(&format!("/api/v1/article/{}", id), json!({ "updated_by": "bob", "tag_ids": [b, c] }))
            .await;
        assert_eq!(status, StatusCode::OK, "{}", updated);
        assert_eq!(tag_ids(&updated), vec![b, c]);
        assert_eq!(updated["updated_by"], "bob");
        assert_eq!(updated["title"], "Hello blog");

        let after = links(&t, id).await;
        assert_eq!(after.len(), 3);
        let dropped = after.iter().find(|r| r.tag_id == a).unwrap();
        assert_eq!(dropped.state, STATE_DISABLED);
        assert!(dropped.deleted_at.is_some());
        let kept = after.iter().find(|r| r.tag_id == b).unwrap();
        assert_eq!(kept, before.iter().find(|r| r.tag_id == b).unwrap());
        let added = after.iter().find(|r| r.tag_id == c).unwrap();
        assert_eq!((added.state, added.updated_by), (STATE_ENABLED, 0));
        assert!(added.deleted_at.is_none());
        assert_eq!(added.created_by, "bob");

        // Cached copy was evicted.
        let (_, fetched) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(tag_ids(&fetched), vec![b, c]);
    }

    #[tokio::test]
    async fn test_update_reattaches_previously_dropped_tag() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let id = create_article(&t, &[a]).await["id"].as_i64().unwrap();

        t.put_json(&format!("/api/v1/article/{}", id), json!({ "tag_ids": [] })).await;
        let (status, updated) = t.put_json(&format!("/api/v1/article/{}", id), json!({ "tag_ids": [a] })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(tag_ids(&updated), vec![a]);
        assert_eq!(t.count("SELECT COUNT(*) FROM article_tag WHERE deleted_at IS NULL").await, 1);
        assert_eq!(t.count("SELECT COUNT(*) FROM article_tag").await, 2);
    }

    #[tokio::test]
    async fn test_update_without_tag_ids_keeps_tags() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let id = create_article(&t, &[a]).await["id"].as_i64().unwrap();

        let (status, updated) = t.put_json(&format!("/api/v1/article/{}", id), json!({ "state": 0 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["state"], 0);
        assert_eq!(tag_ids(&updated), vec![a]);
    }

    #[tokio::test]
    async fn test_update_with_unknown_tag_rolls_back() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let id = create_article(&t, &[a]).await["id"].as_i64().unwrap();

        let (status, _) = t
            .put_json(&format!("/api/v1/article/{}", id), json!({ "title": "Changed", "tag_ids": [404] }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, fetched) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(fetched["title"], "Hello blog");
        assert_eq!(tag_ids(&fetched), vec![a]);
    }

    #[tokio::test]
    async fn test_delete_article_detaches_tags() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let id = create_article(&t, &[a]).await["id"].as_i64().unwrap();
        t.get(&format!("/api/v1/article/{}", id)).await;

        let (status, _) = t.delete(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = t.delete(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(links(&t, id).await.iter().all(|r| r.state == STATE_DISABLED && r.deleted_at.is_some()));
    }

    #[tokio::test]
    async fn test_deleting_tag_removes_it_from_cached_article() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let b = t.create_tag("rust").await;
        let id = create_article(&t, &[a, b]).await["id"].as_i64().unwrap();
        let (_, cached) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(tag_ids(&cached), vec![a, b]);

        let (status, _) = t.delete(&format!("/api/v1/tag/{}", a)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, fetched) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(tag_ids(&fetched), vec![b]);
        let dropped = links(&t, id).await.into_iter().find(|r| r.tag_id == a).unwrap();
        assert_eq!(dropped.state, STATE_DISABLED);
        assert!(dropped.deleted_at.is_some());
    }

    #[tokio::test]
    async fn test_renaming_tag_refreshes_cached_article() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let id = create_article(&t, &[a]).await["id"].as_i64().unwrap();
        t.get(&format!("/api/v1/article/{}", id)).await;

        t.put_json(&format!("/api/v1/tag/{}", a), json!({ "name": "go" })).await;

        let (_, fetched) = t.get(&format!("/api/v1/article/{}", id)).await;
        assert_eq!(fetched["tags"][0]["name"], "go");
    }

    #[tokio::test]
    async fn test_list_articles_by_tag_and_state() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;
        let b = t.create_tag("rust").await;
        let first = create_article(&t, &[a]).await["id"].as_i64().unwrap();
        let second = create_article(&t, &[a, b]).await["id"].as_i64().unwrap();
        let third = create_article(&t, &[]).await["id"].as_i64().unwrap();
        t.put_json(&format!("/api/v1/article/{}", third), json!({ "state": 0 })).await;

        let (status, all) = t.get("/api/v1/article").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all["total"], 3);
        assert_eq!(all["page"], 1);
        assert_eq!(all["page_size"], 10);

        let (_, tagged) = t.get(&format!("/api/v1/article?tag_id={}", a)).await;
        let ids: Vec<i64> = tagged["items"].as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![second, first]);
        assert_eq!(tag_ids(&tagged["items"][0]), vec![a, b]);

        let (_, hidden) = t.get("/api/v1/article?state=0").await;
        assert_eq!(hidden["total"], 1);
        assert_eq!(hidden["items"][0]["id"], third);

        let (status, _) = t.get("/api/v1/article?tag_id=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_all_succeed() {
        let t = setup_test_app().await;
        let tag = t.create_tag("golang").await;

        let mut handles = Vec::new();
        for i in 0..40 {
            let app = t.app.clone();
            let body = json!({ "title": format!("post {}", i), "content": "x", "created_by": "alice", "tag_ids": [tag] });
            handles.push(tokio::spawn(async move {
                send_to(app, json_request(Method::POST, "/api/v1/article", &body)).await
            }));
        }
        for handle in handles {
            let (status, body) = handle.await.unwrap();
            assert_eq!(status, StatusCode::CREATED, "{}", body);
        }

        assert_eq!(t.count("SELECT COUNT(*) FROM article").await, 40);
        assert_eq!(t.count("SELECT COUNT(*) FROM article_tag WHERE deleted_at IS NULL").await, 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_updates_attach_tag_once() {
        let t = setup_test_app().await;
        let a = t.create_tag("golang").await;

        for _ in 0..10 {
            let id = create_article(&t, &[]).await["id"].as_i64().unwrap();
            let uri = format!("/api/v1/article/{}", id);
            let body = json!({ "updated_by": "bob", "tag_ids": [a] });

            let first = tokio::spawn(send_to(t.app.clone(), json_request(Method::PUT, &uri, &body)));
            let second = tokio::spawn(send_to(t.app.clone(), json_request(Method::PUT, &uri, &body)));
            for handle in [first, second] {
                let (status, body) = handle.await.unwrap();
                assert!(status == StatusCode::OK || status == StatusCode::CONFLICT, "{} {}", status, body);
            }

            let live = links(&t, id).await.into_iter().filter(|r| r.deleted_at.is_none()).count();
            assert_eq!(live, 1);
        }
    }
}
