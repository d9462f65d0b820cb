mod common;

#[cfg(test)]
mod tests {
    use super::common::test_utils::TestDb;
    use axum::{
        Router,
        body::{self, Body},
        http::{Request, StatusCode},
    };
    use bucket_bloom_rs::api::create_router;
    use bucket_bloom_rs::{
        AppState, FilterStore, RedbSnapshotStore, ServerConfigBuilder,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::util::ServiceExt;

    fn setup_test_app(snapshot_path: Option<String>) -> Router {
        let config = ServerConfigBuilder::default()
            .table_size(100_000)
            .snapshot_path(snapshot_path)
            .build()
            .unwrap();

        let snapshots = config
            .snapshot_path
            .as_ref()
            .map(|path| RedbSnapshotStore::open(path).unwrap());
        let store = FilterStore::new(config.filter_config()).unwrap();
        let state = Arc::new(AppState { store, snapshots });

        create_router(state)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = setup_test_app(None);
        let (status, _) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_insert_and_check() {
        let app = setup_test_app(None);

        let (status, body) = send(
            &app,
            "POST",
            "/filters/k/items",
            Some(json!({ "value": "apple" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": 1 }));

        let (_, body) = send(&app, "GET", "/filters/k/items/apple", None).await;
        assert_eq!(body, json!({ "reply": 1 }));

        let (_, body) = send(&app, "GET", "/filters/k/items/banana", None).await;
        assert_eq!(body, json!({ "reply": 0 }));
    }

    #[tokio::test]
    async fn test_time_and_bucket_endpoints() {
        let app = setup_test_app(None);
        send(&app, "POST", "/filters/k/items", Some(json!({ "value": "old" })))
            .await;

        let (status, body) =
            send(&app, "PUT", "/filters/k/time", Some(json!({ "time": 5 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": 1 }));

        send(&app, "POST", "/filters/k/items", Some(json!({ "value": "apple" })))
            .await;
        let (_, body) = send(&app, "GET", "/filters/k", None).await;
        assert_eq!(body, json!({ "reply": "current time: 5" }));

        let (_, body) = send(&app, "DELETE", "/filters/k/buckets/133", None).await;
        assert_eq!(body, json!({ "reply": 1 }));

        let (_, body) = send(&app, "GET", "/filters/k/items/apple", None).await;
        assert_eq!(body, json!({ "reply": 0 }));
        let (_, body) = send(&app, "GET", "/filters/k/items/old", None).await;
        assert_eq!(body, json!({ "reply": 1 }));

        let (_, body) = send(&app, "POST", "/filters/k/time/advance", None).await;
        assert_eq!(body, json!({ "reply": 1 }));
        let (_, body) = send(&app, "GET", "/filters/k", None).await;
        assert_eq!(body, json!({ "reply": "current time: 6" }));
    }

    #[tokio::test]
    async fn test_absent_key_reports_zero() {
        let app = setup_test_app(None);
        for (method, uri) in [
            ("GET", "/filters/none/items/x"),
            ("POST", "/filters/none/time/advance"),
            ("DELETE", "/filters/none/buckets/1"),
            ("GET", "/filters/none"),
            ("DELETE", "/filters/none"),
        ] {
            let (status, body) = send(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::OK, "{method} {uri}");
            assert_eq!(body, json!({ "reply": 0 }), "{method} {uri}");
        }

        let (status, _) = send(&app, "GET", "/filters/none/stats", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_bad_arguments_are_400() {
        let app = setup_test_app(None);
        send(&app, "POST", "/filters/k/items", Some(json!({ "value": "a" }))).await;

        let (status, _) =
            send(&app, "DELETE", "/filters/k/buckets/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) =
            send(&app, "PUT", "/filters/k/time", Some(json!({ "time": -4 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/command",
            Some(json!({ "args": ["BBF.SETTIME", "k", "later"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("later"));

        let (status, _) = send(
            &app,
            "POST",
            "/command",
            Some(json!({ "args": ["BBF.ADD", "k"] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = send(&app, "GET", "/filters/k", None).await;
        assert_eq!(body, json!({ "reply": "current time: 0" }));
    }

    #[tokio::test]
    async fn test_raw_command_endpoint() {
        let app = setup_test_app(None);
        let (status, body) = send(
            &app,
            "POST",
            "/command",
            Some(json!({ "args": ["bbf.add", "k", "apple"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "reply": 1 }));

        let (_, body) = send(
            &app,
            "POST",
            "/command",
            Some(json!({ "args": ["BBF.INFO", "k"] })),
        )
        .await;
        assert_eq!(body, json!({ "reply": "current time: 0" }));

        let (_, body) = send(&app, "GET", "/filters/k/stats", None).await;
        assert_eq!(body["stats"]["occupied_slots"], json!(1));
        assert_eq!(body["stats"]["table_size"], json!(100_000));
    }

    #[tokio::test]
    async fn test_delete_filter() {
        let app = setup_test_app(None);
        send(&app, "POST", "/filters/k/items", Some(json!({ "value": "a" }))).await;

        let (_, body) = send(&app, "DELETE", "/filters/k", None).await;
        assert_eq!(body, json!({ "reply": 1 }));
        let (_, body) = send(&app, "GET", "/filters/k/items/a", None).await;
        assert_eq!(body, json!({ "reply": 0 }));
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let app = setup_test_app(None);
        let (status, _) = send(&app, "POST", "/snapshot", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let test_db = TestDb::new("server_snapshot");
        let app = setup_test_app(Some(test_db.path_string()));
        send(&app, "POST", "/filters/k/items", Some(json!({ "value": "a" }))).await;

        let (status, body) = send(&app, "POST", "/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "filters": 1 }));
    }
}
