//! In-memory client tests.

use serde_json::json;
use weft_core::{HttpError, NoopAccessLog, RequestContext};
use weft_middleware::stages::{BodyParser, BODY};
use weft_middleware::{Flow, Pipeline};
use weft_router::{Reply, RouteView, Router};
use weft_test::{TestClient, TestError};

fn app() -> Pipeline {
    let mut router = Router::new();
    router
        .get("/users/:id", |view: RouteView| async move {
            let id = view.param("id").unwrap_or_default().to_string();
            Reply::json(&json!({ "id": id }))
        })
        .unwrap();
    router
        .post("/users", |view: RouteView| async move {
            let name = view
                .get(&BODY)
                .and_then(|body| body.as_json())
                .and_then(|json| json["name"].as_str())
                .ok_or_else(|| HttpError::bad_request("name required"))?
                .to_string();
            Ok(Reply::text(format!("created {name}")).status(201))
        })
        .unwrap();
    router
        .get("/whoami", |view: RouteView| async move {
            Ok(view.header("x-user").unwrap_or("anonymous").to_string())
        })
        .unwrap();

    Pipeline::builder()
        .register(BodyParser::new(), 10)
        .stage(router.into_stage())
        .access_log(NoopAccessLog)
        .build()
}

#[tokio::test]
async fn test_get_json() {
    let client = TestClient::new(app());
    let response = client.get("/users/42").send().await.unwrap();

    response
        .assert_status_code(200)
        .assert_reason("OK")
        .assert_header("content-type", "application/json")
        .assert_json_eq(&json!({ "id": "42" }));

    let value: serde_json::Value = response.json().unwrap();
    assert_eq!(value["id"], "42");
}

#[tokio::test]
async fn test_post_json_body() {
    let client = TestClient::new(app());
    let response = client
        .post("/users")
        .json(&json!({ "name": "Ada" }))
        .send()
        .await
        .unwrap();

    response
        .assert_status_code(201)
        .assert_reason("Created")
        .assert_body_eq("created Ada");
}

#[tokio::test]
async fn test_handler_error_reaches_client() {
    let client = TestClient::new(app());
    let response = client
        .post("/users")
        .json(&json!({ "nickname": "Ada" }))
        .send()
        .await
        .unwrap();

    response
        .assert_status_code(400)
        .assert_reason("name required")
        .assert_body_eq("name required");
}

#[tokio::test]
async fn test_fallback_404() {
    let client = TestClient::new(app());
    let response = client.delete("/users/1").send().await.unwrap();

    response
        .assert_status_code(404)
        .assert_reason("Not Found")
        .assert_body_eq("Cannot DELETE /users/1");
}

#[tokio::test]
async fn test_default_headers() {
    let client = TestClient::new(app()).with_default_header("x-user", "alice");
    let response = client.get("/whoami").send().await.unwrap();
    response.assert_body_eq("alice");

    let response = client
        .get("/whoami")
        .header("x-trace", "1")
        .send()
        .await
        .unwrap();
    response.assert_body_contains("alice");
}

#[tokio::test]
async fn test_form_body() {
    let pipeline = Pipeline::builder()
        .register(BodyParser::new(), 10)
        .register_fn("echo", 0, |ctx: RequestContext| async move {
            let summary = ctx
                .get(&BODY)
                .map(|body| {
                    format!(
                        "{}/{}",
                        body.field("theme").unwrap_or("-"),
                        body.field("lang").unwrap_or("-")
                    )
                })
                .unwrap_or_default();
            ctx.response().send(summary)?;
            Ok(Flow::Continue(ctx))
        })
        .access_log(NoopAccessLog)
        .build();

    let client = TestClient::new(pipeline);
    let response = client
        .put("/settings")
        .form(&[("theme", "dark"), ("lang", "en")])
        .send()
        .await
        .unwrap();
    response.assert_body_eq("dark/en");
}

#[tokio::test]
async fn test_invalid_uri_is_reported() {
    let client = TestClient::new(app());
    let err = client.get("not a uri").send().await.unwrap_err();
    assert!(matches!(err, TestError::RequestBuild(_)));
}
