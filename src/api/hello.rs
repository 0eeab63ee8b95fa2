#![forbid(unsafe_code)]

use poem::web::Json;
use poem::{Endpoint, IntoResponse, Request, Response};
use serde::Serialize;

use crate::utils::web_utils;

// ***************************************************************************
//                          Request/Response Definiions
// ***************************************************************************
/** The catch-all greeting endpoint.  The message is captured once at
 * construction from the runtime configuration; requests never consult
 * process-wide state.
 */
#[derive(Clone)]
pub struct HelloApi {
    message: Option<String>,
}

#[derive(Serialize)]
struct RespHello
{
    message: Option<String>,
}

// ***************************************************************************
//                               Endpoint
// ***************************************************************************
// The greeting answers every remaining path and every method, so it is a raw
// endpoint rather than an OpenAPI operation, which would pin both.
impl Endpoint for HelloApi {
    type Output = Response;

    async fn call(&self, http_req: Request) -> poem::Result<Self::Output> {
        // Conditional logging depending on log level.
        web_utils::trace_request(&http_req);

        Ok(RespHello::new(self.message.clone()).into_response())
    }
}

impl HelloApi {
    pub fn new(message: Option<String>) -> Self {
        Self { message }
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl RespHello {
    fn new(message: Option<String>) -> Self {
        Self { message }
    }
}

impl IntoResponse for RespHello {
    /// Render the greeting with caching disabled so every client reaches the
    /// live service rather than a cached copy.
    fn into_response(self) -> Response {
        Json(self)
            .with_header("Cache-Control", "no-store")
            .into_response()
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use log::LevelFilter;
    use poem::test::TestClient;
    use poem::Route;

    /** Mirror the route registration used in main. */
    fn test_app(message: Option<&str>) -> TestClient<Route> {
        let hello = HelloApi::new(message.map(|m| m.to_string()));
        let app = Route::new()
            .at("/", hello.clone())
            .at("/*path", hello);
        TestClient::new(app)
    }

    #[tokio::test]
    async fn any_path_returns_200_with_no_store() {
        let cli = test_app(Some("hi"));
        for path in ["/", "/anything", "/a/b/c", "/version-adjacent"] {
            let resp = cli.get(path).send().await;
            resp.assert_status_is_ok();
            resp.assert_header("cache-control", "no-store");
        }
    }

    #[tokio::test]
    async fn any_method_returns_the_greeting() {
        let cli = test_app(Some("hi"));

        let resp = cli.post("/submit").send().await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("message").assert_string("hi");

        let resp = cli.delete("/thing/1").send().await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("message").assert_string("hi");
    }

    #[tokio::test]
    async fn configured_message_is_returned_verbatim() {
        let cli = test_app(Some("Hello Dev"));
        let resp = cli.get("/").send().await;
        resp.json().await.value().object().get("message").assert_string("Hello Dev");
    }

    #[tokio::test]
    async fn missing_message_is_null_not_an_error() {
        let cli = test_app(None);
        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        resp.json().await.value().object().get("message").assert_null();
    }

    #[tokio::test]
    async fn trace_logging_does_not_alter_the_response() {
        let saved = log::max_level();
        log::set_max_level(LevelFilter::Trace);

        let cli = test_app(Some("hi"));
        let resp = cli
            .get("/traced")
            .header("x-repeated", "a")
            .header("x-repeated", "b")
            .send()
            .await;

        log::set_max_level(saved);
        resp.assert_status_is_ok();
        resp.assert_header("cache-control", "no-store");
        resp.json().await.value().object().get("message").assert_string("hi");
    }

    #[tokio::test]
    async fn concurrent_requests_get_isolated_responses() {
        let cli = test_app(Some("hi"));
        let requests = (0..100).map(|i| cli.get(format!("/load/{}", i)).send());
        for resp in join_all(requests).await {
            resp.assert_status_is_ok();
            resp.json().await.value().object().get("message").assert_string("hi");
        }
    }

    #[test]
    fn greeting_body_matches_configured_value_exactly() {
        let body = serde_json::to_string(&RespHello::new(Some("hi".to_string())))
            .expect("greeting should serialize");
        assert_eq!(body, r#"{"message":"hi"}"#);
    }

    #[test]
    fn null_message_serializes_to_json_null() {
        let body = serde_json::to_string(&RespHello::new(None))
            .expect("greeting should serialize");
        assert_eq!(body, r#"{"message":null}"#);
    }
}
