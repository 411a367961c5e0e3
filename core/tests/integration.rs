//! End-to-end tests against the live echo server.
//!
//! # Design
//! Starts the mock server on a random port, then drives a real `Handler`
//! backed by `UreqTransport` over HTTP. The echo routes reflect the request
//! back, so assertions are made on what actually went over the wire.

use std::net::SocketAddr;

use http_handler::config::AuthConfig;
use http_handler::{
    factory, BodyFormat, BodyStyle, Error, GuzzleConfig, Handler, HttpMethod, HttpResponse,
    OptionMap, ResolvedBody, Transport, UreqTransport,
};
use mock_server::Echo;
use serde_json::json;

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

fn config_for(addr: SocketAddr) -> GuzzleConfig {
    GuzzleConfig {
        base_uri: Some(format!("http://{addr}/")),
        ..GuzzleConfig::default()
    }
}

fn echo_of<T: Transport>(handler: &Handler<T>, response: &HttpResponse) -> Echo {
    let body = handler
        .resolve_response_body(response, Some(BodyFormat::Json))
        .unwrap()
        .into_json()
        .unwrap();
    serde_json::from_value(body).unwrap()
}

#[test]
fn verbs_and_options_reach_the_server() {
    let addr = start_server();
    let mut handler = factory::from_config(&config_for(addr)).unwrap();

    // Step 1: every verb shortcut sends its method to the resolved URL.
    let verbs: [(fn(&Handler, &str) -> http_handler::Result<HttpResponse>, &str); 6] = [
        (Handler::get, "GET"),
        (Handler::post, "POST"),
        (Handler::put, "PUT"),
        (Handler::patch, "PATCH"),
        (Handler::delete, "DELETE"),
        (Handler::options, "OPTIONS"),
    ];
    for (call, method) in verbs {
        let response = call(&handler, "echo/items").unwrap();
        let echo = echo_of(&handler, &response);
        assert_eq!(echo.method, method);
        assert_eq!(echo.path, "/echo/items");
    }

    // Step 2: HEAD returns headers only.
    let response = handler.head("echo").unwrap();
    assert_eq!(response.status, 200);
    assert!(response.body.is_empty());

    // Step 3: headers, query and auth are applied.
    handler.set_header("X-Trace", "abc", true);
    handler.set_request_option("query", json!({"page": 2}));
    handler.set_auth("user", "pass", None);
    let echo = echo_of(&handler, &handler.get("echo/search").unwrap());
    assert_eq!(echo.header("x-trace"), Some("abc"));
    assert_eq!(echo.query.as_deref(), Some("page=2"));
    assert_eq!(echo.header("authorization"), Some("Basic dXNlcjpwYXNz"));

    // Step 4: cleared options stop being sent.
    assert!(handler.clear_header("X-Trace"));
    assert!(handler.clear_auth());
    assert!(handler.clear_request_option("query"));
    let echo = echo_of(&handler, &handler.get("echo").unwrap());
    assert_eq!(echo.header("x-trace"), None);
    assert_eq!(echo.header("authorization"), None);
    assert_eq!(echo.query, None);
}

#[test]
fn structured_bodies_are_encoded() {
    let addr = start_server();
    let mut handler = factory::from_config(&config_for(addr)).unwrap();

    handler.set_json_body(json!({"name": "widget"}));
    let echo = echo_of(&handler, &handler.post("echo").unwrap());
    assert_eq!(echo.header("content-type"), Some("application/json"));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&echo.body).unwrap(),
        json!({"name": "widget"})
    );
    assert!(handler.clear_request_option("json"));

    handler.set_form_body(json!({"a": "1 2", "b": "x"}));
    let echo = echo_of(&handler, &handler.post("echo").unwrap());
    assert_eq!(echo.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(echo.body, "a=1+2&b=x");
    assert!(handler.clear_request_option("form_params"));

    handler.set_multipart_body(json!([{"name": "file", "contents": "hello", "filename": "h.txt"}]));
    let echo = echo_of(&handler, &handler.post("echo").unwrap());
    assert!(echo.header("content-type").unwrap().starts_with("multipart/form-data; boundary="));
    assert!(echo.body.contains("name=\"file\"; filename=\"h.txt\""));
    assert!(echo.body.contains("\r\n\r\nhello\r\n"));
}

#[test]
fn raw_body_style_sends_content_type_and_body() {
    let addr = start_server();
    let mut handler = factory::from_config_with(&config_for(addr), |client| {
        Ok(UreqTransport::new(client)?.with_body_style(BodyStyle::Raw))
    })
    .unwrap();

    handler.set_form_body(json!({"a": "1"}));
    assert!(handler.request_options().get("form_params").is_none());
    let echo = echo_of(&handler, &handler.post("echo").unwrap());
    assert_eq!(echo.header("content-type"), Some("application/x-www-form-urlencoded"));
    assert_eq!(echo.body, "a=1");
}

#[test]
fn error_statuses_and_decoding() {
    let addr = start_server();
    let mut handler = factory::from_config(&config_for(addr)).unwrap();

    let err = handler.get("status/503").unwrap_err();
    assert!(matches!(err, Error::Status { status: 503, ref body } if body == "status 503"));

    handler.set_request_option("http_errors", false);
    let response = handler.get("status/404").unwrap();
    assert_eq!(response.status, 404);

    let response = handler.get("json").unwrap();
    let body = handler.resolve_response_body(&response, Some(BodyFormat::Json)).unwrap();
    assert_eq!(body, ResolvedBody::Json(json!({"a": 1})));
    let raw = handler.resolve_response_body(&response, None).unwrap();
    assert_eq!(raw, ResolvedBody::Raw(br#"{"a":1}"#.to_vec()));

    let response = handler.get("malformed").unwrap();
    let err = handler.resolve_response_body(&response, Some(BodyFormat::Json)).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
}

#[test]
fn dispatch_matches_request() {
    let addr = start_server();
    let handler = factory::from_config(&config_for(addr)).unwrap();

    let via_dispatch = echo_of(&handler, &handler.dispatch("purge", &["echo/cache"]).unwrap());
    let via_request = echo_of(
        &handler,
        &handler.request(HttpMethod::Custom("PURGE".to_string()), "echo/cache").unwrap(),
    );
    assert_eq!(via_dispatch, via_request);
    assert_eq!(via_dispatch.method, "PURGE");

    let err = handler.dispatch("purge", &[]).unwrap_err();
    assert!(matches!(err, Error::InvalidCall { .. }));
}

#[test]
fn configured_credentials_are_sent() {
    let addr = start_server();
    let config = GuzzleConfig {
        auth: AuthConfig {
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            method: Some("basic".to_string()),
        },
        ..config_for(addr)
    };
    let handler = factory::from_config(&config).unwrap();
    let echo = echo_of(&handler, &handler.get("echo").unwrap());
    assert_eq!(echo.header("authorization"), Some("Basic dXNlcjpwYXNz"));
}

#[test]
fn absolute_uri_without_base() {
    let addr = start_server();
    let handler = Handler::new(OptionMap::new(), OptionMap::new()).unwrap();
    let echo = echo_of(&handler, &handler.get(&format!("http://{addr}/echo/abs")).unwrap());
    assert_eq!(echo.path, "/echo/abs");
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let handler = factory::from_config(&config_for(addr)).unwrap();
    let err = handler.get("echo").unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}
