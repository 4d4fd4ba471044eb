use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use fleetcmd_core::{ACK_MESSAGE, ACK_OK, AckEnvelope, OPEN_DOOR, Timestamp, build};
use fleetcmd_responder::{ResponderOptions, router, serve};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const SAMPLE: &str =
    r#"{"version":"v1.0","VIN":"12345678","command":"openDoor","seconds":10,"nanoseconds":500}"#;

fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .unwrap()
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn sample_command_is_acknowledged() {
    let response = router(ResponderOptions::default())
        .oneshot(post("/v1.0/12345678/openDoor", SAMPLE))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack: AckEnvelope = serde_json::from_slice(&read_body(response).await).unwrap();
    assert_eq!(ack.status, ACK_OK);
    assert_eq!(ack.message, ACK_MESSAGE);
    assert!((0..1_000_000_000).contains(&ack.receipt_nanoseconds));
}

#[tokio::test]
async fn malformed_body_gets_400() {
    let response = router(ResponderOptions::default())
        .oneshot(post("/v1.0/12345678/openDoor", "{\"version\":"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = read_body(response).await;
    assert!(serde_json::from_slice::<AckEnvelope>(&body).is_err());
}

#[tokio::test]
async fn non_envelope_json_gets_400() {
    for body in ["[]", "42", "\"openDoor\"", r#"{"status":"ok"}"#, ""] {
        let response = router(ResponderOptions::default())
            .oneshot(post("/v1/1/openDoor", body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body:?}");
    }
}

#[tokio::test]
async fn missing_content_type_is_still_parsed() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1.0/12345678/openDoor")
        .body(Body::from(SAMPLE))
        .unwrap();

    let response = router(ResponderOptions::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn path_segments_are_not_cross_checked_by_default() {
    let response = router(ResponderOptions::default())
        .oneshot(post("/v7/00000000/closeWindow", SAMPLE))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let ack: AckEnvelope = serde_json::from_slice(&read_body(response).await).unwrap();
    assert!(ack.is_ok());
}

#[tokio::test]
async fn strict_path_rejects_mismatch() {
    let options = ResponderOptions {
        strict_path: true,
        ..ResponderOptions::default()
    };

    let mismatch = router(options)
        .oneshot(post("/v1.0/12345678/closeWindow", SAMPLE))
        .await
        .unwrap();
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);

    let matching = router(options)
        .oneshot(post("/v1.0/12345678/openDoor", SAMPLE))
        .await
        .unwrap();
    assert_eq!(matching.status(), StatusCode::OK);
}

#[tokio::test]
async fn get_is_not_routed() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/v1.0/12345678/openDoor")
        .body(Body::empty())
        .unwrap();

    let response = router(ResponderOptions::default()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn rejection_does_not_affect_later_requests() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn(serve(listener, ResponderOptions::default(), shutdown.clone()));

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/v1.0/12345678/{OPEN_DOOR}");

    let bad = client.post(&url).body("garbage").send().await.unwrap();
    assert_eq!(bad.status().as_u16(), 400);

    let envelope = build("12345678", "v1.0", OPEN_DOOR, Timestamp::new(10, 500));
    let good = client.post(&url).json(&envelope).send().await.unwrap();
    assert_eq!(good.status().as_u16(), 200);
    let ack: AckEnvelope = good.json().await.unwrap();
    assert!(ack.is_ok());

    shutdown.cancel();
    server.await.unwrap().unwrap();
}
