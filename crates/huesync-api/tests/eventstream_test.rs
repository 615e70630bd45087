// Event stream over the reqwest transport, served by wiremock.

use std::sync::Arc;

use futures_util::StreamExt;
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use huesync_api::eventstream::parse_frame;
use huesync_api::{Endpoint, Error, EventStreamClient, ReqwestTransport, StreamEventKind};

async fn setup() -> (MockServer, EventStreamClient) {
    let server = MockServer::start().await;
    let endpoint = Endpoint::local(
        Url::parse(&server.uri()).unwrap(),
        SecretString::from("stream-key"),
    );
    let transport = Arc::new(ReqwestTransport::from_reqwest(reqwest::Client::new()));
    (server, EventStreamClient::new(transport, endpoint))
}

#[tokio::test]
async fn test_stream_yields_frames() {
    let (server, client) = setup().await;

    let body = concat!(
        ": hi\n\n",
        "id: 1700000000:0\n",
        "data: [{\"type\":\"update\",\"data\":[{\"id\":\"L1\",\"type\":\"light\",\"on\":{\"on\":false}}]}]\n\n",
        "id: 1700000001:0\n",
        "data: [{\"type\":\"delete\",\"data\":[{\"id\":\"S1\",\"type\":\"scene\"}]}]\n\n",
    );

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .and(header("accept", "text/event-stream"))
        .and(header("hue-application-key", "stream-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let mut frames = client.open().await.unwrap();

    let first = parse_frame(&frames.next().await.unwrap().unwrap());
    assert_eq!(first[0].kind, StreamEventKind::Update);
    assert_eq!(first[0].data[0]["on"]["on"], false);

    let second = parse_frame(&frames.next().await.unwrap().unwrap());
    assert_eq!(second[0].kind, StreamEventKind::Delete);

    assert!(frames.next().await.is_none(), "stream should end with the body");
}

#[tokio::test]
async fn test_stream_handshake_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/eventstream/clip/v2"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let Err(err) = client.open().await else {
        panic!("expected connect failure");
    };
    assert!(matches!(err, Error::StreamConnect(_)), "got: {err:?}");
    assert!(err.is_transient());
}
