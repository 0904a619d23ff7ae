//! Integration tests for the synchronous request helper.

mod common;

use common::{Harness, MockDelay};
use httplink::blocking::request_and_parse;
use httplink::error::{RequestError, SendError};
use httplink::protocol::LinkState;
use httplink::transport::RxQueue;

#[test]
fn resolves_when_the_response_is_complete() {
    let mut queue = RxQueue::new();
    let mut h = Harness::new(&mut queue);
    h.confirm_link();

    h.feed_line("[GET/SUCCESS]");
    h.feed_line("{\"ok\":true}");
    h.feed_line("[GET/END]");

    let mut delay = MockDelay::new();
    let body: String = request_and_parse(
        &mut h.conn,
        &mut delay,
        |conn| conn.get("https://example.com/api"),
        |conn| {
            let body = conn.body();
            (!body.is_empty()).then(|| body.to_string())
        },
    )
    .unwrap();

    assert_eq!(body, "{\"ok\":true}\n");
    assert_eq!(h.conn.state(), LinkState::Idle);
    // The whole response was already queued; no poll sleep was needed.
    assert_eq!(delay.calls, 0);
}

#[test]
fn a_silent_companion_times_out() {
    let mut queue = RxQueue::new();
    let mut h = Harness::new(&mut queue);
    h.confirm_link();

    let mut delay = MockDelay::expiring(3, h.watchdog.clone());
    let result = request_and_parse(
        &mut h.conn,
        &mut delay,
        |conn| conn.get("https://example.com/api"),
        |conn| Some(conn.body().to_string()),
    );

    assert_eq!(result, Err(RequestError::Timeout));
    assert_eq!(h.conn.state(), LinkState::Issue);
    assert_eq!(delay.calls, 3);
}

#[test]
fn a_reported_error_resolves_as_issue() {
    let mut queue = RxQueue::new();
    let mut h = Harness::new(&mut queue);
    h.confirm_link();

    h.feed_line("[ERROR] GET request failed");

    let mut delay = MockDelay::new();
    let result = request_and_parse(
        &mut h.conn,
        &mut delay,
        |conn| conn.get("https://example.com/api"),
        |conn| Some(conn.body().to_string()),
    );

    assert_eq!(result, Err(RequestError::Issue));
    assert_eq!(h.conn.last_response(), "[ERROR] GET request failed");
}

#[test]
fn a_rejected_parse_resolves_as_parse_failed() {
    let mut queue = RxQueue::new();
    let mut h = Harness::new(&mut queue);
    h.confirm_link();

    h.feed_line("[GET/SUCCESS]");
    h.feed_line("not json at all");
    h.feed_line("[GET/END]");

    let mut delay = MockDelay::new();
    let result: Result<u32, _> = request_and_parse(
        &mut h.conn,
        &mut delay,
        |conn| conn.get("https://example.com/api"),
        |conn| conn.body().trim().parse().ok(),
    );

    assert_eq!(result, Err(RequestError::ParseFailed));
    // Protocol state is unaffected by the parse outcome.
    assert_eq!(h.conn.state(), LinkState::Idle);
}

#[test]
fn a_send_rejection_is_wrapped() {
    let mut queue = RxQueue::new();
    let mut h = Harness::new(&mut queue);
    // No handshake: the link is still unconfirmed.

    let mut delay = MockDelay::new();
    let result = request_and_parse(
        &mut h.conn,
        &mut delay,
        |conn| conn.get("https://example.com/api"),
        |conn| Some(conn.body().to_string()),
    );

    assert_eq!(
        result,
        Err(RequestError::SendFailed(SendError::LinkInactive))
    );
    assert_eq!(delay.calls, 0);
}
