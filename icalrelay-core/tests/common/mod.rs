#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;

pub const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//Remote//Feed//EN\r\n\
X-WR-TIMEZONE:America/New_York\r\n\
BEGIN:VEVENT\r\n\
UID:remote-1\r\n\
SUMMARY:Remote one\r\n\
DTSTART:20250110T150000Z\r\n\
DTEND:20250110T160000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:remote-2\r\n\
SUMMARY:Remote two\r\n\
DTSTART:20250111T150000Z\r\n\
DTEND:20250111T160000Z\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

/// A calendar with `count` events named `<prefix>-<n>`.
pub fn calendar(prefix: &str, count: usize) -> String {
    let mut ics = String::from(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\nX-WR-TIMEZONE:Europe/Berlin\r\n",
    );
    for n in 0..count {
        ics.push_str(&format!(
            "BEGIN:VEVENT\r\nUID:{prefix}-{n}\r\nSUMMARY:{prefix} {n}\r\n\
DTSTART:2025011{n}T090000Z\r\nDTEND:2025011{n}T100000Z\r\nEND:VEVENT\r\n"
        ));
    }
    ics.push_str("END:VCALENDAR\r\n");
    ics
}

async fn feed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/calendar")], FEED)
}

async fn guarded(headers: HeaderMap) -> impl IntoResponse {
    match headers.get("x-token").and_then(|v| v.to_str().ok()) {
        Some("secret") => feed().await.into_response(),
        _ => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    feed().await
}

/// Serve test feeds on an ephemeral port:
/// - `/feed.ics`: two events
/// - `/down.ics`: 503
/// - `/guarded.ics`: the feed when `X-Token: secret` is sent, else 401
/// - `/garbage.ics`: a body that is not a calendar
/// - `/slow.ics`: the feed after five seconds
pub async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/feed.ics", get(feed))
        .route("/down.ics", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/guarded.ics", get(guarded))
        .route("/garbage.ics", get(|| async { "<html>not a calendar</html>" }))
        .route("/slow.ics", get(slow));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
