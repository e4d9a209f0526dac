//! Stream forwarding for a single turn.
//!
//! The upstream body is piped chunk by chunk into the downstream response.
//! Frames are never parsed on the forwarding path; the relay only writes
//! frames of its own when the upstream call fails, and then in the same wire
//! format so clients parse one kind of stream.

use std::convert::Infallible;
use std::fmt::Display;

use async_stream::stream;
use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use relaychat_contracts::upstream::LegacySendMessageResponse;
use relaychat_contracts::{EVENT_STREAM_CONTENT_TYPE, Frame};
use tracing::{debug, warn};

use crate::upstream::{UpstreamError, status_error};

pub const UNREACHABLE_MESSAGE: &str =
    "The assistant could not be reached. Please try again in a moment.";
pub const INTERRUPTED_MESSAGE: &str =
    "The connection to the assistant was lost before the answer finished.";

/// Build the downstream response for an upstream `send-message` call.
pub async fn forward_turn(upstream: Result<reqwest::Response, UpstreamError>) -> Response {
    let response = match upstream {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, "Upstream stream could not be opened");
            return single_frame(Frame::error(UNREACHABLE_MESSAGE));
        }
    };

    let status = response.status();
    if !status.is_success() {
        let err = status_error(response).await;
        warn!(status = status.as_u16(), error = %err, "Upstream rejected the turn");
        let message = match err {
            UpstreamError::Status { message, .. } if !message.trim().is_empty() => message,
            _ => format!("The assistant is unavailable (HTTP {}).", status.as_u16()),
        };
        return single_frame(Frame::error(message));
    }

    if is_json(response.headers()) {
        return legacy_reply(response).await;
    }

    event_stream(Body::from_stream(forward_body(response.bytes_stream())))
}

/// Pipe upstream chunks through unchanged. A failure after the stream has
/// started appends one terminal error frame and ends the body.
pub fn forward_body<S, E>(upstream: S) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    stream! {
        let mut upstream = Box::pin(upstream);
        let mut forwarded: usize = 0;
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    forwarded += bytes.len();
                    yield Ok::<Bytes, Infallible>(bytes);
                }
                Err(err) => {
                    let record = Frame::error(INTERRUPTED_MESSAGE).to_record();
                    if forwarded == 0 {
                        warn!(error = %err, "Upstream stream failed before any bytes");
                        yield Ok(Bytes::from(record));
                    } else {
                        warn!(error = %err, forwarded, "Upstream stream failed mid-flight");
                        // Close any half-written record before the error frame.
                        yield Ok(Bytes::from(format!("\n\n{}", record)));
                    }
                    return;
                }
            }
        }
        debug!(forwarded, "Upstream stream finished");
    }
}

/// Streaming headers, set before the first body byte.
fn event_stream(body: Body) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(EVENT_STREAM_CONTENT_TYPE),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}

fn single_frame(frame: Frame) -> Response {
    frames_response(&[frame])
}

fn frames_response(frames: &[Frame]) -> Response {
    let body: String = frames.iter().map(Frame::to_record).collect();
    event_stream(Body::from(body))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// Older endpoints answer with one JSON document instead of a stream.
async fn legacy_reply(response: reqwest::Response) -> Response {
    match response.json::<LegacySendMessageResponse>().await {
        Ok(reply) => {
            debug!(conversation_id = ?reply.conversation_id, "Converting legacy reply to frames");
            frames_response(&[Frame::content(reply.response), Frame::final_metadata()])
        }
        Err(err) => {
            warn!(error = %err, "Upstream JSON reply could not be decoded");
            single_frame(Frame::error(UNREACHABLE_MESSAGE))
        }
    }
}
