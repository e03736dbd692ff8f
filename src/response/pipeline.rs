//! Body materialization and assertion stages.
//!
//! Each stage takes a [`Response`] by value and returns a new one, so stages
//! compose in whatever order the caller writes them:
//!
//! ```ignore
//! let response = only_ok(from_json(to_string(pending.wait().await?).await?)?)?;
//! ```
//!
//! Stages only move a body forward (`Stream → Bytes → Text → Json`). Running a
//! stage on a body that is already past it returns the body untouched.
//!
//! Chunks drained from a stream are always joined as bytes; text only appears
//! at [`to_string`], which decodes UTF-8 and substitutes `U+FFFD` for invalid
//! sequences.

use super::{Body, Response};
use crate::error::{Error, ResponseError, Result};
use crate::protocol::constants::CONTENT_TYPE;
use crate::protocol::is_json_content_type;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde_json::Value;

/// Drain a streamed body into bytes and mark the response complete.
///
/// Bodies that are already materialized are left as they are, so calling
/// this twice is the same as calling it once. A failing stream rejects with
/// [`Error::BodyDrain`]; it never turns into a response.
pub async fn to_complete(response: Response) -> Result<Response> {
    let mut response = response;
    let body = std::mem::take(&mut response.body);

    let body = match body {
        Body::Stream(mut stream) => {
            let mut buffer = BytesMut::new();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| Error::BodyDrain(e.to_string()))?;
                buffer.extend_from_slice(&chunk);
            }
            Body::Bytes(buffer.freeze())
        }
        other => other,
    };

    Ok(response.with_body(body, true))
}

fn bytes_to_text(bytes: Bytes) -> String {
    match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Complete the body, then present it as text. An absent body becomes `""`.
pub async fn to_string(response: Response) -> Result<Response> {
    let mut response = to_complete(response).await?;
    let body = match std::mem::take(&mut response.body) {
        Body::Empty => Body::Text(String::new()),
        Body::Bytes(bytes) => Body::Text(bytes_to_text(bytes)),
        other => other,
    };
    Ok(response.with_body(body, true))
}

/// Decode a textual body as JSON, keeping the text in `body_text`.
///
/// Empty text decodes to `null`. Malformed JSON fails with
/// [`Error::Decode`]. The `content-type` is not consulted; see
/// [`from_json_if_json`] for the gated form. A live stream fails with
/// [`Error::BodyNotComplete`] because decoding never performs I/O.
pub fn from_json(response: Response) -> Result<Response> {
    let mut response = response;
    let text = match std::mem::take(&mut response.body) {
        Body::Stream(_) => return Err(Error::BodyNotComplete),
        Body::Json(value) => {
            response.body = Body::Json(value);
            return Ok(response);
        }
        Body::Empty => String::new(),
        Body::Bytes(bytes) => bytes_to_text(bytes),
        Body::Text(text) => text,
    };

    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text)?
    };

    let complete = response.complete;
    let mut response = response.with_body(Body::Json(value), complete);
    response.body_text = Some(text);
    Ok(response)
}

/// [`from_json`] when the `content-type` header names JSON, identity otherwise.
pub fn from_json_if_json(response: Response) -> Result<Response> {
    let is_json = response
        .headers
        .get_str(CONTENT_TYPE)
        .is_some_and(is_json_content_type);
    if is_json {
        from_json(response)
    } else {
        Ok(response)
    }
}

/// Pass an ok response through; turn anything else into a [`ResponseError`].
pub fn only_ok(response: Response) -> std::result::Result<Response, ResponseError> {
    if response.ok {
        Ok(response)
    } else {
        Err(ResponseError::new(response))
    }
}

/// Pass a complete response through; turn anything else into a [`ResponseError`].
pub fn only_complete(response: Response) -> std::result::Result<Response, ResponseError> {
    if response.complete {
        Ok(response)
    } else {
        Err(ResponseError::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BoxError;
    use crate::params::{normalize, RawParams};
    use crate::protocol::HeaderFields;
    use crate::response::{Loaded, Reason, RequestHandle};
    use serde_json::json;

    fn response(status: u16, headers: HeaderFields, body: Body, complete: bool) -> Response {
        let params = normalize(RawParams::new("http://local/")).unwrap();
        let (handle, _abort_rx) = RequestHandle::new(&params);
        Response::loaded(
            handle,
            params,
            Loaded {
                status,
                status_text: String::new(),
                headers,
                body,
                complete,
            },
        )
    }

    fn streamed(chunks: Vec<&'static str>) -> Response {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok::<_, BoxError>(Bytes::from_static(c.as_bytes()))),
        );
        response(200, HeaderFields::new(), Body::Stream(Box::pin(stream)), false)
    }

    #[tokio::test]
    async fn test_to_complete_joins_chunks() {
        let r = to_complete(streamed(vec!["ab", "", "cd"])).await.unwrap();
        assert!(r.complete);
        assert_eq!(r.body.as_bytes(), Some(&b"abcd"[..]));
    }

    #[tokio::test]
    async fn test_to_complete_is_idempotent() {
        let once = to_complete(streamed(vec!["x", "y"])).await.unwrap();
        let once_bytes = once.body.as_bytes().unwrap().to_vec();
        let twice = to_complete(once).await.unwrap();
        assert!(twice.complete);
        assert_eq!(twice.body.as_bytes().unwrap(), &once_bytes[..]);
        assert_eq!(twice.status, 200);

        let text = response(200, HeaderFields::new(), Body::Text("t".into()), false);
        let text = to_complete(to_complete(text).await.unwrap()).await.unwrap();
        assert!(text.complete);
        assert_eq!(text.body.as_text(), Some("t"));
    }

    #[tokio::test]
    async fn test_to_complete_drain_error_rejects() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err::<Bytes, BoxError>("connection reset".into()),
        ]);
        let r = response(200, HeaderFields::new(), Body::Stream(Box::pin(stream)), false);
        let err = to_complete(r).await.unwrap_err();
        assert!(matches!(err, Error::BodyDrain(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_to_string_empty_and_invalid_utf8() {
        let r = to_string(response(204, HeaderFields::new(), Body::Empty, false))
            .await
            .unwrap();
        assert_eq!(r.body.as_text(), Some(""));

        let r = response(
            200,
            HeaderFields::new(),
            Body::Bytes(Bytes::from_static(b"ok\xff")),
            true,
        );
        let r = to_string(r).await.unwrap();
        assert_eq!(r.body.as_text(), Some("ok\u{fffd}"));
    }

    #[tokio::test]
    async fn test_json_round_trip_across_chunk_splits() {
        let values = vec![
            json!(null),
            json!(42),
            json!("snow ☃"),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"list": [true, false]}, "empty": {}}),
        ];
        for value in values {
            let text = serde_json::to_string(&value).unwrap();
            let bytes = text.as_bytes();
            for split in [0, 1, bytes.len() / 2, bytes.len()] {
                let chunks = vec![
                    Ok::<_, BoxError>(Bytes::copy_from_slice(&bytes[..split])),
                    Ok(Bytes::copy_from_slice(&bytes[split..])),
                ];
                let r = response(
                    200,
                    HeaderFields::new(),
                    Body::Stream(Box::pin(futures::stream::iter(chunks))),
                    false,
                );
                let r = from_json(to_string(r).await.unwrap()).unwrap();
                assert_eq!(r.body.as_json(), Some(&value));
                assert_eq!(r.body_text.as_deref(), Some(text.as_str()));
                assert!(r.complete);
            }
        }
    }

    #[test]
    fn test_from_json_empty_is_null() {
        let r = from_json(response(200, HeaderFields::new(), Body::Text(String::new()), true))
            .unwrap();
        assert_eq!(r.body.as_json(), Some(&Value::Null));
        assert_eq!(r.body_text.as_deref(), Some(""));
    }

    #[test]
    fn test_from_json_malformed() {
        let r = response(200, HeaderFields::new(), Body::Text("{nope".into()), true);
        assert!(matches!(from_json(r), Err(Error::Decode(_))));
    }

    #[test]
    fn test_from_json_requires_completion() {
        let r = streamed(vec!["{}"]);
        assert!(matches!(from_json(r), Err(Error::BodyNotComplete)));
    }

    #[test]
    fn test_from_json_is_forward_only() {
        let r = response(200, HeaderFields::new(), Body::Json(json!({"a": 1})), true);
        let r = from_json(r).unwrap();
        assert_eq!(r.body.as_json(), Some(&json!({"a": 1})));
        assert!(r.body_text.is_none());
    }

    #[test]
    fn test_from_json_if_json_gates_on_content_type() {
        let mut json_headers = HeaderFields::new();
        json_headers.set("Content-Type", "application/json; charset=utf-8");
        let r = response(200, json_headers, Body::Text("[1]".into()), true);
        let r = from_json_if_json(r).unwrap();
        assert_eq!(r.body.as_json(), Some(&json!([1])));

        let mut text_headers = HeaderFields::new();
        text_headers.set("content-type", "text/plain");
        let r = response(200, text_headers, Body::Text("[1]".into()), true);
        let r = from_json_if_json(r).unwrap();
        assert_eq!(r.body.as_text(), Some("[1]"));
    }

    #[test]
    fn test_only_ok() {
        let r = response(200, HeaderFields::new(), Body::Text("fine".into()), true);
        let id = r.handle.id();
        let r = only_ok(r).unwrap();
        assert_eq!(r.handle.id(), id);
        assert_eq!(r.body.as_text(), Some("fine"));

        let r = response(500, HeaderFields::new(), Body::Text("broken".into()), true);
        let id = r.handle.id();
        let err = only_ok(r).unwrap_err();
        assert_eq!(err.status(), 500);
        assert_eq!(err.response().handle.id(), id);
        assert_eq!(err.response().reason, Reason::Load);
        assert!(err.message().contains("500"));
        assert!(err.message().contains("broken"));
    }

    #[test]
    fn test_response_error_preview_is_bounded() {
        let long = "x".repeat(1000);
        let r = response(502, HeaderFields::new(), Body::Text(long), true);
        let err = only_ok(r).unwrap_err();
        let previewed = err.message().matches('x').count();
        assert_eq!(previewed, 128);
        assert!(err.to_string().starts_with("request failed with status 502"));
    }

    #[test]
    fn test_only_complete() {
        let r = streamed(vec!["a"]);
        let err = only_complete(r).unwrap_err();
        assert!(err.response().body.is_stream());

        let r = response(200, HeaderFields::new(), Body::Text("a".into()), true);
        assert!(only_complete(r).is_ok());
    }
}
