//! In-process HTTP server used by the integration tests.
//!
//! Every route serves the same payload with a different personality:
//!
//! - `/file`      byte ranges supported, counts ranged requests
//! - `/plain`     declares a size but ignores `Range`
//! - `/slow`      byte ranges supported, trickles bodies out
//! - `/flaky`     rejects every range that does not start at zero
//! - `/missing`   always 404
//! - `/nolength`  HEAD not allowed, GET body is chunked
//! - `/short`     byte ranges supported, ranges past offset zero end early
//! - `/truncated` declares a size, GET streams fewer bytes without a length
//! - `/ignores`   advertises byte ranges, always answers 200 with everything

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio_util::io::ReaderStream;

const SLOW_PIECE: usize = 1024;
const SLOW_TICK: Duration = Duration::from_millis(50);
const SHORTFALL: usize = 10;

pub struct Fixture {
    data: Vec<u8>,
    ranged_requests: AtomicUsize,
}

pub struct TestServer {
    addr: SocketAddr,
    fixture: Arc<Fixture>,
    _runtime: Runtime,
}

impl TestServer {
    pub fn start(data: Vec<u8>) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("failed to build test runtime");

        let fixture = Arc::new(Fixture {
            data,
            ranged_requests: AtomicUsize::new(0),
        });
        let app = router(fixture.clone());

        let listener = runtime
            .block_on(TcpListener::bind("127.0.0.1:0"))
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("listener has no address");
        runtime.spawn(async move {
            axum::serve(listener, app).await.expect("test server stopped");
        });

        Self {
            addr,
            fixture,
            _runtime: runtime,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Ranged GETs seen on `/file`.
    pub fn ranged_requests(&self) -> usize {
        self.fixture.ranged_requests.load(Ordering::SeqCst)
    }
}

/// Deterministic, non-repeating-looking test payload.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 7)) as u8)
        .collect()
}

fn router(fixture: Arc<Fixture>) -> Router {
    Router::new()
        .route("/file", get(file).head(head_ranged))
        .route("/plain", get(plain).head(head_plain))
        .route("/slow", get(slow).head(head_ranged))
        .route("/flaky", get(flaky).head(head_ranged))
        .route("/missing", get(missing).head(missing))
        .route("/nolength", get(nolength).head(method_not_allowed))
        .route("/short", get(short).head(head_ranged))
        .route("/truncated", get(truncated).head(head_plain))
        .route("/ignores", get(plain).head(head_ranged))
        .with_state(fixture)
}

async fn head_ranged(State(fixture): State<Arc<Fixture>>) -> Response {
    let mut response = head_plain(State(fixture)).await;
    response
        .headers_mut()
        .insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    response
}

async fn head_plain(State(fixture): State<Arc<Fixture>>) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, fixture.data.len())
        .body(Body::empty())
        .unwrap()
}

async fn file(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> Response {
    let Some(range) = requested_range(&headers, fixture.data.len() as u64) else {
        return full_body(&fixture.data);
    };
    fixture.ranged_requests.fetch_add(1, Ordering::SeqCst);
    match range {
        Ok((start, end)) => partial_body(&fixture.data, start, end),
        Err(()) => unsatisfiable(fixture.data.len()),
    }
}

async fn plain(State(fixture): State<Arc<Fixture>>) -> Response {
    full_body(&fixture.data)
}

async fn slow(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> Response {
    let size = fixture.data.len() as u64;
    let (start, end) = match requested_range(&headers, size) {
        Some(Ok(range)) => range,
        Some(Err(())) => return unsatisfiable(fixture.data.len()),
        None => (0, size - 1),
    };
    trickle(&fixture.data, start, end)
}

async fn flaky(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> Response {
    let size = fixture.data.len() as u64;
    match requested_range(&headers, size) {
        Some(Ok((0, end))) => trickle(&fixture.data, 0, end),
        Some(Ok(_)) => (StatusCode::INTERNAL_SERVER_ERROR, "chunk rejected").into_response(),
        Some(Err(())) => unsatisfiable(fixture.data.len()),
        None => full_body(&fixture.data),
    }
}

async fn missing() -> Response {
    (StatusCode::NOT_FOUND, "no such file").into_response()
}

async fn method_not_allowed() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

async fn nolength(State(fixture): State<Arc<Fixture>>) -> Response {
    let reader = Cursor::new(fixture.data.clone());
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from_stream(ReaderStream::with_capacity(reader, 4096)))
        .unwrap()
}

async fn short(State(fixture): State<Arc<Fixture>>, headers: HeaderMap) -> Response {
    let size = fixture.data.len() as u64;
    match requested_range(&headers, size) {
        Some(Ok((0, end))) => partial_body(&fixture.data, 0, end),
        Some(Ok((start, end))) => {
            let cut = (end as usize + 1 - SHORTFALL).max(start as usize);
            Response::builder()
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", start, end, size),
                )
                .body(Body::from(fixture.data[start as usize..cut].to_vec()))
                .unwrap()
        }
        Some(Err(())) => unsatisfiable(fixture.data.len()),
        None => full_body(&fixture.data),
    }
}

async fn truncated(State(fixture): State<Arc<Fixture>>) -> Response {
    let keep = fixture.data.len().saturating_sub(SHORTFALL);
    let reader = Cursor::new(fixture.data[..keep].to_vec());
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from_stream(ReaderStream::with_capacity(reader, 4096)))
        .unwrap()
}

fn full_body(data: &[u8]) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(data.to_vec()))
        .unwrap()
}

fn partial_body(data: &[u8], start: u64, end: u64) -> Response {
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, data.len()),
        )
        .body(Body::from(data[start as usize..=end as usize].to_vec()))
        .unwrap()
}

fn trickle(data: &[u8], start: u64, end: u64) -> Response {
    let slice = Bytes::copy_from_slice(&data[start as usize..=end as usize]);
    let stream = futures_util::stream::unfold(slice, |mut rest| async move {
        if rest.is_empty() {
            return None;
        }
        tokio::time::sleep(SLOW_TICK).await;
        let piece = rest.split_to(SLOW_PIECE.min(rest.len()));
        Some((Ok::<_, std::io::Error>(piece), rest))
    });
    Response::builder()
        .status(StatusCode::PARTIAL_CONTENT)
        .header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, data.len()),
        )
        .body(Body::from_stream(stream))
        .unwrap()
}

fn unsatisfiable(size: usize) -> Response {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, format!("bytes */{}", size))
        .body(Body::empty())
        .unwrap()
}

/// `None` without a usable `Range` header, `Some(Err)` when it cannot be
/// satisfied.
fn requested_range(headers: &HeaderMap, size: u64) -> Option<Result<(u64, u64), ()>> {
    let value = headers.get(header::RANGE)?.to_str().ok()?.trim();
    let spec = value.strip_prefix("bytes=")?.trim();
    if spec.is_empty() || spec.contains(',') {
        return Some(Err(()));
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = match start.trim().parse() {
        Ok(start) => start,
        Err(_) => return Some(Err(())),
    };
    let end: u64 = match end.trim() {
        "" => size.checked_sub(1)?,
        text => match text.parse() {
            Ok(end) => end,
            Err(_) => return Some(Err(())),
        },
    };
    if start > end || end >= size {
        return Some(Err(()));
    }
    Some(Ok((start, end)))
}
