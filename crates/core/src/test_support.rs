//! Fakes and a one-shot HTTP server shared by unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::capture::domain::frame_source::{CameraDevice, CaptureError, FrameSource};
use crate::scoring::domain::scorer::{ScoreError, ScoreRequest, Scorer};
use crate::shared::frame::Frame;
use crate::shared::observation::Observation;

// --- Frame source ---

/// Camera whose first `blank_grabs` grabs return nothing.
pub(crate) struct FakeSource {
    blank_grabs: AtomicUsize,
    grabs: AtomicUsize,
    next_index: AtomicUsize,
    selected: Mutex<String>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::with_blank_grabs(0)
    }

    pub(crate) fn with_blank_grabs(blank_grabs: usize) -> Self {
        Self {
            blank_grabs: AtomicUsize::new(blank_grabs),
            grabs: AtomicUsize::new(0),
            next_index: AtomicUsize::new(0),
            selected: Mutex::new("cam-a".to_string()),
        }
    }

    pub(crate) fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }

    pub(crate) fn selected(&self) -> String {
        self.selected.lock().unwrap().clone()
    }
}

pub(crate) fn frame(index: usize) -> Frame {
    Frame::new(format!("frame-{index}").into_bytes(), index)
}

impl FrameSource for FakeSource {
    fn grab_frame(&self) -> Option<Frame> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        let blank = self
            .blank_grabs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if blank {
            return None;
        }
        Some(frame(self.next_index.fetch_add(1, Ordering::SeqCst)))
    }

    fn list_devices(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        Ok(["cam-a", "cam-b"]
            .iter()
            .map(|id| CameraDevice {
                id: id.to_string(),
                label: id.to_uppercase(),
            })
            .collect())
    }

    fn select_device(&self, id: &str) -> Result<(), CaptureError> {
        if !self.list_devices()?.iter().any(|d| d.id == id) {
            return Err(CaptureError::DeviceNotFound(id.to_string()));
        }
        *self.selected.lock().unwrap() = id.to_string();
        Ok(())
    }
}

// --- Scorer ---

pub(crate) type Verdict = Result<Observation, ScoreError>;

enum Reply {
    Ready(Verdict),
    Gated(oneshot::Receiver<Verdict>),
}

/// Scripted scorer. Unscripted calls resolve to "no face".
pub(crate) struct FakeScorer {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ScoreRequest>>,
}

impl FakeScorer {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_ok(&self, similarity: f64, verified: bool) {
        self.push(Reply::Ready(Ok(Observation::new(similarity, verified))));
    }

    pub(crate) fn push_no_face(&self) {
        self.push_observation(Observation::no_face());
    }

    pub(crate) fn push_observation(&self, observation: Observation) {
        self.push(Reply::Ready(Ok(observation)));
    }

    pub(crate) fn push_err(&self, err: ScoreError) {
        self.push(Reply::Ready(Err(err)));
    }

    /// Scripts a reply that stays pending until the returned sender fires.
    pub(crate) fn push_gated(&self) -> oneshot::Sender<Verdict> {
        let (tx, rx) = oneshot::channel();
        self.push(Reply::Gated(rx));
        tx
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<ScoreRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().unwrap().push_back(reply);
    }
}

impl Scorer for FakeScorer {
    fn score(&self, request: ScoreRequest) -> impl Future<Output = Verdict> + Send {
        self.requests.lock().unwrap().push(request);
        let reply = self.replies.lock().unwrap().pop_front();
        async move {
            match reply {
                Some(Reply::Ready(verdict)) => verdict,
                Some(Reply::Gated(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(ScoreError::Malformed("gate dropped".into()))),
                None => Ok(Observation::no_face()),
            }
        }
    }
}

// --- HTTP ---

/// What the one-shot server received.
pub(crate) struct CapturedRequest {
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    pub(crate) fn header(&self, name: &str) -> Option<String> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim().to_string())
        })
    }

    pub(crate) fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Serves exactly one HTTP response and returns the base URL plus a handle
/// resolving to the captured request.
pub(crate) async fn serve_once(
    status: u16,
    body: &'static str,
) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before headers");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let captured = CapturedRequest {
            head,
            body: String::new(),
        };
        let content_length = captured
            .header("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);

        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before body");
            buf.extend_from_slice(&chunk[..n]);
        }
        let body_text =
            String::from_utf8_lossy(&buf[header_end..header_end + content_length]).to_string();

        let response = format!(
            "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;

        CapturedRequest {
            body: body_text,
            ..captured
        }
    });

    (format!("http://{addr}"), handle)
}
