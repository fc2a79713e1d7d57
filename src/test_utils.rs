//! Scripted transport shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, HttpTransport, Method};
use crate::model::{Album, Track};

pub const BACKEND: &str = "http://backend.test";
pub const MEDIA: &str = "http://media.test/v1/me/player";
pub const RECOGNITION: &str = "http://recognition.test/";

type Scripted = Result<HttpResponse, TransportError>;

#[derive(Default)]
struct Routes {
    queues: HashMap<(Method, String), VecDeque<Scripted>>,
    delays: HashMap<(Method, String), Duration>,
    recorded: Vec<HttpRequest>,
}

/// Answers requests from per-route queues. The last queued response of a
/// route repeats once everything before it was consumed.
#[derive(Clone, Default)]
pub struct FakeTransport {
    routes: Arc<Mutex<Routes>>,
}

fn path_of(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    match rest.find('/') {
        Some(idx) => rest[idx..].to_string(),
        None => "/".to_string(),
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) -> &Self {
        let body = if body.is_null() {
            Vec::new()
        } else {
            body.to_string().into_bytes()
        };
        self.push(method, path, Ok(HttpResponse::new(status, body)))
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
        self.push(method, path, Err(TransportError(message.to_string())))
    }

    pub fn delay(&self, method: Method, path: &str, delay: Duration) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .delays
            .insert((method, path.to_string()), delay);
        self
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .queues
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.routes.lock().unwrap().recorded.clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let key = (request.method, path_of(&request.url));
        let (scripted, delay) = {
            let mut routes = self.routes.lock().unwrap();
            routes.recorded.push(request.clone());
            let delay = routes.delays.get(&key).copied();
            let scripted = match routes.queues.get_mut(&key) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            };
            (scripted, delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        scripted.unwrap_or_else(|| {
            Ok(HttpResponse::new(
                404,
                format!("no scripted response for {:?} {}", key.0, key.1),
            ))
        })
    }
}

pub fn sample_track(uri: &str) -> Track {
    Track {
        id: uri.rsplit(':').next().unwrap_or_default().to_string(),
        title: "Sample Song".to_string(),
        artists: vec!["Sample Artist".to_string()],
        album: Album {
            name: "Sample Album".to_string(),
            artwork_url: String::new(),
            release_date: None,
        },
        duration_ms: 180_000,
        explicit: false,
        popularity: Some(50),
        uri: uri.to_string(),
    }
}
