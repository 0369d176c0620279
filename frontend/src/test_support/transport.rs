//! In-process transport for pipeline and service tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};

use crate::{
    error::ApiError,
    http::{HttpRequest, HttpResponse, Transport},
};

pub const GET: Method = Method::GET;
pub const POST: Method = Method::POST;
pub const PUT: Method = Method::PUT;
pub const DELETE: Method = Method::DELETE;

/// A canned reply. Status `0` simulates a connection failure.
#[derive(Debug, Clone)]
pub struct FakeReply {
    status: u16,
    body: Option<Value>,
    delay: Option<Duration>,
}

impl FakeReply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            delay: None,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: None,
            delay: None,
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl From<(u16, Value)> for FakeReply {
    fn from((status, body): (u16, Value)) -> Self {
        match body {
            Value::Null => Self::status(status),
            body => Self::json(status, body),
        }
    }
}

type Handler = Box<dyn Fn(&HttpRequest) -> FakeReply + Send + Sync>;

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<Vec<Arc<Route>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a fixed reply. Later registrations for the same route win.
    pub fn mock<F>(&self, f: F)
    where
        F: FnOnce(&mut When, &mut Then),
    {
        let mut when = When::default();
        let mut then = Then::default();
        f(&mut when, &mut then);

        let method = when.method.expect("mock requires method");
        let path = when.path.expect("mock requires path");
        let reply = FakeReply {
            status: then.status.unwrap_or(200),
            body: then.body,
            delay: then.delay,
        };
        self.mock_with(method, &path, move |_| reply.clone());
    }

    /// Registers a handler computing the reply from the request.
    pub fn mock_with<F, R>(&self, method: Method, path: &str, handler: F)
    where
        F: Fn(&HttpRequest) -> R + Send + Sync + 'static,
        R: Into<FakeReply>,
    {
        self.routes.lock().expect("routes lock").push(Arc::new(Route {
            method,
            path: path.to_string(),
            handler: Box::new(move |request| handler(request).into()),
        }));
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests_to(path).len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|request| request.path() == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let path = request.path();
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        let route = self
            .routes
            .lock()
            .expect("routes lock")
            .iter()
            .rev()
            .find(|route| route.method == request.method && route.path == path)
            .cloned();
        let Some(route) = route else {
            let body = json!({ "message": format!("No mock for {} {}", request.method, path) });
            return Ok(HttpResponse::new(StatusCode::NOT_FOUND, body.to_string()));
        };

        let reply = (route.handler)(&request);
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        if reply.status == 0 {
            return Err(ApiError::network("Connection refused")
                .with_request(request.method.as_str(), &path));
        }
        let status = StatusCode::from_u16(reply.status).expect("valid status");
        let body = reply.body.map(|b| b.to_string()).unwrap_or_default();
        Ok(HttpResponse::new(status, body))
    }
}

#[derive(Default)]
pub struct When {
    method: Option<Method>,
    path: Option<String>,
}

impl When {
    pub fn method(&mut self, method: Method) -> &mut Self {
        self.method = Some(method);
        self
    }

    pub fn path(&mut self, path: &str) -> &mut Self {
        self.path = Some(path.to_string());
        self
    }
}

#[derive(Default)]
pub struct Then {
    status: Option<u16>,
    body: Option<Value>,
    delay: Option<Duration>,
}

impl Then {
    pub fn status(&mut self, status: u16) -> &mut Self {
        self.status = Some(status);
        self
    }

    pub fn json_body(&mut self, body: Value) -> &mut Self {
        self.body = Some(body);
        self
    }

    pub fn delay(&mut self, delay: Duration) -> &mut Self {
        self.delay = Some(delay);
        self
    }
}
