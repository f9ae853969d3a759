//! Test doubles for the transport and signing collaborators
//!
//! `ScriptedTransport` replays a fixed list of responses and records every
//! request it was handed, so tests can assert exact attempt counts.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::request::{Method, Request, Response};
use super::transport::{Signer, Transport};
use crate::config::Credentials;
use crate::error::{ApiError, Result};

/// One scripted outcome
#[derive(Debug, Clone)]
enum Scripted {
    Reply {
        status: u16,
        body: Vec<u8>,
        headers: HashMap<String, String>,
    },
    NetworkError(String),
}

/// Transport that answers from a script instead of the network.
///
/// # Example
/// ```ignore
/// let transport = ScriptedTransport::new()
///     .respond(503, "busy")
///     .respond(200, "{}");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status and body.
    pub fn respond(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.respond_with_headers(status, body, &[])
    }

    /// Queue a JSON response.
    pub fn respond_json(self, status: u16, body: Value) -> Self {
        self.respond(status, body.to_string())
    }

    /// Queue a response carrying headers.
    pub fn respond_with_headers(
        self,
        status: u16,
        body: impl Into<Vec<u8>>,
        headers: &[(&str, &str)],
    ) -> Self {
        let headers = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push(Scripted::Reply {
            status,
            body: body.into(),
            headers,
        })
    }

    /// Queue a failure where no response arrives.
    pub fn fail_network(self, message: &str) -> Self {
        self.push(Scripted::NetworkError(message.to_string()))
    }

    /// Answer with this response once the queue is empty, forever.
    pub fn repeat(mut self, status: u16, body: impl Into<Vec<u8>>) -> Self {
        self.fallback = Some(Scripted::Reply {
            status,
            body: body.into(),
            headers: HashMap::new(),
        });
        self
    }

    fn push(self, entry: Scripted) -> Self {
        self.script
            .lock()
            .expect("script lock poisoned")
            .push_back(entry);
        self
    }

    /// Number of requests executed so far
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock poisoned").len()
    }

    /// Every request executed so far, in order
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(&self, request: &Request) -> Result<Response> {
        self.requests
            .lock()
            .expect("requests lock poisoned")
            .push(request.clone());

        let next = self
            .script
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .or_else(|| self.fallback.clone());

        let url = request.resolve_url("http://mock.local/");
        match next {
            Some(Scripted::Reply {
                status,
                body,
                headers,
            }) => Ok(Response::new(status, headers, body, url, request.clone())),
            Some(Scripted::NetworkError(message)) => Err(ApiError::Network(message).into()),
            None => Err(ApiError::Network(format!("no scripted response left for {}", url)).into()),
        }
    }
}

/// Signer producing `"<prefix> <n>"`, where `n` counts invocations.
#[derive(Debug)]
pub struct StaticSigner {
    prefix: String,
    calls: AtomicUsize,
}

impl StaticSigner {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Signer for StaticSigner {
    fn authorization(
        &self,
        _credentials: &Credentials,
        _method: Method,
        _url: &Url,
    ) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{} {}", self.prefix, n))
    }
}
