// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Scripted in-memory transport for service tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

use super::{BankRequest, BankResponse, BankTransport, TransportError, TransportErrorKind};

struct Scripted {
    outcome: Result<BankResponse, TransportError>,
    delay: Option<Duration>,
}

/// Replays queued outcomes in FIFO order and records every request.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<BankRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, outcome: Result<BankResponse, TransportError>, delay: Option<Duration>) {
        self.script
            .lock()
            .unwrap()
            .push_back(Scripted { outcome, delay });
    }

    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(response(status, &[], &body.to_string())), None);
        self
    }

    pub fn push_delayed_json(&self, delay: Duration, status: u16, body: Value) -> &Self {
        self.push(Ok(response(status, &[], &body.to_string())), Some(delay));
        self
    }

    pub fn push_status(&self, status: u16, headers: &[(&str, &str)], body: &str) -> &Self {
        self.push(Ok(response(status, headers, body)), None);
        self
    }

    pub fn push_error(&self, kind: TransportErrorKind) -> &Self {
        self.push(Err(TransportError::new(kind, "scripted failure")), None);
        self
    }

    pub fn requests(&self) -> Vec<BankRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

fn response(status: u16, headers: &[(&str, &str)], body: &str) -> BankResponse {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    BankResponse {
        status,
        headers: map,
        body: body.to_string(),
    }
}

#[async_trait]
impl BankTransport for ScriptedTransport {
    async fn execute(&self, request: BankRequest) -> Result<BankResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted { outcome, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            None => Err(TransportError::new(
                TransportErrorKind::Other,
                "no scripted response left",
            )),
        }
    }
}
