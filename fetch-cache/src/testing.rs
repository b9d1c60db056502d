//! Scripted transport for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::descriptor::RequestDescriptor;
use crate::error::FetchError;
use crate::orchestrator::FetchContext;
use crate::transport::{Transport, TransportResponse};

#[derive(Clone)]
enum Reply {
    Respond(u16, String),
    Fail(FetchError),
}

/// Keeps calls pending until released (or dropped).
pub struct Gate(watch::Sender<bool>);

impl Gate {
    pub fn release(&self) {
        self.0.send_replace(true);
    }
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    total: AtomicUsize,
    gate: Mutex<Option<watch::Receiver<bool>>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond(status, body.to_string()));
    }

    pub fn fail(&self, url: &str, err: FetchError) {
        self.routes.lock().unwrap().insert(url.to_string(), Reply::Fail(err));
    }

    /// Hold every call made from now on until the gate is released.
    pub fn hold(&self) -> Gate {
        let (sender, receiver) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(receiver);
        Gate(sender)
    }

    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|called| *called == url).count()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<TransportResponse, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(request.url().clone());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(mut gate) = gate {
            let _ = gate.wait_for(|open| *open).await.map(|_| ());
        }

        let reply = self.routes.lock().unwrap().get(request.url()).cloned();
        match reply {
            Some(Reply::Respond(status, body)) => Ok(TransportResponse {
                status,
                url: request.url().clone(),
                ..TransportResponse::new(status, body)
            }),
            Some(Reply::Fail(err)) => Err(err),
            None => Ok(TransportResponse::new(404, r#"{"error":"not found"}"#)),
        }
    }
}

pub fn context(transport: &Arc<MockTransport>) -> FetchContext {
    context_with(ClientConfig::default(), transport)
}

pub fn context_with(config: ClientConfig, transport: &Arc<MockTransport>) -> FetchContext {
    let _ = env_logger::builder().is_test(true).try_init();
    FetchContext::new(config, transport.clone())
}
