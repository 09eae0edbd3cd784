//! In-process fakes for the orchestrator's collaborators.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use shapemask::{
    application::{
        orchestrator::ShapeMaskOrchestrator,
        outcome::Failure,
        ports::{AccessChecker, AccessError, CacheError, MaskCache, MaskRenderer, RenderError},
    },
    domain::mask::ShapeMaskContext,
};
use shapemask_api_types::ShapeMaskRequest;
use tokio::sync::Notify;

pub const SESSION: &str = "session-abc";
pub const MASK: &[u8] = b"\x89PNG-mask";

pub fn raw_request(shape_id: u64, color: Option<&str>) -> Vec<u8> {
    let mut request = ShapeMaskRequest::new(shape_id, SESSION);
    if let Some(color) = color {
        request = request.with_color(color);
    }
    request.to_bytes().expect("request encodes")
}

/// Hash-map cache that counts calls and signals every write.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Bytes>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    written: Notify,
}

impl MemoryCache {
    pub fn with_entry(key: &str, value: &'static [u8]) -> Self {
        let cache = Self::default();
        cache
            .entries
            .lock()
            .expect("cache lock")
            .insert(key.to_string(), Bytes::from_static(value));
        cache
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn entry(&self, key: &str) -> Option<Bytes> {
        self.entries.lock().expect("cache lock").get(key).cloned()
    }

    pub async fn wait_for_write(&self) {
        loop {
            let notified = self.written.notified();
            if self.sets() > 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MaskCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        self.entries
            .lock()
            .expect("cache lock")
            .insert(key.to_string(), value);
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.written.notify_waiters();
        Ok(())
    }
}

/// Cache whose backend is down for both reads and writes.
#[derive(Default)]
pub struct UnavailableCache {
    set_attempts: AtomicUsize,
    attempted: Notify,
}

impl UnavailableCache {
    pub fn set_attempts(&self) -> usize {
        self.set_attempts.load(Ordering::SeqCst)
    }

    pub async fn wait_for_attempt(&self) {
        loop {
            let notified = self.attempted.notified();
            if self.set_attempts() > 0 {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl MaskCache for UnavailableCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<(), CacheError> {
        self.set_attempts.fetch_add(1, Ordering::SeqCst);
        self.attempted.notify_waiters();
        Err(CacheError::Unavailable("connection refused".into()))
    }
}

/// Cache whose writes never complete.
#[derive(Default)]
pub struct StalledCache {
    started: AtomicUsize,
}

impl StalledCache {
    pub fn writes_started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MaskCache for StalledCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes) -> Result<(), CacheError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

#[derive(Clone)]
pub enum AccessReply {
    Readable(bool),
    Downstream(u16, &'static str),
    Internal(&'static str),
}

pub struct FakeAccess {
    reply: AccessReply,
    calls: AtomicUsize,
}

impl FakeAccess {
    pub fn new(reply: AccessReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn allow() -> Self {
        Self::new(AccessReply::Readable(true))
    }

    pub fn deny() -> Self {
        Self::new(AccessReply::Readable(false))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessChecker for FakeAccess {
    async fn can_read(&self, _context: &ShapeMaskContext) -> Result<bool, AccessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            AccessReply::Readable(readable) => Ok(*readable),
            AccessReply::Downstream(code, message) => {
                Err(AccessError::Downstream(Failure::new(*code, *message)))
            }
            AccessReply::Internal(detail) => Err(AccessError::internal(*detail)),
        }
    }
}

#[derive(Clone)]
pub enum RenderReply {
    Mask(&'static [u8]),
    Absent,
    Broken,
}

pub struct FakeRenderer {
    reply: RenderReply,
    calls: AtomicUsize,
}

impl FakeRenderer {
    pub fn new(reply: RenderReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn producing(mask: &'static [u8]) -> Self {
        Self::new(RenderReply::Mask(mask))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MaskRenderer for FakeRenderer {
    async fn render(&self, _context: &ShapeMaskContext) -> Result<Option<Bytes>, RenderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            RenderReply::Mask(mask) => Ok(Some(Bytes::from_static(mask))),
            RenderReply::Absent => Ok(None),
            RenderReply::Broken => Err(RenderError::Transport("connection reset".into())),
        }
    }
}

pub fn orchestrator(
    cache: Arc<dyn MaskCache>,
    access: Arc<FakeAccess>,
    renderer: Arc<FakeRenderer>,
) -> ShapeMaskOrchestrator {
    ShapeMaskOrchestrator::new(cache, access, renderer)
}
