//! In-process message center for tests and dry runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, trace};

use super::{
    Ack, BindParams, BindResponse, ConnectTarget, Connection, Connector, Delivery, Link, LinkEvent,
    SubmitParams, SubmitResponse, TransportError,
};
use crate::classifier::status;
use crate::throttle::{ThrottleConfig, ThrottleGate};

/// Default submit_sm answer.
///
/// Written as a map, e.g. `{ type: error, code: 69 }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MockBehavior {
    /// Accept everything
    #[default]
    Success,
    /// Answer every submit with this command status
    Error { code: u32 },
}

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    pub connects: u64,
    pub binds: u64,
    pub submits: u64,
    pub enquire_links: u64,
    pub unbinds: u64,
    pub acks: u64,
}

#[derive(Default)]
struct Counters {
    connects: AtomicU64,
    binds: AtomicU64,
    submits: AtomicU64,
    enquire_links: AtomicU64,
    unbinds: AtomicU64,
    acks: AtomicU64,
}

struct Inner {
    system_id: String,
    password: String,
    behavior: Mutex<MockBehavior>,
    latency: Mutex<Duration>,
    throttle: Mutex<Option<ThrottleGate>>,
    submit_script: Mutex<VecDeque<u32>>,
    bind_script: Mutex<VecDeque<u32>>,
    answer_enquire_link: AtomicBool,
    answer_unbind: AtomicBool,
    refuse_connections: AtomicBool,
    counters: Counters,
    message_counter: AtomicU64,
    submitted: Mutex<Vec<SubmitParams>>,
    acks: Mutex<Vec<Ack>>,
    /// Link of the most recent connection
    current: Mutex<Option<Arc<MockLink>>>,
}

/// Simulated peer. Cloning shares the same state.
#[derive(Clone)]
pub struct MockSmsc {
    inner: Arc<Inner>,
}

/// Name the mock reports in bind_transceiver_resp.
pub const MOCK_SYSTEM_ID: &str = "MockSMSC";

impl MockSmsc {
    /// Accepts binds carrying exactly these credentials.
    pub fn new(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                system_id: system_id.into(),
                password: password.into(),
                behavior: Mutex::new(MockBehavior::Success),
                latency: Mutex::new(Duration::ZERO),
                throttle: Mutex::new(None),
                submit_script: Mutex::new(VecDeque::new()),
                bind_script: Mutex::new(VecDeque::new()),
                answer_enquire_link: AtomicBool::new(true),
                answer_unbind: AtomicBool::new(true),
                refuse_connections: AtomicBool::new(false),
                counters: Counters::default(),
                message_counter: AtomicU64::new(1),
                submitted: Mutex::new(Vec::new()),
                acks: Mutex::new(Vec::new()),
                current: Mutex::new(None),
            }),
        }
    }

    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        *lock(&self.inner.behavior) = behavior;
        self
    }

    /// Delay every response by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.inner.latency) = latency;
        self
    }

    /// Answer ESME_RTHROTTLED once this rate is exceeded.
    pub fn with_throttle(self, config: ThrottleConfig) -> Self {
        *lock(&self.inner.throttle) = Some(ThrottleGate::new(config));
        self
    }

    /// Answer the next submit_sm with `status`, ahead of the default behaviour.
    pub fn push_submit_status(&self, status: u32) {
        lock(&self.inner.submit_script).push_back(status);
    }

    /// Answer the next bind with `status`, ahead of the credential check.
    pub fn push_bind_status(&self, status: u32) {
        lock(&self.inner.bind_script).push_back(status);
    }

    /// When false, enquire_link requests are never answered.
    pub fn set_answer_enquire_link(&self, answer: bool) {
        self.inner.answer_enquire_link.store(answer, Ordering::SeqCst);
    }

    /// When false, unbind requests are never answered.
    pub fn set_answer_unbind(&self, answer: bool) {
        self.inner.answer_unbind.store(answer, Ordering::SeqCst);
    }

    /// When true, new connections fail with an error followed by a close.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.inner.refuse_connections.store(refuse, Ordering::SeqCst);
    }

    /// Close the current connection from the peer side. False if none was open.
    pub fn drop_connection(&self) -> bool {
        let link = lock(&self.inner.current).take();
        match link {
            Some(link) if !link.is_closed() => {
                debug!("mock dropping connection");
                link.shutdown();
                true
            }
            _ => false,
        }
    }

    /// Push a deliver_sm / data_sm to the connected session.
    pub fn deliver(&self, delivery: Delivery) -> bool {
        self.emit(LinkEvent::Deliver(delivery))
    }

    /// Send a peer-initiated enquire_link.
    pub fn enquire_link(&self, sequence: u32) -> bool {
        self.emit(LinkEvent::EnquireLink { sequence })
    }

    pub fn stats(&self) -> MockStats {
        let c = &self.inner.counters;
        MockStats {
            connects: c.connects.load(Ordering::SeqCst),
            binds: c.binds.load(Ordering::SeqCst),
            submits: c.submits.load(Ordering::SeqCst),
            enquire_links: c.enquire_links.load(Ordering::SeqCst),
            unbinds: c.unbinds.load(Ordering::SeqCst),
            acks: c.acks.load(Ordering::SeqCst),
        }
    }

    /// Every submit_sm received, in order.
    pub fn submitted(&self) -> Vec<SubmitParams> {
        lock(&self.inner.submitted).clone()
    }

    /// Every acknowledgement received, in order.
    pub fn acks(&self) -> Vec<Ack> {
        lock(&self.inner.acks).clone()
    }

    fn emit(&self, event: LinkEvent) -> bool {
        match lock(&self.inner.current).as_ref() {
            Some(link) if !link.is_closed() => link.events.send(event).is_ok(),
            _ => false,
        }
    }
}

impl Inner {
    fn latency(&self) -> Duration {
        *lock(&self.latency)
    }

    fn next_message_id(&self) -> String {
        let id = self.message_counter.fetch_add(1, Ordering::Relaxed);
        format!("MOCK{:016X}", id)
    }

    fn bind_status(&self, params: &BindParams) -> u32 {
        if let Some(status) = lock(&self.bind_script).pop_front() {
            return status;
        }
        if params.system_id == self.system_id && params.password == self.password {
            status::ESME_ROK
        } else {
            status::ESME_RBINDFAIL
        }
    }

    fn submit_status(&self) -> u32 {
        if let Some(status) = lock(&self.submit_script).pop_front() {
            return status;
        }
        if let Some(gate) = lock(&self.throttle).as_ref() {
            if !gate.reserve() {
                return status::ESME_RTHROTTLED;
            }
        }
        match &*lock(&self.behavior) {
            MockBehavior::Success => status::ESME_ROK,
            MockBehavior::Error { code } => *code,
        }
    }
}

impl Connector for MockSmsc {
    fn connect(&self, target: &ConnectTarget) -> Connection {
        self.inner.counters.connects.fetch_add(1, Ordering::SeqCst);
        let (tx, events) = mpsc::unbounded_channel();
        let link = Arc::new(MockLink::new(self.inner.clone(), tx));

        if self.inner.refuse_connections.load(Ordering::SeqCst) {
            debug!(target_addr = %target, "mock refusing connection");
            let _ = link.events.send(LinkEvent::Error("connection refused".to_string()));
            link.shutdown();
        } else {
            debug!(target_addr = %target, "mock accepted connection");
            let _ = link.events.send(LinkEvent::Connected);
            if let Some(previous) = lock(&self.inner.current).replace(link.clone()) {
                previous.shutdown();
            }
        }

        Connection { link, events }
    }
}

struct MockLink {
    smsc: Arc<Inner>,
    events: mpsc::UnboundedSender<LinkEvent>,
    closed: watch::Sender<bool>,
}

impl MockLink {
    fn new(smsc: Arc<Inner>, events: mpsc::UnboundedSender<LinkEvent>) -> Self {
        let (closed, _) = watch::channel(false);
        Self {
            smsc,
            events,
            closed,
        }
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Close once, announcing it on the event stream.
    fn shutdown(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        let _ = self.events.send(LinkEvent::Closed);
    }

    /// Wait out the configured latency, then answer. Fails if the link closes first.
    async fn respond<T>(&self, answer: impl FnOnce() -> T) -> Result<T, TransportError> {
        let mut closed = self.closed.subscribe();
        if *closed.borrow() {
            return Err(TransportError::NotConnected);
        }

        let latency = self.smsc.latency();
        tokio::select! {
            _ = closed.wait_for(|c| *c) => Err(TransportError::Closed),
            _ = sleep(latency) => Ok(answer()),
        }
    }

    /// Never answer; resolve only when the link closes.
    async fn hang<T>(&self) -> Result<T, TransportError> {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|c| *c).await;
        Err(TransportError::Closed)
    }
}

#[async_trait]
impl Link for MockLink {
    async fn bind(&self, params: BindParams) -> Result<BindResponse, TransportError> {
        self.smsc.counters.binds.fetch_add(1, Ordering::SeqCst);
        let status = self.smsc.bind_status(&params);
        trace!(system_id = %params.system_id, status = status::name(status), "mock bind");

        self.respond(|| BindResponse {
            status,
            system_id: Some(MOCK_SYSTEM_ID.to_string()),
            sc_interface_version: Some(params.interface_version),
        })
        .await
    }

    async fn submit(&self, params: SubmitParams) -> Result<SubmitResponse, TransportError> {
        self.smsc.counters.submits.fetch_add(1, Ordering::SeqCst);
        lock(&self.smsc.submitted).push(params);

        let status = self.smsc.submit_status();
        let message_id = (status == status::ESME_ROK).then(|| self.smsc.next_message_id());
        trace!(status = status::name(status), "mock submit");

        self.respond(|| SubmitResponse { status, message_id }).await
    }

    async fn enquire_link(&self) -> Result<u32, TransportError> {
        self.smsc.counters.enquire_links.fetch_add(1, Ordering::SeqCst);
        if !self.smsc.answer_enquire_link.load(Ordering::SeqCst) {
            trace!("mock ignoring enquire_link");
            return self.hang().await;
        }
        self.respond(|| status::ESME_ROK).await
    }

    async fn unbind(&self) -> Result<(), TransportError> {
        self.smsc.counters.unbinds.fetch_add(1, Ordering::SeqCst);
        if !self.smsc.answer_unbind.load(Ordering::SeqCst) {
            trace!("mock ignoring unbind");
            return self.hang().await;
        }
        self.respond(|| ()).await
    }

    async fn acknowledge(&self, ack: Ack) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::NotConnected);
        }
        self.smsc.counters.acks.fetch_add(1, Ordering::SeqCst);
        lock(&self.smsc.acks).push(ack);
        Ok(())
    }

    async fn close(&self) {
        self.shutdown();
    }
}

/// Lock ignoring poisoning; the guarded data stays consistent across a panic.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Payload, ShortMessage};

    fn bind_params(password: &str) -> BindParams {
        BindParams {
            system_id: "esme".to_string(),
            password: password.to_string(),
            system_type: String::new(),
            interface_version: 0x34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }
    }

    fn submit_params() -> SubmitParams {
        SubmitParams {
            service_type: String::new(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: "INFO".to_string(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "123".to_string(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            registered_delivery: 0,
            data_coding: 0,
            short_message: ShortMessage {
                udh: None,
                payload: Payload::Text("hi".to_string()),
            },
        }
    }

    fn target() -> ConnectTarget {
        ConnectTarget::new("127.0.0.1", 2775)
    }

    #[tokio::test]
    async fn test_connect_and_bind() {
        let smsc = MockSmsc::new("esme", "secret");
        let mut conn = smsc.connect(&target());
        assert_eq!(conn.events.recv().await, Some(LinkEvent::Connected));

        let resp = conn.link.bind(bind_params("secret")).await.unwrap();
        assert_eq!(resp.status, status::ESME_ROK);
        assert_eq!(resp.system_id.as_deref(), Some(MOCK_SYSTEM_ID));

        let resp = conn.link.bind(bind_params("wrong")).await.unwrap();
        assert_eq!(resp.status, status::ESME_RBINDFAIL);
        assert_eq!(smsc.stats().binds, 2);
    }

    #[tokio::test]
    async fn test_scripted_and_default_submit() {
        let smsc = MockSmsc::new("esme", "secret").with_behavior(MockBehavior::Error { code: 0x45 });
        smsc.push_submit_status(status::ESME_ROK);
        let conn = smsc.connect(&target());

        let first = conn.link.submit(submit_params()).await.unwrap();
        assert_eq!(first.status, status::ESME_ROK);
        assert!(first.message_id.unwrap().starts_with("MOCK"));

        let second = conn.link.submit(submit_params()).await.unwrap();
        assert_eq!(second.status, 0x45);
        assert!(second.message_id.is_none());
        assert_eq!(smsc.submitted().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_throttle() {
        let smsc = MockSmsc::new("esme", "secret").with_throttle(ThrottleConfig::new(1, Duration::from_secs(10)));
        let conn = smsc.connect(&target());

        assert_eq!(conn.link.submit(submit_params()).await.unwrap().status, status::ESME_ROK);
        assert_eq!(
            conn.link.submit(submit_params()).await.unwrap().status,
            status::ESME_RTHROTTLED
        );
    }

    #[tokio::test]
    async fn test_hanging_request_fails_on_drop() {
        let smsc = MockSmsc::new("esme", "secret");
        smsc.set_answer_unbind(false);
        let mut conn = smsc.connect(&target());
        assert_eq!(conn.events.recv().await, Some(LinkEvent::Connected));

        let link = conn.link.clone();
        let unbind = tokio::spawn(async move { link.unbind().await });
        tokio::task::yield_now().await;

        assert!(smsc.drop_connection());
        assert_eq!(unbind.await.unwrap(), Err(TransportError::Closed));
        assert_eq!(conn.events.recv().await, Some(LinkEvent::Closed));
        assert!(!smsc.drop_connection());
    }

    #[tokio::test]
    async fn test_refused_connection() {
        let smsc = MockSmsc::new("esme", "secret");
        smsc.set_refuse_connections(true);
        let mut conn = smsc.connect(&target());

        assert!(matches!(conn.events.recv().await, Some(LinkEvent::Error(_))));
        assert_eq!(conn.events.recv().await, Some(LinkEvent::Closed));
        assert_eq!(
            conn.link.bind(bind_params("secret")).await,
            Err(TransportError::NotConnected)
        );
    }
}
