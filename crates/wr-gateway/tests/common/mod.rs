//! Scripted collaborators for gateway integration tests
//!
//! The connector hands out connections whose pairing events are pushed by
//! the test through `ScriptedConnector::emit`.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::{mpsc, Notify};

use wr_core::error::{ConnectionError, PersistenceError, RenderError};
use wr_core::traits::{
    CodeRenderer, ConnectionHandle, Connector, NotificationSink, PairingEvents, StateStore,
};
use wr_core::{Notification, PairingEvent, Phone};
use wr_core::config::GatewayConfig;
use wr_gateway::store::MemoryStateStore;
use wr_gateway::{GatewayState, NotificationHub, SessionRegistry};

/// How long helpers wait for background pairing work
const WAIT_LIMIT: Duration = Duration::from_secs(2);
const POLL: Duration = Duration::from_millis(10);

#[derive(Default)]
struct ScriptState {
    credentials: HashSet<Phone>,
    refuse_connect: HashSet<Phone>,
    links: HashMap<Phone, mpsc::UnboundedSender<PairingEvent>>,
    held: HashMap<Phone, Arc<Notify>>,
    forgotten: Vec<Phone>,
}

/// Connector whose handshakes are driven by the test
#[derive(Default)]
pub struct ScriptedConnector {
    state: Arc<Mutex<ScriptState>>,
    opens: AtomicUsize,
    connections: Mutex<Vec<Arc<ScriptedConnection>>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend the phone already has a linked-device credential
    pub fn add_credential(&self, phone: &Phone) {
        self.state.lock().unwrap().credentials.insert(phone.clone());
    }

    /// Make every connect for this phone fail
    pub fn refuse_connect(&self, phone: &Phone) {
        self.state.lock().unwrap().refuse_connect.insert(phone.clone());
    }

    /// Park the phone's next connect until the returned gate is notified.
    /// Later connects go straight through.
    pub fn hold_connect(&self, phone: &Phone) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.state
            .lock()
            .unwrap()
            .held
            .insert(phone.clone(), Arc::clone(&gate));
        gate
    }

    /// Push a pairing event to the phone's latest handshake.
    ///
    /// Returns `false` if nobody is listening any more.
    pub fn emit(&self, phone: &Phone, event: PairingEvent) -> bool {
        let state = self.state.lock().unwrap();
        match state.links.get(phone) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn forgotten(&self) -> Vec<Phone> {
        self.state.lock().unwrap().forgotten.clone()
    }

    /// Every connection opened so far, oldest first
    pub fn connections(&self) -> Vec<Arc<ScriptedConnection>> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn open(&self, phone: &Phone) -> Result<Arc<dyn ConnectionHandle>, ConnectionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(ScriptedConnection {
            phone: phone.clone(),
            state: Arc::clone(&self.state),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            released: AtomicBool::new(false),
        });
        self.connections.lock().unwrap().push(Arc::clone(&connection));
        Ok(connection)
    }

    async fn forget(&self, phone: &Phone) -> Result<(), ConnectionError> {
        let mut state = self.state.lock().unwrap();
        state.credentials.remove(phone);
        state.forgotten.push(phone.clone());
        Ok(())
    }
}

pub struct ScriptedConnection {
    phone: Phone,
    state: Arc<Mutex<ScriptState>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    released: AtomicBool,
}

impl ScriptedConnection {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionHandle for ScriptedConnection {
    fn phone(&self) -> &Phone {
        &self.phone
    }

    fn has_credential(&self) -> bool {
        self.state.lock().unwrap().credentials.contains(&self.phone)
    }

    async fn pairing_events(&self) -> Result<PairingEvents, ConnectionError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .unwrap()
            .links
            .insert(self.phone.clone(), tx);

        Ok(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        })
        .boxed())
    }

    async fn connect(&self) -> Result<(), ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let gate = self.state.lock().unwrap().held.remove(&self.phone);
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.state.lock().unwrap().refuse_connect.contains(&self.phone) {
            return Err(ConnectionError::Refused(format!(
                "{} refused by test",
                self.phone
            )));
        }
        Ok(())
    }

    async fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn release(&self) -> Result<(), ConnectionError> {
        self.released.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that remembers every notification
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(Phone, Notification)>>,
}

impl RecordingSink {
    pub fn sent(&self) -> Vec<(Phone, Notification)> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications for one phone, in order
    pub fn for_phone(&self, phone: &Phone) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|(p, _)| p == phone)
            .map(|(_, n)| n)
            .collect()
    }

    /// Wait until the phone has at least `count` notifications
    pub async fn wait_for(&self, phone: &Phone, count: usize) -> Vec<Notification> {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        loop {
            let sent = self.for_phone(phone);
            if sent.len() >= count {
                return sent;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "expected {} notifications for {}, got {:?}",
                    count, phone, sent
                );
            }
            tokio::time::sleep(POLL).await;
        }
    }
}

impl NotificationSink for RecordingSink {
    fn send(&self, phone: &Phone, notification: Notification) {
        self.sent
            .lock()
            .unwrap()
            .push((phone.clone(), notification));
    }
}

/// State store that records writes and can be told to fail them
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryStateStore,
    writes: Mutex<Vec<(Phone, bool)>>,
    fail_writes: AtomicBool,
}

impl RecordingStore {
    pub fn writes(&self) -> Vec<(Phone, bool)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for RecordingStore {
    async fn read_authenticated(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        self.inner.read_authenticated(phone).await
    }

    async fn write_authenticated(
        &self,
        phone: &Phone,
        authenticated: bool,
    ) -> Result<(), PersistenceError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistenceError::Unavailable("store offline".into()));
        }
        self.writes
            .lock()
            .unwrap()
            .push((phone.clone(), authenticated));
        self.inner.write_authenticated(phone, authenticated).await
    }

    async fn remove(&self, phone: &Phone) -> Result<bool, PersistenceError> {
        self.inner.remove(phone).await
    }
}

/// Renderer that returns a distinct fake path per code
#[derive(Default)]
pub struct RecordingRenderer {
    codes: Mutex<Vec<String>>,
}

impl RecordingRenderer {
    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }
}

impl CodeRenderer for RecordingRenderer {
    fn render(&self, phone: &Phone, code: &str) -> Result<PathBuf, RenderError> {
        let mut codes = self.codes.lock().unwrap();
        codes.push(code.to_string());
        Ok(PathBuf::from(format!(
            "public/qr-test-{}_{:02}.png",
            phone,
            codes.len()
        )))
    }
}

/// A registry wired to scripted collaborators
pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub connector: Arc<ScriptedConnector>,
    pub sink: Arc<RecordingSink>,
    pub store: Arc<RecordingStore>,
    pub renderer: Arc<RecordingRenderer>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(RecordingSink::default()))
    }

    fn with_sink(sink: Arc<RecordingSink>) -> Self {
        let connector = Arc::new(ScriptedConnector::new());
        let store = Arc::new(RecordingStore::default());
        let renderer = Arc::new(RecordingRenderer::default());
        let registry = SessionRegistry::new(
            connector.clone(),
            sink.clone(),
            store.clone(),
            renderer.clone(),
        );
        Self {
            registry: Arc::new(registry),
            connector,
            sink,
            store,
            renderer,
        }
    }

    /// Wait for the phone's pairing task to unregister itself
    pub async fn wait_until_not_pairing(&self, phone: &Phone) {
        let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
        while self.registry.is_pairing(phone).await {
            if tokio::time::Instant::now() >= deadline {
                panic!("{} is still pairing", phone);
            }
            tokio::time::sleep(POLL).await;
        }
    }
}

/// Gateway state whose registry publishes to a real notification hub
pub fn scripted_gateway(config: GatewayConfig) -> (Arc<GatewayState>, Arc<ScriptedConnector>) {
    let connector = Arc::new(ScriptedConnector::new());
    let hub = Arc::new(NotificationHub::new());
    let registry = SessionRegistry::new(
        connector.clone(),
        hub.clone(),
        Arc::new(MemoryStateStore::new()),
        Arc::new(RecordingRenderer::default()),
    );
    let state = GatewayState::with_parts(config, Arc::new(registry), hub);
    (Arc::new(state), connector)
}

/// Give spawned tasks a moment to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
