//! The IPC client: socket lifecycle, frame dispatch and RPC correlation.

use std::{
    collections::HashMap,
    io::{ErrorKind, Read, Write},
    os::unix::net::UnixStream,
    path::{Path, PathBuf},
    process,
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering},
        mpsc, Arc, Condvar, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use crate::{
    errors::Error,
    framing::{FrameAssembler, FrameKind},
    message::{decode_request, decode_response, Encoder},
    queue::MultiQueue,
    sync::{lock, wait_timeout_while},
    value::Value,
};

/// The smaller of the platform limits on a local socket address.
const MAX_SOCKET_PATH: usize = 104;

/// How long the reader parks in each readiness wait.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A handler serving one local RPC method.
pub type RpcMethod = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// The callback surface of an [`IpcClient`].
///
/// Lifecycle hooks run on the client's lifecycle thread, never on the
/// reader, so a slow hook delays reconnection bookkeeping but not frame
/// reassembly. The broadcast methods back the reserved local methods the
/// server may invoke at any time; override the ones the application cares
/// about.
///
/// `()` implements the trait with every hook as a no-op.
pub trait ClientDelegate: Send + Sync {
    /// The connection is established and the pid handshake has completed.
    fn on_connect(&self) {}

    /// The connection was lost; the client will keep reconnecting.
    fn on_disconnect(&self) {}

    /// Both connection attempts failed; the client retries on the
    /// reconnect interval.
    fn on_connect_error(&self) {}

    /// Serves `ping` and `broadcastEvent`.
    fn broadcast_event(&self, _parameters: &[Value]) -> Value {
        Value::Void
    }

    /// Serves `broadcastNewDevices`.
    fn broadcast_new_devices(&self, _parameters: &[Value]) -> Value {
        Value::Void
    }

    /// Serves `broadcastDeleteDevices`.
    fn broadcast_delete_devices(&self, _parameters: &[Value]) -> Value {
        Value::Void
    }

    /// Serves `broadcastUpdateDevice`.
    fn broadcast_update_device(&self, _parameters: &[Value]) -> Value {
        Value::Void
    }
}

impl ClientDelegate for () {}

/// Connection parameters and tunables for an [`IpcClient`].
///
/// Only the socket path is mandatory; the remaining knobs default to the
/// protocol's conventional values and exist mostly so tests can compress
/// the timings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    socket_path: PathBuf,
    queue_capacity: usize,
    worker_threads: usize,
    invoke_timeout: Duration,
    reconnect_delay: Duration,
    retry_delay: Duration,
    read_chunk_size: usize,
}

impl ClientConfig {
    /// A configuration with default tunables for the endpoint at
    /// `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            queue_capacity: 100_000,
            worker_threads: 10,
            invoke_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(10),
            retry_delay: Duration::from_secs(2),
            read_chunk_size: 1024,
        }
    }

    /// The endpoint path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Per-queue item capacity of the dispatch queues.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Worker threads per dispatch queue.
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = count;
        self
    }

    /// How long [`IpcClient::invoke`] waits for a response.
    pub fn invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    /// The pause between reconnect attempts after a lost connection.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// The pause before the one retry of a failed connect attempt.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// The reader's per-read buffer size.
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size.max(1);
        self
    }
}

/// A token identifying the logical caller of an in-flight invocation.
///
/// Tokens are handed out per thread from a process-wide counter, so they
/// are unique for as long as the process lives. Nothing else about the
/// host's threading model leaks into the protocol: a cooperative scheduler
/// could mint one token per task instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(u64);

static NEXT_CALLER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CALLER_ID: CallerId = CallerId(NEXT_CALLER_ID.fetch_add(1, Ordering::Relaxed));
}

impl CallerId {
    /// The token of the calling thread.
    pub fn current() -> Self {
        CALLER_ID.with(|id| *id)
    }

    fn as_i64(self) -> i64 {
        self.0 as i64
    }

    fn from_wire(v: i64) -> Self {
        Self(v as u64)
    }
}

enum Lifecycle {
    Connected,
    Disconnected,
    ConnectError,
    Shutdown,
}

/// Blocks one caller until its response arrives.
#[derive(Default)]
struct RequestInfo {
    wait: Mutex<()>,
    ready: Condvar,
}

/// A reservation for the response to one `(caller, packet id)` pair.
#[derive(Default)]
struct ResponseSlot {
    state: Mutex<SlotState>,
}

#[derive(Default)]
struct SlotState {
    finished: bool,
    packet_id: i32,
    response: Value,
}

struct Shared {
    config: ClientConfig,
    delegate: Arc<dyn ClientDelegate>,
    encoder: Encoder,
    queues: MultiQueue<Bytes>,
    socket: Mutex<Option<Arc<UnixStream>>>,
    send_lock: Mutex<()>,
    closed: AtomicBool,
    stopped: AtomicBool,
    disposing: AtomicBool,
    packet_id: AtomicI32,
    methods: Mutex<HashMap<String, RpcMethod>>,
    requests: Mutex<HashMap<CallerId, Arc<RequestInfo>>>,
    responses: Mutex<HashMap<CallerId, HashMap<i32, Arc<ResponseSlot>>>>,
    lifecycle_tx: Mutex<Option<mpsc::Sender<Lifecycle>>>,
}

/// A client endpoint of the bidirectional RPC connection.
///
/// One client owns one connection to the peer. [`invoke`](Self::invoke)
/// issues outbound calls; requests arriving from the peer are dispatched
/// to the registered local methods on the request worker pool. The client
/// reconnects on its own after a lost connection.
///
/// All methods take `&self`; the client is meant to be shared freely
/// (typically inside an [`Arc`]) across the application's threads.
pub struct IpcClient {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    lifecycle: Mutex<Option<JoinHandle<()>>>,
    dispose_lock: Mutex<()>,
}

impl std::fmt::Debug for IpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IpcClient")
            .field("socket_path", &self.shared.config.socket_path)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl IpcClient {
    /// Construct a client for `config`, with `delegate` serving the
    /// lifecycle hooks and the reserved broadcast methods.
    ///
    /// The reserved local methods (`ping`, `broadcastEvent`,
    /// `broadcastNewDevices`, `broadcastDeleteDevices`,
    /// `broadcastUpdateDevice`) are registered here; the client does
    /// nothing else until [`start`](Self::start).
    pub fn new(config: ClientConfig, delegate: Arc<dyn ClientDelegate>) -> Self {
        let shared = Arc::new(Shared {
            queues: MultiQueue::new(2, config.queue_capacity),
            config,
            delegate: Arc::clone(&delegate),
            encoder: Encoder::new(),
            socket: Mutex::new(None),
            send_lock: Mutex::new(()),
            closed: AtomicBool::new(true),
            stopped: AtomicBool::new(true),
            disposing: AtomicBool::new(false),
            packet_id: AtomicI32::new(0),
            methods: Mutex::new(HashMap::new()),
            requests: Mutex::new(HashMap::new()),
            responses: Mutex::new(HashMap::new()),
            lifecycle_tx: Mutex::new(None),
        });

        {
            // `ping` deliberately shares the broadcastEvent handler.
            let mut methods = lock(&shared.methods);
            let d = Arc::clone(&delegate);
            methods.insert(
                "ping".to_owned(),
                Arc::new(move |p: &[Value]| d.broadcast_event(p)) as RpcMethod,
            );
            let d = Arc::clone(&delegate);
            methods.insert(
                "broadcastEvent".to_owned(),
                Arc::new(move |p: &[Value]| d.broadcast_event(p)) as RpcMethod,
            );
            let d = Arc::clone(&delegate);
            methods.insert(
                "broadcastNewDevices".to_owned(),
                Arc::new(move |p: &[Value]| d.broadcast_new_devices(p)) as RpcMethod,
            );
            let d = Arc::clone(&delegate);
            methods.insert(
                "broadcastDeleteDevices".to_owned(),
                Arc::new(move |p: &[Value]| d.broadcast_delete_devices(p)) as RpcMethod,
            );
            let d = Arc::clone(&delegate);
            methods.insert(
                "broadcastUpdateDevice".to_owned(),
                Arc::new(move |p: &[Value]| d.broadcast_update_device(p)) as RpcMethod,
            );
        }

        Self {
            shared,
            reader: Mutex::new(None),
            lifecycle: Mutex::new(None),
            dispose_lock: Mutex::new(()),
        }
    }

    /// Register (or replace) a local method the peer can invoke.
    pub fn register_method<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        lock(&self.shared.methods).insert(name.into(), Arc::new(handler));
    }

    /// Start the dispatch queues, the lifecycle thread and the reader.
    ///
    /// The reader connects on its own schedule; use the
    /// [`on_connect`](ClientDelegate::on_connect) hook or
    /// [`is_connected`](Self::is_connected) to observe the connection
    /// coming up.
    pub fn start(&self) {
        let shared = &self.shared;
        shared.stopped.store(false, Ordering::SeqCst);

        let workers = shared.config.worker_threads;
        let request_shared = Arc::clone(shared);
        shared.queues.start(0, false, workers, move |_index, frame: Bytes| {
            request_shared.process_request_frame(&frame);
        });
        let response_shared = Arc::clone(shared);
        shared.queues.start(1, false, workers, move |_index, frame: Bytes| {
            response_shared.process_response_frame(&frame);
        });

        debug!(
            "socket path is {}",
            shared.config.socket_path.display()
        );

        let (tx, rx) = mpsc::channel();
        *lock(&shared.lifecycle_tx) = Some(tx);
        {
            let shared = Arc::clone(shared);
            let handle = thread::Builder::new()
                .name("bin-ipc-lifecycle".to_owned())
                .spawn(move || lifecycle_loop(&shared, &rx));
            match handle {
                Ok(handle) => *lock(&self.lifecycle) = Some(handle),
                Err(e) => error!("could not spawn lifecycle thread: {}", e),
            }
        }

        {
            let shared = Arc::clone(shared);
            let handle = thread::Builder::new()
                .name("bin-ipc-reader".to_owned())
                .spawn(move || reader_loop(&shared));
            match handle {
                Ok(handle) => *lock(&self.reader) = Some(handle),
                Err(e) => error!("could not spawn reader thread: {}", e),
            }
        }
    }

    /// Stop the client: join the reader and lifecycle threads, close the
    /// connection and stop both queues. Idempotent.
    ///
    /// Every caller blocked in [`invoke`](Self::invoke) observes the stop
    /// flag and returns a fault.
    pub fn stop(&self) {
        let shared = &self.shared;
        if shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        // Wake blocked invokers; their wait predicate observes the flag.
        for info in lock(&shared.requests).values() {
            drop(lock(&info.wait));
            info.ready.notify_all();
        }

        if let Some(tx) = lock(&shared.lifecycle_tx).take() {
            let _ = tx.send(Lifecycle::Shutdown);
        }

        if let Some(handle) = lock(&self.reader).take() {
            let _ = handle.join();
        }
        if let Some(handle) = lock(&self.lifecycle).take() {
            let _ = handle.join();
        }

        shared.closed.store(true, Ordering::SeqCst);
        *lock(&shared.socket) = None;
        shared.queues.stop(0);
        shared.queues.stop(1);
    }

    /// Stop the client and drop every pending response reservation.
    /// Idempotent; also run by `Drop`.
    pub fn dispose(&self) {
        let _guard = lock(&self.dispose_lock);
        if self.shared.disposing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop();
        lock(&self.shared.responses).clear();
    }

    /// Whether a connection to the peer is currently established.
    pub fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Invoke `method` on the server peer and wait for its response.
    ///
    /// Protocol faults - including the timeout fault after
    /// [`ClientConfig::invoke_timeout`] without a response - are returned
    /// in-band as error values; check [`Value::is_error`].
    pub fn invoke(&self, method: &str, parameters: &[Value]) -> Value {
        self.shared.invoke(method, parameters)
    }
}

impl Drop for IpcClient {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn invoke(&self, method: &str, parameters: &[Value]) -> Value {
        let caller = CallerId::current();
        let info = Arc::clone(
            lock(&self.requests)
                .entry(caller)
                .or_insert_with(|| Arc::new(RequestInfo::default())),
        );
        let packet_id = self.packet_id.fetch_add(1, Ordering::SeqCst);

        let envelope = [
            Value::Int64(caller.as_i64()),
            Value::Int32(packet_id),
            Value::Array(parameters.to_vec()),
        ];
        let data = self.encoder.encode_request(method, &envelope, None);

        let slot = Arc::new(ResponseSlot::default());
        lock(&self.responses)
            .entry(caller)
            .or_default()
            .insert(packet_id, Arc::clone(&slot));

        let sent = self.send(&data);
        if sent.is_error() {
            self.remove_slot(caller, packet_id);
            return sent;
        }

        {
            let guard = lock(&info.wait);
            drop(wait_timeout_while(
                &info.ready,
                guard,
                self.config.invoke_timeout,
                |_| {
                    !(lock(&slot.state).finished
                        || self.closed.load(Ordering::SeqCst)
                        || self.stopped.load(Ordering::SeqCst)
                        || self.disposing.load(Ordering::SeqCst))
                },
            ));
        }

        let result = {
            let state = lock(&slot.state);
            let reply = match &state.response {
                Value::Array(items) if items.len() == 3 => Some(items[2].clone()),
                _ => None,
            };
            match reply {
                Some(reply) if state.finished && state.packet_id == packet_id => reply,
                _ => {
                    error!("no response received to rpc request, method: {}", method);
                    Value::error(-1, "No response received.")
                }
            }
        };

        self.remove_slot(caller, packet_id);
        lock(&self.requests).remove(&caller);
        result
    }

    /// Serialise `data` onto the socket under the send lock.
    fn send(&self, data: &[u8]) -> Value {
        let _guard = lock(&self.send_lock);
        let stream = lock(&self.socket).clone();
        let Some(stream) = stream else {
            error!("could not send data: {}", Error::NotConnected);
            return Value::error(-32500, "Unknown application error.");
        };

        let mut sent = 0;
        while sent < data.len() {
            match (&*stream).write(&data[sent..]) {
                Ok(0) => {
                    error!("could not send data: wrote {} of {} bytes", sent, data.len());
                    return Value::error(-32500, "Unknown application error.");
                }
                Ok(n) => sent += n,
                Err(e)
                    if e.kind() == ErrorKind::WouldBlock
                        || e.kind() == ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => {
                    error!(
                        "could not send data: wrote {} of {} bytes: {}",
                        sent,
                        data.len(),
                        e
                    );
                    return Value::error(-32500, "Unknown application error.");
                }
            }
        }
        Value::Void
    }

    /// Queue 0 worker: dispatch a request from the peer to a local method
    /// and send the reply.
    fn process_request_frame(&self, frame: &[u8]) {
        if self.disposing.load(Ordering::SeqCst) {
            return;
        }

        let (method, parameters) = decode_request(frame);
        if parameters.len() < 3 {
            error!("wrong parameter count while calling method {}", method);
            return;
        }
        let packet_id = parameters[1].clone();

        let handler = lock(&self.methods).get(&method).cloned();
        let Some(handler) = handler else {
            warn!("rpc method not found: {}", method);
            self.send_reply(packet_id, &Value::error(-32601, "Requested method not found."));
            return;
        };

        info!("server is calling rpc method: {}", method);
        let result = match &parameters[2] {
            Value::Array(arguments) => handler(arguments),
            _ => handler(&[]),
        };
        self.send_reply(packet_id, &result);
    }

    fn send_reply(&self, packet_id: Value, result: &Value) {
        let reply = Value::Array(vec![packet_id, result.clone()]);
        let data = self.encoder.encode_response(&reply);
        self.send(&data);
    }

    /// Queue 1 worker: resolve a response against its waiting caller.
    fn process_response_frame(&self, frame: &[u8]) {
        if self.disposing.load(Ordering::SeqCst) {
            return;
        }

        let items = match decode_response(frame) {
            Value::Array(items) if items.len() >= 3 => items,
            _ => {
                error!("response has wrong array size");
                return;
            }
        };
        let caller = CallerId::from_wire(items[0].as_i64());
        let packet_id = items[1].as_i32();

        let requests = lock(&self.requests);
        if let Some(info) = requests.get(&caller) {
            let guard = lock(&info.wait);
            {
                let responses = lock(&self.responses);
                if let Some(slot) = responses.get(&caller).and_then(|m| m.get(&packet_id)) {
                    let mut state = lock(&slot.state);
                    state.response = Value::Array(items);
                    state.packet_id = packet_id;
                    state.finished = true;
                }
                // A reply whose slot is gone - the caller timed out or the
                // client is shutting down - is dropped here.
            }
            drop(guard);
            info.ready.notify_all();
        }
    }

    fn remove_slot(&self, caller: CallerId, packet_id: i32) {
        let mut responses = lock(&self.responses);
        if let Some(slots) = responses.get_mut(&caller) {
            slots.remove(&packet_id);
            if slots.is_empty() {
                responses.remove(&caller);
            }
        }
    }

    /// Establish the connection, retrying a failed attempt exactly once.
    fn connect(&self) {
        let path = match clamp_socket_path(&self.config.socket_path) {
            Ok(path) => path,
            Err(e) => {
                error!("critical: {}", e);
                return;
            }
        };

        for attempt in 0..2 {
            info!("trying to connect...");
            match UnixStream::connect(&path) {
                Ok(stream) => {
                    if let Err(e) = stream.set_read_timeout(Some(POLL_INTERVAL)) {
                        error!("could not configure socket: {}", e);
                        return;
                    }
                    *lock(&self.socket) = Some(Arc::new(stream));
                    self.closed.store(false, Ordering::SeqCst);
                    self.notify_lifecycle(Lifecycle::Connected);
                    debug!("connected");
                    return;
                }
                Err(e) => {
                    if attempt == 0 {
                        // A socket that was not properly closed sometimes
                        // needs a second attempt.
                        debug!("socket closed, trying again...");
                        self.sleep_while_running(self.config.retry_delay);
                        if self.stopped.load(Ordering::SeqCst) {
                            return;
                        }
                    } else {
                        error!("could not connect to socket: {}", e);
                        self.notify_lifecycle(Lifecycle::ConnectError);
                    }
                }
            }
        }
    }

    /// Complete the connection: announce our pid, then run the hook.
    fn handshake(&self) {
        let result = self.invoke("setPid", &[Value::Int32(process::id() as i32)]);
        if result.is_error() {
            error!(
                "critical: could not transmit pid to server: {}",
                result.fault_string().unwrap_or("unknown error")
            );
            *lock(&self.socket) = None;
            self.closed.store(true, Ordering::SeqCst);
            return;
        }
        self.delegate.on_connect();
    }

    fn mark_disconnected(&self) {
        self.closed.store(true, Ordering::SeqCst);
        *lock(&self.socket) = None;
        self.notify_lifecycle(Lifecycle::Disconnected);
        self.sleep_while_running(self.config.reconnect_delay);
    }

    fn notify_lifecycle(&self, event: Lifecycle) {
        if let Some(tx) = lock(&self.lifecycle_tx).as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Sleep for `total`, returning early once the client is stopping.
    fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while !self.stopped.load(Ordering::SeqCst) {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return;
            };
            thread::sleep(remaining.min(Duration::from_millis(50)));
        }
    }
}

fn lifecycle_loop(shared: &Arc<Shared>, events: &mpsc::Receiver<Lifecycle>) {
    for event in events {
        match event {
            Lifecycle::Connected => shared.handshake(),
            Lifecycle::Disconnected => shared.delegate.on_disconnect(),
            Lifecycle::ConnectError => shared.delegate.on_connect_error(),
            Lifecycle::Shutdown => return,
        }
    }
}

fn reader_loop(shared: &Arc<Shared>) {
    shared.connect();

    let mut assembler = FrameAssembler::new();
    let mut buf = vec![0u8; shared.config.read_chunk_size];
    while !shared.stopped.load(Ordering::SeqCst) {
        if shared.closed.load(Ordering::SeqCst) {
            shared.connect();
            if shared.closed.load(Ordering::SeqCst) {
                shared.sleep_while_running(shared.config.reconnect_delay);
                continue;
            }
        }

        let stream = match lock(&shared.socket).clone() {
            Some(stream) => stream,
            None => {
                shared.closed.store(true, Ordering::SeqCst);
                continue;
            }
        };

        let read = (&*stream).read(&mut buf);
        let n = match read {
            // The 100 ms read timeout is the readiness poll; an empty
            // interval or a signal just means "try again".
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {
                continue;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                info!("connection to ipc server closed ({})", e);
                assembler.reset();
                shared.mark_disconnected();
                continue;
            }
            // A read of zero bytes is the peer closing the connection.
            Ok(0) => {
                info!("connection to ipc server closed");
                assembler.reset();
                shared.mark_disconnected();
                continue;
            }
            Ok(n) => n,
        };

        let mut processed = 0;
        while processed < n {
            match assembler.process(&buf[processed..n]) {
                Ok(consumed) => {
                    processed += consumed;
                    if assembler.is_finished() {
                        let kind = assembler.kind();
                        let frame = assembler.take_frame();
                        let queue = usize::from(kind != FrameKind::Request);
                        if !shared.queues.enqueue(queue, frame) {
                            error!("could not queue rpc packet, queue is full");
                        }
                        assembler.reset();
                    }
                }
                Err(e) => {
                    // A malformed frame is dropped along with the rest of
                    // this chunk; the connection stays open.
                    error!("error processing packet: {}", e);
                    assembler.reset();
                    break;
                }
            }
        }
    }
}

/// Bound the endpoint path to a local socket address: longer than 104
/// bytes is refused, exactly 104 is truncated to 103 (the last byte would
/// displace the address terminator).
fn clamp_socket_path(path: &Path) -> Result<PathBuf, Error> {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

    let bytes = path.as_os_str().as_bytes();
    if bytes.len() > MAX_SOCKET_PATH {
        return Err(Error::SocketPathTooLong(bytes.len()));
    }
    if bytes.len() == MAX_SOCKET_PATH {
        return Ok(PathBuf::from(OsStr::from_bytes(
            &bytes[..MAX_SOCKET_PATH - 1],
        )));
    }
    Ok(path.to_path_buf())
}
