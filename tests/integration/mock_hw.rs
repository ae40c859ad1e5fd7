//! Mock ports for integration tests.
//!
//! Every mock records what the update pipeline asked of it so tests can
//! assert on the full request / write history without a network, NVS or
//! flash partition.

#![allow(dead_code)]

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use otam::app::adapter::DeviceAdapter;
use otam::app::ports::{
    ByteSource, FlashDriver, FlashDriverError, HttpClient, HttpResponse, Method, StorageError,
    StoragePort, StreamHead, SystemPort, TransportError,
};
use otam::app::updater::FlashUpdater;
use otam::config::{OtamConfig, STORE_NAMESPACE, UpdateLimits};
use otam::events::{Event, EventRegistry, listener};

// ── Fixtures ──────────────────────────────────────────────────

pub const BASE_URL: &str = "https://otam.test/api";
pub const API_KEY: &str = "test-key";
pub const GUID: &str = "guid-0001";

pub const STATUS_PENDING: &str = r#"{"deviceStatus":"UPDATE_PENDING","firmwareFileId":3,"firmwareId":9,"firmwareName":"app","firmwareVersion":"1.2.0","firmwareSize":123456}"#;

/// Comfortably inside the default flash size bounds.
pub const IMAGE_LEN: usize = 100 * 1024;

pub fn config() -> OtamConfig {
    OtamConfig {
        api_key: API_KEY.into(),
        base_url: BASE_URL.into(),
        device_id: "D1".into(),
        device_profile_id: 7,
    }
}

pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub type TestAdapter = DeviceAdapter<MockHttp, MockStore, MockSystem>;
pub type TestUpdater = FlashUpdater<MockFlash, MockStore>;

pub fn adapter(http: MockHttp, store: MockStore) -> TestAdapter {
    DeviceAdapter::new(config(), UpdateLimits::default(), http, store, MockSystem::plenty())
}

/// Store already holding an identity that matches [`config`].
pub fn registered_store() -> MockStore {
    let store = MockStore::new();
    store.put(KEY_GUID, GUID.as_bytes());
    store.put(KEY_DEVICE_ID, b"D1");
    store.put(KEY_PROFILE_ID, &7i32.to_le_bytes());
    store
}

/// Initialised adapter whose status endpoint reports a pending update and
/// whose download URL serves `payload`.
pub fn adapter_with_update(payload: Vec<u8>) -> TestAdapter {
    let mut http = MockHttp::new();
    http.reply(Method::Get, "/status", 200, STATUS_PENDING);
    http.reply(Method::Get, "/firmware-file-url", 200, "https://cdn.test/fw.bin");
    http.reply(Method::Post, "/status", 200, "ok");
    http.serve(payload);
    let mut adapter = adapter(http, registered_store());
    adapter.init().unwrap();
    adapter
}

pub const KEY_GUID: &str = "device_guid";
pub const KEY_DEVICE_ID: &str = "device_id";
pub const KEY_PROFILE_ID: &str = "device_profile_id";
pub const KEY_UPDATE_COMPLETE: &str = "fw_update_complete";

/// Subscribe a recorder to `kinds` and return the shared log.
pub fn record<E, const K: usize, const N: usize>(
    registry: &EventRegistry<E, K, N>,
    kinds: &[E::Kind],
) -> Rc<RefCell<Vec<E>>>
where
    E: Event + Clone + 'static,
{
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let handle = listener(move |ev: &E| sink.borrow_mut().push(ev.clone()));
    for kind in kinds {
        registry.subscribe(*kind, &handle).unwrap();
    }
    log
}

// ── MockHttp ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Route {
    method: Method,
    suffix: String,
    reply: Result<HttpResponse, TransportError>,
}

/// Scripted download response.
pub struct StreamScript {
    pub status: u16,
    pub content_length: Option<usize>,
    pub payload: Vec<u8>,
    /// Fail every read once this many bytes were delivered.
    pub fail_after: Option<usize>,
    /// Upper bound on bytes returned per read.
    pub max_read: usize,
}

pub struct MockHttp {
    routes: Vec<Route>,
    pub stream: Option<StreamScript>,
    pub requests: Vec<RecordedRequest>,
}

impl MockHttp {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            stream: None,
            requests: Vec::new(),
        }
    }

    /// Answer `method` requests whose URL ends with `suffix`.
    pub fn reply(&mut self, method: Method, suffix: &str, status: u16, body: &str) {
        self.routes.push(Route {
            method,
            suffix: suffix.into(),
            reply: Ok(HttpResponse {
                status,
                body: body.into(),
            }),
        });
    }

    pub fn fail(&mut self, method: Method, suffix: &str, err: TransportError) {
        self.routes.push(Route {
            method,
            suffix: suffix.into(),
            reply: Err(err),
        });
    }

    /// Serve `payload` with a correct `Content-Length` on every stream.
    pub fn serve(&mut self, payload: Vec<u8>) {
        self.stream = Some(StreamScript {
            status: 200,
            content_length: Some(payload.len()),
            payload,
            fail_after: None,
            max_read: usize::MAX,
        });
    }

    pub fn stream_mut(&mut self) -> &mut StreamScript {
        self.stream.as_mut().expect("no stream scripted")
    }

    pub fn count(&self, method: Method, suffix: &str) -> usize {
        self.requests
            .iter()
            .filter(|r| r.method == method && r.url.ends_with(suffix))
            .count()
    }

    pub fn last(&self, method: Method, suffix: &str) -> Option<&RecordedRequest> {
        self.requests
            .iter()
            .rev()
            .find(|r| r.method == method && r.url.ends_with(suffix))
    }

    fn record(&mut self, method: Method, url: &str, headers: &[(&str, &str)], body: Option<&str>) {
        self.requests.push(RecordedRequest {
            method,
            url: url.into(),
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
            body: body.map(str::to_owned),
        });
    }
}

impl Default for MockHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for MockHttp {
    type Body<'a>
        = MockBody<'a>
    where
        Self: 'a;

    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        self.record(method, url, headers, body);
        self.routes
            .iter()
            .rev()
            .find(|r| r.method == method && url.ends_with(r.suffix.as_str()))
            .map_or(
                Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                }),
                |r| r.reply.clone(),
            )
    }

    fn get_stream(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<(StreamHead, MockBody<'_>), TransportError> {
        self.record(Method::Get, url, headers, None);
        let script = self.stream.as_ref().ok_or(TransportError::Connect)?;
        let head = StreamHead {
            status: script.status,
            content_length: script.content_length,
        };
        let body = MockBody {
            data: &script.payload,
            pos: 0,
            fail_after: script.fail_after,
            max_read: script.max_read,
        };
        Ok((head, body))
    }
}

pub struct MockBody<'a> {
    data: &'a [u8],
    pos: usize,
    fail_after: Option<usize>,
    max_read: usize,
}

impl ByteSource for MockBody<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut n = buf.len().min(self.data.len() - self.pos).min(self.max_read);
        if let Some(limit) = self.fail_after {
            if self.pos >= limit {
                return Err(TransportError::Io);
            }
            n = n.min(limit - self.pos);
        }
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

// ── MockStore ─────────────────────────────────────────────────

#[derive(Default)]
pub struct StoreState {
    pub values: HashMap<String, Vec<u8>>,
    pub fail_open: bool,
    /// Writes to this key fail with `IoError`.
    pub fail_write: Option<String>,
    /// Keys in write order.
    pub writes: Vec<String>,
}

/// Shared in-memory store; clones see the same state.
#[derive(Clone, Default)]
pub struct MockStore {
    inner: Rc<RefCell<StoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RefMut<'_, StoreState> {
        self.inner.borrow_mut()
    }

    pub fn put(&self, key: &str, value: &[u8]) {
        self.state().values.insert(key.into(), value.to_vec());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.borrow().values.get(key).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| String::from_utf8(v).unwrap())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).map(|v| i32::from_le_bytes(v.try_into().unwrap()))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).map(|v| v[0] != 0)
    }

    pub fn write_count(&self, key: &str) -> usize {
        self.inner.borrow().writes.iter().filter(|k| *k == key).count()
    }
}

impl StoragePort for MockStore {
    fn open(&mut self, namespace: &str) -> Result<(), StorageError> {
        assert_eq!(namespace, STORE_NAMESPACE);
        if self.inner.borrow().fail_open {
            Err(StorageError::OpenFailed)
        } else {
            Ok(())
        }
    }

    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        assert_eq!(namespace, STORE_NAMESPACE);
        let state = self.inner.borrow();
        let data = state.values.get(key).ok_or(StorageError::NotFound)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        assert_eq!(namespace, STORE_NAMESPACE);
        let mut state = self.state();
        if state.fail_write.as_deref() == Some(key) {
            return Err(StorageError::IoError);
        }
        state.writes.push(key.into());
        state.values.insert(key.into(), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, _namespace: &str, key: &str) -> Result<(), StorageError> {
        self.state().values.remove(key);
        Ok(())
    }

    fn exists(&self, _namespace: &str, key: &str) -> bool {
        self.inner.borrow().values.contains_key(key)
    }
}

// ── MockFlash ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockFlash {
    // Fault injection
    pub begin_error: Option<FlashDriverError>,
    /// Index of the write call that comes back short.
    pub short_write_at: Option<usize>,
    pub end_error: Option<FlashDriverError>,
    pub never_finished: bool,

    // Recorded behaviour
    pub began: Vec<usize>,
    pub written: Vec<u8>,
    pub write_calls: usize,
    pub aborted: bool,
    pub ended: bool,
    pub finished: bool,
    pub last_error: Option<FlashDriverError>,
}

impl MockFlash {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlashDriver for MockFlash {
    fn begin(&mut self, size: usize) -> Result<(), FlashDriverError> {
        self.began.push(size);
        if let Some(e) = self.begin_error {
            self.last_error = Some(e);
            return Err(e);
        }
        self.written.clear();
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let idx = self.write_calls;
        self.write_calls += 1;
        if self.short_write_at == Some(idx) {
            self.last_error = Some(FlashDriverError::Write);
            return data.len() / 2;
        }
        self.written.extend_from_slice(data);
        data.len()
    }

    fn end(&mut self) -> Result<(), FlashDriverError> {
        self.ended = true;
        if let Some(e) = self.end_error {
            self.last_error = Some(e);
            return Err(e);
        }
        self.finished = !self.never_finished;
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn abort(&mut self) {
        self.aborted = true;
    }

    fn last_error(&self) -> Option<FlashDriverError> {
        self.last_error
    }
}

// ── MockSystem ────────────────────────────────────────────────

pub struct MockSystem {
    pub free_heap: usize,
}

impl MockSystem {
    pub fn plenty() -> Self {
        Self {
            free_heap: 8 * 1024 * 1024,
        }
    }
}

impl SystemPort for MockSystem {
    fn free_heap(&self) -> usize {
        self.free_heap
    }
}
