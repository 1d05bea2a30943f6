//! Logo (asset) cache — SD-backed, keyed by process name.
//!
//! The cache predicate is file presence under the reserved `logos/`
//! directory; there is no metadata sidecar. Misses trigger a single
//! `ASSET_REQUEST` on the wire per process name — concurrent callers
//! attach to the pending request instead of re-asking. Responses are
//! matched by echoed request id and persisted atomically before the
//! callbacks fire.

pub mod base64;
pub mod fs;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::link::engine::CommandSink;
use crate::link::message::{Message, MessageKind, Payload};
use crate::link::router::MessageRouter;

use fs::LogoFs;

/// Failure delivered to a request callback. Never propagates further;
/// the UI falls back to a default logo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    /// Not cached (only from `load`; `request` goes to the wire).
    NotPresent,
    /// SD card read or write failed.
    Io,
    /// No response within the configured window.
    Timeout,
    /// The host answered with an error (or an undecodable payload).
    RemoteFailure(heapless::String<96>),
}

impl core::fmt::Display for AssetError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotPresent => write!(f, "not cached"),
            Self::Io => write!(f, "storage error"),
            Self::Timeout => write!(f, "request timed out"),
            Self::RemoteFailure(msg) => write!(f, "host error: {msg}"),
        }
    }
}

fn remote_failure(msg: &str) -> AssetError {
    let mut text = heapless::String::new();
    for ch in msg.chars() {
        if text.push(ch).is_err() {
            break;
        }
    }
    AssetError::RemoteFailure(text)
}

pub type AssetResult = Result<Vec<u8>, AssetError>;
pub type AssetCallback = Box<dyn FnOnce(AssetResult) + Send>;

struct Pending {
    request_id: String,
    issued_at_ms: u32,
    callbacks: Vec<AssetCallback>,
}

/// Cache hit/miss/expiry counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU32,
    pub misses: AtomicU32,
    pub timeouts: AtomicU32,
}

pub struct LogoCache<F: LogoFs> {
    // SD access is serialized here; large logo reads must not run on
    // the UI task.
    fs: Mutex<F>,
    sink: Arc<dyn CommandSink>,
    device_id: &'static str,
    timeout_ms: u32,
    pending: Mutex<HashMap<String, Pending>>,
    // Latest selection-driven want; resolved from the housekeeping
    // loop, never during store event dispatch.
    wanted: Mutex<Option<String>>,
    request_seq: AtomicU32,
    stats: CacheStats,
}

impl<F: LogoFs> LogoCache<F> {
    pub fn new(
        fs: F,
        sink: Arc<dyn CommandSink>,
        device_id: &'static str,
        timeout_ms: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            fs: Mutex::new(fs),
            sink,
            device_id,
            timeout_ms,
            pending: Mutex::new(HashMap::new()),
            wanted: Mutex::new(None),
            request_seq: AtomicU32::new(1),
            stats: CacheStats::default(),
        })
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// O(1) presence check.
    pub fn has(&self, process_name: &str) -> bool {
        lock(&self.fs).exists(&file_name(process_name))
    }

    /// Read a cached logo without touching the wire.
    pub fn load(&self, process_name: &str) -> AssetResult {
        let name = file_name(process_name);
        let fs = lock(&self.fs);
        if !fs.exists(&name) {
            return Err(AssetError::NotPresent);
        }
        fs.read(&name).map_err(|e| {
            warn!("assets: read {name} failed: {e}");
            AssetError::Io
        })
    }

    /// Fetch a logo, from cache or the host. Cached logos invoke the
    /// callback synchronously; otherwise it fires from the response
    /// handler or from `tick` on expiry.
    pub fn request(&self, process_name: &str, now_ms: u32, callback: impl FnOnce(AssetResult) + Send + 'static) {
        match self.load(process_name) {
            Ok(bytes) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                callback(Ok(bytes));
                return;
            }
            Err(AssetError::NotPresent) => {}
            Err(e) => {
                callback(Err(e));
                return;
            }
        }

        let key = sanitize(process_name);
        let request_id;
        {
            let mut pending = lock(&self.pending);
            if let Some(entry) = pending.get_mut(&key) {
                // Deduplicate: ride the in-flight request.
                entry.callbacks.push(Box::new(callback));
                return;
            }
            let n = self.request_seq.fetch_add(1, Ordering::Relaxed);
            request_id = format!("logo-{n}");
            pending.insert(
                key,
                Pending {
                    request_id: request_id.clone(),
                    issued_at_ms: now_ms,
                    callbacks: vec![Box::new(callback)],
                },
            );
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let msg = Message::new(
            Payload::AssetRequest {
                process_name: process_name.to_owned(),
            },
            self.device_id,
            now_ms,
        )
        .with_request_id(&request_id);
        if let Err(e) = self.sink.send_command(&msg) {
            warn!("assets: request for {process_name} not sent: {e}");
            if let Some(entry) = lock(&self.pending).remove(&sanitize(process_name)) {
                finish(entry, Err(remote_failure("link backpressure")));
            }
        }
    }

    /// Record the logo the panel wants next. Just a slot write, so
    /// store listeners may call it mid-dispatch; the fetch itself
    /// happens in [`Self::service_wanted`], outside the store lock.
    /// A newer want overwrites an unserviced older one.
    pub fn note_wanted(&self, process_name: &str) {
        *lock(&self.wanted) = Some(process_name.to_owned());
    }

    /// Resolve the pending want, if any: fetch the logo (cache or
    /// wire) and pass its display path to `on_ready` once the bytes
    /// are on SD. Called from the housekeeping loop.
    pub fn service_wanted(&self, now_ms: u32, on_ready: impl FnOnce(String) + Send + 'static) {
        let Some(name) = lock(&self.wanted).take() else {
            return;
        };
        let path = lvgl_path(&name);
        self.request(&name, now_ms, move |result| {
            if result.is_ok() {
                on_ready(path);
            }
        });
    }

    /// Handle an `ASSET_RESPONSE`, matching by echoed request id.
    pub fn handle_response(&self, msg: &Message) {
        let Payload::AssetResponse {
            success,
            error_message,
            asset_data_base64,
            ..
        } = &msg.payload
        else {
            return;
        };

        let entry = {
            let mut pending = lock(&self.pending);
            let key = pending
                .iter()
                .find(|(_, p)| p.request_id == msg.request_id)
                .map(|(k, _)| k.clone());
            match key {
                Some(k) => pending.remove_entry(&k),
                None => None,
            }
        };
        let Some((key, entry)) = entry else {
            debug!("assets: stale response {}", msg.request_id);
            return;
        };

        if !success {
            finish(entry, Err(remote_failure(error_message)));
            return;
        }

        let encoded = asset_data_base64.as_deref().unwrap_or("");
        let bytes = match base64::decode(encoded) {
            Ok(b) => b,
            Err(e) => {
                warn!("assets: undecodable payload for {key}: {e}");
                finish(entry, Err(remote_failure("bad asset encoding")));
                return;
            }
        };

        let written = lock(&self.fs).write_atomic(&format!("{key}.png"), &bytes);
        if let Err(e) = written {
            warn!("assets: persist {key} failed: {e}");
            finish(entry, Err(AssetError::Io));
            return;
        }
        finish(entry, Ok(bytes));
    }

    /// Expire pending requests past the timeout. Called from the
    /// housekeeping loop.
    pub fn tick(&self, now_ms: u32) {
        let expired: Vec<Pending> = {
            let mut pending = lock(&self.pending);
            let keys: Vec<String> = pending
                .iter()
                .filter(|(_, p)| now_ms.wrapping_sub(p.issued_at_ms) >= self.timeout_ms)
                .map(|(k, _)| k.clone())
                .collect();
            keys.into_iter().filter_map(|k| pending.remove(&k)).collect()
        };
        for entry in expired {
            self.stats.timeouts.fetch_add(1, Ordering::Relaxed);
            finish(entry, Err(AssetError::Timeout));
        }
    }

    /// Subscribe the response handler. Called once at init.
    pub fn attach(self: &Arc<Self>, router: &mut MessageRouter)
    where
        F: 'static,
    {
        let me = self.clone();
        router.subscribe(MessageKind::AssetResponse, move |msg| {
            me.handle_response(msg);
        });
    }
}

fn finish(entry: Pending, result: AssetResult) {
    let mut callbacks = entry.callbacks;
    if let Some(last) = callbacks.pop() {
        for cb in callbacks {
            cb(result.clone());
        }
        last(result);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Replace path separators and shell metacharacters so process names
/// are safe as file names.
pub fn sanitize(process_name: &str) -> String {
    process_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn file_name(process_name: &str) -> String {
    format!("{}.png", sanitize(process_name))
}

/// Toolkit-syntax path for displaying a cached logo.
pub fn lvgl_path(process_name: &str) -> String {
    format!("S:/logos/{}.png", sanitize(process_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::engine::LinkError;
    use fs::StdLogoFs;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Message>>,
    }

    impl CommandSink for RecordingSink {
        fn send_command(&self, msg: &Message) -> Result<(), LinkError> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }
    }

    fn cache(dir: &std::path::Path) -> (Arc<LogoCache<StdLogoFs>>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let fs = StdLogoFs::new(dir).unwrap();
        (LogoCache::new(fs, sink.clone(), "MIXDECK-1", 30_000), sink)
    }

    fn seen() -> (Arc<Mutex<Vec<AssetResult>>>, impl FnOnce(AssetResult) + Send) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        (log, move |r| l.lock().unwrap().push(r))
    }

    #[test]
    fn cache_hit_is_synchronous_and_silent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chrome.png"), b"B").unwrap();
        let (cache, sink) = cache(dir.path());

        let (log, cb) = seen();
        cache.request("chrome", 0, cb);

        assert_eq!(*log.lock().unwrap(), vec![Ok(b"B".to_vec())]);
        assert!(sink.sent.lock().unwrap().is_empty());
        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn concurrent_requests_share_one_wire_message() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        let (_log1, cb1) = seen();
        let (_log2, cb2) = seen();
        cache.request("vlc", 0, cb1);
        cache.request("vlc", 100, cb2);

        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(cache.pending_count(), 1);
    }

    #[test]
    fn successful_response_persists_then_completes() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        let (log, cb) = seen();
        cache.request("vlc", 0, cb);
        let request_id = sink.sent.lock().unwrap()[0].request_id.clone();

        let response = Message::new(
            Payload::AssetResponse {
                process_name: "vlc".into(),
                success: true,
                error_message: String::new(),
                asset_data_base64: Some("aGVsbG8=".into()),
                width: 32,
                height: 32,
                format: "png".into(),
            },
            "pc",
            50,
        )
        .with_request_id(&request_id);
        cache.handle_response(&response);

        assert_eq!(*log.lock().unwrap(), vec![Ok(b"hello".to_vec())]);
        assert_eq!(
            std::fs::read(dir.path().join("vlc.png")).unwrap(),
            b"hello"
        );
        assert_eq!(cache.pending_count(), 0);
        // Now a hit.
        assert!(cache.has("vlc"));
    }

    #[test]
    fn failed_response_reports_host_error() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        let (log, cb) = seen();
        cache.request("vlc", 0, cb);
        let request_id = sink.sent.lock().unwrap()[0].request_id.clone();

        let response = Message::new(
            Payload::AssetResponse {
                process_name: "vlc".into(),
                success: false,
                error_message: "no such process".into(),
                asset_data_base64: None,
                width: 0,
                height: 0,
                format: String::new(),
            },
            "pc",
            50,
        )
        .with_request_id(&request_id);
        cache.handle_response(&response);

        assert_eq!(
            *log.lock().unwrap(),
            vec![Err(remote_failure("no such process"))]
        );
        assert!(!cache.has("vlc"));
    }

    #[test]
    fn timeout_fires_once_and_allows_retry() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        let (log, cb) = seen();
        cache.request("vlc", 1_000, cb);

        cache.tick(30_999); // just inside the window
        assert!(log.lock().unwrap().is_empty());

        cache.tick(31_000);
        assert_eq!(*log.lock().unwrap(), vec![Err(AssetError::Timeout)]);
        assert_eq!(cache.pending_count(), 0);

        cache.tick(40_000); // no double fire
        assert_eq!(log.lock().unwrap().len(), 1);

        // A fresh request goes back on the wire.
        let (_log2, cb2) = seen();
        cache.request("vlc", 40_000, cb2);
        assert_eq!(sink.sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn stale_response_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, _sink) = cache(dir.path());

        let response = Message::new(
            Payload::AssetResponse {
                process_name: "vlc".into(),
                success: true,
                error_message: String::new(),
                asset_data_base64: Some("aGVsbG8=".into()),
                width: 1,
                height: 1,
                format: "png".into(),
            },
            "pc",
            0,
        )
        .with_request_id("logo-999");
        cache.handle_response(&response);
        assert!(!cache.has("vlc"));
    }

    #[test]
    fn noted_want_stays_off_the_wire_until_serviced() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        cache.note_wanted("vlc");
        assert!(sink.sent.lock().unwrap().is_empty());

        cache.service_wanted(0, |_path| {});
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(
            sink.sent.lock().unwrap()[0].kind(),
            MessageKind::AssetRequest
        );

        // The slot is consumed; servicing again is a no-op.
        cache.service_wanted(100, |_path| {});
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn newer_want_supersedes_unserviced_one() {
        let dir = tempfile::tempdir().unwrap();
        let (cache, sink) = cache(dir.path());

        cache.note_wanted("vlc");
        cache.note_wanted("chrome");
        cache.service_wanted(0, |_path| {});

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].payload,
            Payload::AssetRequest {
                process_name: "chrome".into(),
            }
        );
    }

    #[test]
    fn serviced_cache_hit_reports_display_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chrome.png"), b"B").unwrap();
        let (cache, sink) = cache(dir.path());

        let ready = Arc::new(Mutex::new(None));
        let r = ready.clone();
        cache.note_wanted("chrome");
        cache.service_wanted(0, move |path| {
            *r.lock().unwrap() = Some(path);
        });

        assert_eq!(
            ready.lock().unwrap().as_deref(),
            Some("S:/logos/chrome.png")
        );
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn sanitize_replaces_hostile_characters() {
        assert_eq!(sanitize("chrome"), "chrome");
        assert_eq!(sanitize("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize("a b;c&d"), "a_b_c_d");
        assert_eq!(sanitize(r"C:\app.exe"), "C__app.exe");
    }

    #[test]
    fn lvgl_path_uses_sanitized_name() {
        assert_eq!(lvgl_path("my app"), "S:/logos/my_app.png");
    }
}
