//! Wire-level logo cache tests: miss → ASSET_REQUEST → ASSET_RESPONSE
//! → SD persistence, plus the timeout and stale-response paths, all
//! through the running link engine.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use mixdeck::assets::fs::StdLogoFs;
use mixdeck::assets::{AssetError, AssetResult, LogoCache};
use mixdeck::link::engine::{CommandSink, LinkCommandSink, SerialEngine};
use mixdeck::link::message::{Message, MessageKind, Payload};
use mixdeck::link::router::MessageRouter;

use crate::mock_link::{
    self, decode_messages, drain_shared_state, frame_message, wait_for, MockTransport,
};

fn lock() -> MutexGuard<'static, ()> {
    match mock_link::LINK_LOCK.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

struct Rig {
    engine: SerialEngine<MockTransport>,
    wire: mock_link::WireHandle,
    cache: Arc<LogoCache<StdLogoFs>>,
}

fn start_rig(dir: &std::path::Path) -> Rig {
    drain_shared_state();

    let (transport, wire) = MockTransport::new();
    let mut engine = SerialEngine::new(transport, 200);
    let sink: Arc<dyn CommandSink> = Arc::new(LinkCommandSink::new(engine.tx(), 50));

    let fs = StdLogoFs::new(dir).unwrap();
    let cache = LogoCache::new(fs, sink, "MIXDECK-1", 30_000);
    let mut router = MessageRouter::new();
    cache.attach(&mut router);

    engine.start(router);
    Rig { engine, wire, cache }
}

fn seen() -> (Arc<Mutex<Vec<AssetResult>>>, impl FnOnce(AssetResult) + Send) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let l = log.clone();
    (log, move |r| l.lock().unwrap().push(r))
}

fn response(request_id: &str, data: Option<&str>, error: &str) -> Message {
    Message::new(
        Payload::AssetResponse {
            process_name: "vlc".into(),
            success: data.is_some(),
            error_message: error.to_owned(),
            asset_data_base64: data.map(str::to_owned),
            width: 32,
            height: 32,
            format: if data.is_some() { "png".into() } else { String::new() },
        },
        "pc",
        50,
    )
    .with_request_id(request_id)
}

fn sent_asset_requests(wire: &mock_link::WireHandle) -> Vec<Message> {
    decode_messages(&wire.written())
        .into_iter()
        .filter(|m| m.kind() == MessageKind::AssetRequest)
        .collect()
}

#[test]
fn miss_round_trips_through_host_and_persists() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let mut rig = start_rig(dir.path());

    let (log, cb) = seen();
    rig.cache.request("vlc", 0, cb);

    let wire = rig.wire.clone();
    assert!(
        wait_for(Duration::from_secs(2), || !sent_asset_requests(&wire).is_empty()),
        "ASSET_REQUEST never written"
    );
    let request = &sent_asset_requests(&rig.wire)[0];
    assert_eq!(
        request.payload,
        Payload::AssetRequest {
            process_name: "vlc".into(),
        }
    );

    rig.wire
        .push_rx(&frame_message(&response(&request.request_id, Some("aGVsbG8="), "")));

    let cache = rig.cache.clone();
    assert!(
        wait_for(Duration::from_secs(2), || cache.has("vlc")),
        "logo never persisted"
    );
    assert_eq!(*log.lock().unwrap(), vec![Ok(b"hello".to_vec())]);
    assert_eq!(std::fs::read(dir.path().join("vlc.png")).unwrap(), b"hello");

    rig.engine.stop();
    drain_shared_state();
}

#[test]
fn cache_hit_never_touches_the_wire() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("chrome.png"), b"LOGO").unwrap();
    let mut rig = start_rig(dir.path());

    let (log, cb) = seen();
    rig.cache.request("chrome", 0, cb);

    // Synchronous on the caller's thread.
    assert_eq!(*log.lock().unwrap(), vec![Ok(b"LOGO".to_vec())]);

    std::thread::sleep(Duration::from_millis(50));
    assert!(decode_messages(&rig.wire.written()).is_empty());

    rig.engine.stop();
    drain_shared_state();
}

#[test]
fn host_failure_is_reported_without_persisting() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let mut rig = start_rig(dir.path());

    let (log, cb) = seen();
    rig.cache.request("vlc", 0, cb);

    let wire = rig.wire.clone();
    assert!(wait_for(Duration::from_secs(2), || !sent_asset_requests(&wire).is_empty()));
    let request_id = sent_asset_requests(&rig.wire)[0].request_id.clone();

    rig.wire
        .push_rx(&frame_message(&response(&request_id, None, "no such process")));

    let log_probe = log.clone();
    assert!(wait_for(Duration::from_secs(2), || {
        !log_probe.lock().unwrap().is_empty()
    }));
    assert!(matches!(
        log.lock().unwrap()[0],
        Err(AssetError::RemoteFailure(_))
    ));
    assert!(!rig.cache.has("vlc"));

    rig.engine.stop();
    drain_shared_state();
}

#[test]
fn timeout_expires_pending_and_stale_response_is_ignored() {
    let _guard = lock();
    let dir = tempfile::tempdir().unwrap();
    let mut rig = start_rig(dir.path());

    let (log, cb) = seen();
    rig.cache.request("vlc", 1_000, cb);

    let wire = rig.wire.clone();
    assert!(wait_for(Duration::from_secs(2), || !sent_asset_requests(&wire).is_empty()));
    let request_id = sent_asset_requests(&rig.wire)[0].request_id.clone();

    rig.cache.tick(31_000);
    assert_eq!(*log.lock().unwrap(), vec![Err(AssetError::Timeout)]);
    assert_eq!(rig.cache.pending_count(), 0);

    // The host answers late; the id no longer matches anything.
    rig.wire
        .push_rx(&frame_message(&response(&request_id, Some("aGVsbG8="), "")));
    std::thread::sleep(Duration::from_millis(50));
    assert!(!rig.cache.has("vlc"));

    // A retry goes out with a fresh id.
    let (_log2, cb2) = seen();
    rig.cache.request("vlc", 31_100, cb2);
    assert!(wait_for(Duration::from_secs(2), || {
        sent_asset_requests(&wire).len() == 2
    }));
    let requests = sent_asset_requests(&rig.wire);
    assert_ne!(requests[0].request_id, requests[1].request_id);

    rig.engine.stop();
    drain_shared_state();
}
