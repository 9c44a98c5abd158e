//! Integration tests for classcrypt with `FileRootKeySource`.

use classcrypt::prelude::*;
use classcrypt_key_file::FileRootKeySource;
use secrecy::SecretVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// File custodian that parks every fetch until the test lets it through.
struct GatedFileSource {
    inner: FileRootKeySource,
    started: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl RootKeySource for GatedFileSource {
    fn fetch_root_key(&self) -> Result<SecretVec<u8>, KeyRetrievalError> {
        self.started.lock().unwrap().send(()).unwrap();
        let _ = self.release.lock().unwrap().recv_timeout(Duration::from_secs(5));
        self.inner.fetch_root_key()
    }
}

fn file_engine(temp_dir: &TempDir) -> (Arc<FileRootKeySource>, Engine, SecurityController) {
    let source = Arc::new(FileRootKeySource::init(temp_dir.path()).expect("init failed"));
    let (engine, controller) =
        Engine::bootstrap(source.clone(), &EngineConfig::default()).expect("bootstrap failed");
    (source, engine, controller)
}

#[test]
fn test_end_to_end_with_file_source() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let (_, engine, controller) = file_engine(&temp_dir);

    for classification in Classification::ALL {
        let stored = engine.encrypt("alice@example.com", classification).unwrap();
        assert_ne!(stored, "alice@example.com");
        let plain = engine.decrypt(&stored, classification, controller.state()).unwrap();
        assert_eq!(plain, "alice@example.com");
    }
}

#[test]
fn test_restart_reads_same_keys() {
    let temp_dir = TempDir::new().unwrap();
    let (_, engine, _) = file_engine(&temp_dir);
    let stored = engine.encrypt("4111-1111-1111-1111", Classification::Financial).unwrap();
    drop(engine);

    let source = Arc::new(FileRootKeySource::new(temp_dir.path()).unwrap());
    let (engine, _) = Engine::bootstrap(source, &EngineConfig::default()).unwrap();
    let plain = engine.decrypt(&stored, Classification::Financial, SecurityState::Normal).unwrap();
    assert_eq!(plain, "4111-1111-1111-1111");
}

#[test]
fn test_classifications_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let (_, engine, _) = file_engine(&temp_dir);

    let stored = engine.encrypt("secret", Classification::Health).unwrap();
    for other in Classification::ALL.into_iter().filter(|c| *c != Classification::Health) {
        let result = engine.decrypt(&stored, other, SecurityState::Normal);
        assert!(matches!(result, Err(Error::Decryption)), "{other} opened health data");
    }
}

#[test]
fn test_rotation_through_controller_after_custodian_rotates() {
    let temp_dir = TempDir::new().unwrap();
    let (source, engine, controller) = file_engine(&temp_dir);

    let before = engine.registry().fingerprints();
    let old = engine.encrypt("555-0100", Classification::Personal).unwrap();

    source.rotate_root_key().unwrap();
    controller.transition(SecurityState::Rotating).unwrap();
    controller.transition(SecurityState::Normal).unwrap();

    let after = engine.registry().fingerprints();
    assert_eq!(engine.registry().epoch(), 1);
    for ((_, a), (_, b)) in before.iter().zip(&after) {
        assert_ne!(a, b);
    }

    // rotation covers future writes only
    assert!(matches!(
        engine.decrypt(&old, Classification::Personal, SecurityState::Normal),
        Err(Error::Decryption)
    ));
    let fresh = engine.encrypt("555-0100", Classification::Personal).unwrap();
    assert_eq!(
        engine.decrypt(&fresh, Classification::Personal, SecurityState::Normal).unwrap(),
        "555-0100"
    );
}

#[test]
fn test_rotation_without_new_root_key_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let (_, engine, controller) = file_engine(&temp_dir);

    let result = controller.transition(SecurityState::Rotating);
    assert!(matches!(result, Err(Error::RotationFailed(_))));
    assert_eq!(controller.state(), SecurityState::Normal);
    assert_eq!(engine.registry().epoch(), 0);
}

#[test]
fn test_concurrent_rotation_is_rejected() {
    let registry = Registry::initialize(&SecretVec::new(vec![1u8; 32])).unwrap();
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);

    thread::scope(|s| {
        let first = s.spawn(|| {
            registry.rotate_with(|| {
                started_tx.send(()).unwrap();
                release_rx.lock().unwrap().recv().unwrap();
                Ok(SecretVec::new(vec![2u8; 32]))
            })
        });

        started_rx.recv().unwrap();
        assert!(registry.is_rotating());
        let second = registry.rotate(&SecretVec::new(vec![3u8; 32]));
        assert!(matches!(second, Err(Error::RotationInProgress)));

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap().unwrap(), 1);
    });

    assert!(!registry.is_rotating());
    assert_eq!(registry.epoch(), 1);
}

#[test]
fn test_controller_rejects_rotation_while_custodian_is_queried() {
    let temp_dir = TempDir::new().unwrap();
    let inner = FileRootKeySource::init(temp_dir.path()).unwrap();
    let root = inner.fetch_root_key().unwrap();
    let registry = Arc::new(Registry::initialize(&root).unwrap());
    inner.rotate_root_key().unwrap();

    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let source = GatedFileSource {
        inner,
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    };
    let controller = SecurityController::new(Arc::clone(&registry), Arc::new(source));

    thread::scope(|s| {
        let first = s.spawn(|| controller.transition(SecurityState::Rotating));
        started_rx.recv().unwrap();

        let asked = Instant::now();
        let second = controller.transition(SecurityState::Rotating);
        assert!(asked.elapsed() < Duration::from_secs(1));
        assert!(matches!(second, Err(Error::RotationInProgress)));

        release_tx.send(()).unwrap();
        assert_eq!(first.join().unwrap().unwrap(), SecurityState::Rotating);
    });

    assert_eq!(registry.epoch(), 1);
    controller.transition(SecurityState::Normal).unwrap();
    let path: Vec<_> = controller.history().iter().map(|r| r.to).collect();
    assert_eq!(path, [SecurityState::Rotating, SecurityState::Normal]);
}

#[test]
fn test_rotation_is_atomic_for_concurrent_readers() {
    let registry = Arc::new(Registry::initialize(&SecretVec::new(vec![1u8; 32])).unwrap());
    let engine = Engine::new(Arc::clone(&registry));
    let done = AtomicBool::new(false);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    // a pinned handle seals and opens under one table
                    let handle = registry.lookup(Classification::Credential);
                    let sealed = handle.seal(b"hunter2").unwrap();
                    assert_eq!(handle.open(&sealed).unwrap(), b"hunter2");

                    let stored = engine.encrypt("hunter2", Classification::Credential).unwrap();
                    let opened =
                        engine.decrypt(&stored, Classification::Credential, SecurityState::Normal);
                    match opened {
                        Ok(plain) => assert_eq!(plain, "hunter2"),
                        Err(Error::Decryption) => {} // rotated between the two calls
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            });
        }

        for seed in 2..20u8 {
            registry.rotate(&SecretVec::new(vec![seed; 32])).unwrap();
        }
        done.store(true, Ordering::Release);
    });

    assert_eq!(registry.epoch(), 18);
}

#[test]
fn test_guarded_engine_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("engine.json");
    std::fs::write(
        &config_path,
        r#"{
            "unknown_labels": "reject",
            "guard": { "classifications": ["critical"], "states": ["escalating", "recovering"] }
        }"#,
    )
    .unwrap();
    let config: EngineConfig =
        serde_json::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();

    let source = Arc::new(FileRootKeySource::init(temp_dir.path().join("keys")).unwrap());
    let (engine, controller) = Engine::bootstrap(source, &config).unwrap();

    let stored = engine.encrypt("launch code", Classification::Critical).unwrap();
    controller.transition(SecurityState::Escalating).unwrap();
    assert!(matches!(
        engine.decrypt(&stored, Classification::Critical, controller.state()),
        Err(Error::AccessDenied { .. })
    ));

    controller.transition(SecurityState::Normal).unwrap();
    assert_eq!(
        engine.decrypt(&stored, Classification::Critical, controller.state()).unwrap(),
        "launch code"
    );

    assert!(matches!(
        engine.encrypt_labeled("x", "top-secret"),
        Err(Error::UnknownClassification(_))
    ));
}

#[test]
fn test_recovery_flow_records_history() {
    let temp_dir = TempDir::new().unwrap();
    let (_, _, controller) = file_engine(&temp_dir);

    controller.transition(SecurityState::Heightened).unwrap();
    controller.transition(SecurityState::Recovering).unwrap();
    let intent = controller.recovery_intent().expect("intent recorded");
    assert_eq!(intent.epoch, 0);

    controller.transition(SecurityState::Normal).unwrap();
    assert!(controller.recovery_intent().is_none());

    let path: Vec<_> = controller.history().iter().map(|r| r.to).collect();
    assert_eq!(
        path,
        [SecurityState::Heightened, SecurityState::Recovering, SecurityState::Normal]
    );
}
