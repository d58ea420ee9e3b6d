//! Counter persistence through a real file, for both lifetimes.

use std::fs;
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;

use myioctl_driver::{
    Access, CounterDevice, DeviceConfig, DeviceEvent, FileStore, LocalUserMemory,
    PersistencePolicy, RecordingSink, StorageOp,
};
use shared::{Count, MYIOCTL_GET_COUNT, MYIOCTL_INCREMENT};
use tempfile::tempdir;

fn device(policy: PersistencePolicy, path: &Path, sink: Arc<RecordingSink>) -> CounterDevice {
    CounterDevice::builder("myioctl")
        .persistence(policy, FileStore::new(path))
        .events(sink)
        .register()
        .expect("register")
}

fn increment(device: &CounterDevice, delta: Count) {
    let mem = Arc::new(LocalUserMemory::new());
    let session = device.open(mem.clone());
    let arg = mem.map_value(delta, Access::ReadOnly);
    session.ioctl(MYIOCTL_INCREMENT, arg).expect("INCREMENT");
}

fn get_count(device: &CounterDevice) -> Count {
    let mem = Arc::new(LocalUserMemory::new());
    let session = device.open(mem.clone());
    let out = mem.map(size_of::<Count>(), Access::ReadWrite);
    session.ioctl(MYIOCTL_GET_COUNT, out).expect("GET_COUNT");
    mem.peek_value(out).expect("mapped")
}

#[test]
fn device_lifetime_survives_reregistration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");

    let first = device(PersistencePolicy::DeviceLifetime, &path, Arc::new(RecordingSink::new()));
    increment(&first, 42);
    // nothing written while the device is up
    assert!(!path.exists());
    first.unregister();

    assert_eq!(fs::read(&path).unwrap(), (42 as Count).to_ne_bytes().to_vec());

    let second = device(PersistencePolicy::DeviceLifetime, &path, Arc::new(RecordingSink::new()));
    assert_eq!(get_count(&second), 42);
}

#[test]
fn session_lifetime_writes_on_every_close() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");
    let sink = Arc::new(RecordingSink::new());

    let first = device(PersistencePolicy::SessionLifetime, &path, sink.clone());
    increment(&first, 42);
    assert_eq!(fs::read(&path).unwrap(), (42 as Count).to_ne_bytes().to_vec());
    drop(first);

    let second = device(PersistencePolicy::SessionLifetime, &path, sink.clone());
    assert_eq!(get_count(&second), 42);
    increment(&second, -2);
    assert_eq!(get_count(&second), 40);
}

#[test]
fn session_lifetime_picks_up_external_writes_on_open() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");
    let device = device(PersistencePolicy::SessionLifetime, &path, Arc::new(RecordingSink::new()));

    increment(&device, 1);
    fs::write(&path, (1000 as Count).to_ne_bytes()).unwrap();
    assert_eq!(get_count(&device), 1000);
}

#[test]
fn missing_file_keeps_zero_and_reports_the_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent");
    let sink = Arc::new(RecordingSink::new());

    let device = device(PersistencePolicy::DeviceLifetime, &path, sink.clone());
    assert_eq!(get_count(&device), 0);
    assert_eq!(
        sink.count(|e| matches!(e, DeviceEvent::StorageUnavailable { op: StorageOp::Load, .. })),
        1
    );
}

#[test]
fn truncated_file_is_not_loaded() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");
    fs::write(&path, [7u8, 0, 0]).unwrap();
    let sink = Arc::new(RecordingSink::new());

    let device = device(PersistencePolicy::SessionLifetime, &path, sink.clone());
    increment(&device, 5);
    assert_eq!(get_count(&device), 5);
    assert!(sink.count(|e| matches!(e, DeviceEvent::StorageUnavailable { .. })) >= 1);
    // the first close rewrote it with a whole blob
    assert_eq!(fs::metadata(&path).unwrap().len(), size_of::<Count>() as u64);
}

#[test]
fn unwritable_location_never_fails_the_device() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("counter");
    let sink = Arc::new(RecordingSink::new());

    let device = device(PersistencePolicy::SessionLifetime, &path, sink.clone());
    increment(&device, 3);
    assert_eq!(get_count(&device), 3);
    device.unregister();

    assert!(sink.count(|e| matches!(e, DeviceEvent::StorageUnavailable { op: StorageOp::Save, .. })) >= 2);
    assert!(!path.exists());
}

#[test]
fn config_selects_file_persistence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("counter");
    let config: DeviceConfig = toml::from_str(&format!(
        "name = \"myioctl\"\n[persistence]\npolicy = \"session\"\npath = {:?}\n",
        path.to_string_lossy()
    ))
    .unwrap();

    let device = myioctl_driver::DeviceBuilder::from_config(&config)
        .events(Arc::new(RecordingSink::new()))
        .register()
        .unwrap();
    assert_eq!(device.policy(), Some(PersistencePolicy::SessionLifetime));
    increment(&device, 9);
    assert_eq!(fs::read(&path).unwrap(), (9 as Count).to_ne_bytes().to_vec());
}
