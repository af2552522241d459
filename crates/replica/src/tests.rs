//! Tests for the LocalReplica with a small native counter canister.

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use anyhow::bail;
use canister::Agent;
use canister::AgentError;
use canister::BasicIdentity;
use canister::InstallMode;
use canister::Mode;
use canister::Principal;
use canister::RejectCode;
use canister::Value;

use crate::native::NativeCanister;
use crate::replica::LocalReplica;

/// An empty wasm module carrying a custom section named "counter".
const COUNTER_WASM: &[u8] = b"\0asm\x01\0\0\0\x00\x08\x07counter";

/// Same counter, but its instances refuse every snapshot.
const BROKEN_WASM: &[u8] = b"\0asm\x01\0\0\0\x00\x07\x06broken";

/// Native canister holding a single counter.
#[derive(Default)]
struct Counter {
    value: AtomicU64,
    refuse_restore: bool,
}

#[async_trait::async_trait]
impl NativeCanister for Counter {
    async fn handle(&self, method: &str, mode: Mode, _args: Vec<Value>) -> anyhow::Result<Vec<Value>> {
        match (method, mode) {
            ("get", _) => Ok(vec![Value::Nat64(self.value.load(Ordering::SeqCst))]),
            ("inc", Mode::Update) => Ok(vec![Value::Nat64(self.value.fetch_add(1, Ordering::SeqCst) + 1)]),
            ("inc", Mode::Query) => bail!("inc must be called as an update"),
            _ => bail!("unknown method {}", method),
        }
    }

    fn snapshot(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.value.load(Ordering::SeqCst).to_le_bytes().to_vec())
    }

    fn restore(&self, snapshot: &[u8]) -> anyhow::Result<()> {
        if self.refuse_restore {
            bail!("snapshot format not supported");
        }
        let bytes: [u8; 8] = snapshot.try_into()?;
        self.value.store(u64::from_le_bytes(bytes), Ordering::SeqCst);
        Ok(())
    }
}

fn replica() -> LocalReplica {
    let replica = LocalReplica::new();
    replica.register_module(COUNTER_WASM, || Arc::new(Counter::default()));
    replica.register_module(BROKEN_WASM, || {
        Arc::new(Counter {
            refuse_restore: true,
            ..Counter::default()
        })
    });
    replica
}

fn rejected_with(err: AgentError, expected: RejectCode) -> String {
    match err {
        AgentError::Rejected { code, message } if code == expected => message,
        other => panic!("Expected {} reject, got {:?}", expected, other),
    }
}

#[tokio::test]
async fn test_create_allocates_sequential_ids() {
    let replica = replica();

    let a = replica.create_canister().await.unwrap();
    let b = replica.create_canister().await.unwrap();

    assert_eq!(a.to_text(), "rwlgt-iiaaa-aaaaa-aaaaa-cai");
    assert_eq!(b.to_text(), "rrkah-fqaaa-aaaaa-aaaaq-cai");
    assert_eq!(replica.canister_count(), 2);
    assert_eq!(replica.controller(&a), Some(Principal::anonymous()));
}

#[tokio::test]
async fn test_identity_becomes_controller() {
    let me = Principal::from_slice(&[7, 7, 7]).unwrap();
    let replica = LocalReplica::with_identity(BasicIdentity::new(me.clone()));

    let id = replica.create_canister().await.unwrap();
    assert_eq!(replica.controller(&id), Some(me));
}

#[tokio::test]
async fn test_install_then_call() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();

    replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap();
    assert!(replica.module_hash(&id).is_some());

    assert_eq!(replica.update(&id, "inc", &[]).await.unwrap(), vec![Value::Nat64(1)]);
    assert_eq!(replica.update(&id, "inc", &[]).await.unwrap(), vec![Value::Nat64(2)]);
    assert_eq!(replica.query(&id, "get", &[]).await.unwrap(), vec![Value::Nat64(2)]);
}

#[tokio::test]
async fn test_call_before_install_is_rejected() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();

    let err = replica.query(&id, "get", &[]).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert!(message.contains("no installed code"));
}

#[tokio::test]
async fn test_unknown_canister_is_rejected() {
    let replica = replica();

    let err = replica.query(&Principal::management(), "get", &[]).await.unwrap_err();
    rejected_with(err, RejectCode::DestinationInvalid);

    let err = replica
        .install_code(&Principal::from_canister_index(9), COUNTER_WASM, InstallMode::Install)
        .await
        .unwrap_err();
    rejected_with(err, RejectCode::DestinationInvalid);
}

#[tokio::test]
async fn test_install_rejects_invalid_and_unknown_modules() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();

    let err = replica.install_code(&id, b"not wasm", InstallMode::Install).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert!(message.contains("Invalid wasm module"));

    let unknown = b"\0asm\x01\0\0\0";
    let err = replica.install_code(&id, unknown, InstallMode::Install).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert!(message.contains("No native implementation"));
}

#[tokio::test]
async fn test_install_twice_requires_reinstall() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();

    replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap();
    replica.update(&id, "inc", &[]).await.unwrap();

    let err = replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap_err();
    rejected_with(err, RejectCode::CanisterError);

    // Reinstall wipes state.
    replica.install_code(&id, COUNTER_WASM, InstallMode::Reinstall).await.unwrap();
    assert_eq!(replica.query(&id, "get", &[]).await.unwrap(), vec![Value::Nat64(0)]);
}

#[tokio::test]
async fn test_native_error_becomes_canister_error() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();
    replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap();

    let err = replica.query(&id, "inc", &[]).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert_eq!(message, "inc must be called as an update");
}

#[tokio::test]
async fn test_upgrade_keeps_state() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();
    replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap();
    replica.update(&id, "inc", &[]).await.unwrap();
    replica.update(&id, "inc", &[]).await.unwrap();

    replica.install_code(&id, COUNTER_WASM, InstallMode::Upgrade).await.unwrap();
    assert_eq!(replica.query(&id, "get", &[]).await.unwrap(), vec![Value::Nat64(2)]);

    replica.update(&id, "inc", &[]).await.unwrap();
    assert_eq!(replica.query(&id, "get", &[]).await.unwrap(), vec![Value::Nat64(3)]);
}

#[tokio::test]
async fn test_upgrade_requires_installed_code() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();

    let err = replica.install_code(&id, COUNTER_WASM, InstallMode::Upgrade).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert!(message.ends_with("has no installed code to upgrade"), "{}", message);
    assert!(replica.module_hash(&id).is_none());
}

#[tokio::test]
async fn test_failed_upgrade_keeps_old_instance() {
    let replica = replica();
    let id = replica.create_canister().await.unwrap();
    replica.install_code(&id, COUNTER_WASM, InstallMode::Install).await.unwrap();
    replica.update(&id, "inc", &[]).await.unwrap();
    let before = replica.module_hash(&id);

    let err = replica.install_code(&id, BROKEN_WASM, InstallMode::Upgrade).await.unwrap_err();
    let message = rejected_with(err, RejectCode::CanisterError);
    assert!(message.contains("trapped in post-upgrade: snapshot format not supported"), "{}", message);

    assert_eq!(replica.module_hash(&id), before);
    assert_eq!(replica.query(&id, "get", &[]).await.unwrap(), vec![Value::Nat64(1)]);
}
