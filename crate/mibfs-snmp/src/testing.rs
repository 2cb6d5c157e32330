//! Backends and agents for use in tests.

use crate::backend::SnmpBackend;
use crate::error::SnmpError;
use crate::value::{Value, VarBind};
use crate::wire::{self, PduKind};
use async_trait::async_trait;
use mibfs_types::Oid;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// In-memory [SnmpBackend].
///
/// Serves values from a map; OIDs with no entry answer
/// [Value::NoSuchObject], like a real agent would. Failures can be
/// queued up; each one is consumed by a single get call, before the
/// map is consulted.
pub struct FakeBackend {
    values: Mutex<HashMap<Oid, Value>>,
    failures: Mutex<VecDeque<SnmpError>>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> FakeBackend {
        FakeBackend {
            values: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Bind `oid` to `value`, replacing any previous binding.
    pub fn set(&self, oid: Oid, value: Value) {
        self.values.lock().unwrap().insert(oid, value);
    }

    /// Queue a failure, to be returned by an upcoming get call.
    pub fn push_failure(&self, err: SnmpError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Number of get calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        FakeBackend::new()
    }
}

#[async_trait]
impl SnmpBackend for FakeBackend {
    async fn get(&self, oid: &Oid) -> Result<VarBind, SnmpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let value = self
            .values
            .lock()
            .unwrap()
            .get(oid)
            .cloned()
            .unwrap_or(Value::NoSuchObject);

        Ok(VarBind {
            oid: oid.clone(),
            value,
        })
    }
}

/// A real UDP agent on localhost, answering from a fixed value map.
///
/// Requests with the wrong community are dropped. Requested OIDs with
/// no entry in the map are answered with [Value::NoSuchObject]. The
/// agent stops when dropped.
pub struct ScriptedAgent {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ScriptedAgent {
    /// Start an agent serving `values` for the given community.
    pub async fn spawn(
        community: &str,
        values: HashMap<Oid, Value>,
    ) -> anyhow::Result<ScriptedAgent> {
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let community = community.as_bytes().to_vec();
        let handle = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(message) = wire::decode_message(&buf[..n]) else {
                    continue;
                };
                if message.community != community || message.pdu.kind != PduKind::GetRequest {
                    continue;
                }
                let varbinds = message
                    .pdu
                    .varbinds
                    .iter()
                    .map(|vb| VarBind {
                        oid: vb.oid.clone(),
                        value: values.get(&vb.oid).cloned().unwrap_or(Value::NoSuchObject),
                    })
                    .collect::<Vec<_>>();
                let Ok(response) =
                    wire::encode_response(&community, message.pdu.request_id, 0, 0, &varbinds)
                else {
                    continue;
                };
                let _ = socket.send_to(&response, peer).await;
            }
        });

        Ok(ScriptedAgent { addr, handle })
    }

    /// Address to connect a [UdpBackend](crate::UdpBackend) to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for ScriptedAgent {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
