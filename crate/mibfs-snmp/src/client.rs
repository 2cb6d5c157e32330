use crate::backend::SnmpBackend;
use crate::error::SnmpError;
use crate::value::VarBind;
use crate::wire;
use async_trait::async_trait;
use mibfs_types::Oid;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Time to wait for a response before retransmitting.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of retransmissions after the initial request.
pub const DEFAULT_RETRIES: u32 = 2;

const MAX_DATAGRAM: usize = 65535;

/// [SnmpBackend] speaking SNMPv2c over UDP to a single agent.
///
/// The socket is connected at construction time. Exchanges are
/// serialized on the socket; concurrent calls wait their turn.
pub struct UdpBackend {
    socket: Mutex<UdpSocket>,
    community: Vec<u8>,
    timeout: Duration,
    retries: u32,
    request_id: AtomicI32,
}

impl UdpBackend {
    /// Connect to the agent at `addr` with the given community string.
    pub async fn connect(
        addr: impl ToSocketAddrs,
        community: &str,
    ) -> Result<UdpBackend, SnmpError> {
        Self::connect_with(addr, community, DEFAULT_TIMEOUT, DEFAULT_RETRIES).await
    }

    /// Connect with an explicit timeout and retransmit count.
    pub async fn connect_with(
        addr: impl ToSocketAddrs,
        community: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<UdpBackend, SnmpError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(addr).await?;

        Ok(UdpBackend {
            socket: Mutex::new(socket),
            community: community.as_bytes().to_vec(),
            timeout,
            retries,
            request_id: AtomicI32::new(initial_request_id()),
        })
    }

    fn next_request_id(&self) -> i32 {
        // Keep ids in the positive range; some agents mishandle
        // negative request ids.
        self.request_id.fetch_add(1, Ordering::Relaxed) & i32::MAX
    }
}

#[async_trait]
impl SnmpBackend for UdpBackend {
    async fn get(&self, oid: &Oid) -> Result<VarBind, SnmpError> {
        let request_id = self.next_request_id();
        let request = wire::encode_get(&self.community, request_id, oid)?;

        let socket = self.socket.lock().await;
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut attempts = 0;
        while attempts <= self.retries {
            attempts += 1;
            socket.send(&request).await?;
            log::debug!("GET {oid} request #{request_id} (attempt {attempts})");

            let deadline = Instant::now() + self.timeout;
            loop {
                let n = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                    Err(_) => break, // nothing within the timeout; retransmit
                    Ok(res) => res?,
                };
                let message = match wire::decode_message(&buf[..n]) {
                    Ok(message) => message,
                    Err(err) => {
                        log::debug!("ignoring undecodable datagram from agent: {err}");
                        continue;
                    }
                };
                if message.version != wire::VERSION_2C
                    || message.pdu.kind != wire::PduKind::Response
                    || message.pdu.request_id != request_id
                {
                    // A stale response to an earlier request, most likely.
                    continue;
                }
                let pdu = message.pdu;
                if pdu.error_status != 0 {
                    return Err(SnmpError::ErrorStatus {
                        status: pdu.error_status,
                        index: pdu.error_index,
                    });
                }
                return pdu
                    .varbinds
                    .into_iter()
                    .next()
                    .ok_or(SnmpError::Malformed("response with no varbind"));
            }
        }

        Err(SnmpError::Timeout { attempts })
    }
}

fn initial_request_id() -> i32 {
    // Seeded from the clock so a restarted process doesn't reuse
    // recently sent ids.
    (std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .subsec_nanos() as i32)
        & i32::MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAgent;
    use crate::value::Value;
    use std::collections::HashMap;

    #[tokio::test]
    async fn get_returns_bound_value() -> anyhow::Result<()> {
        let oid = Oid::parse("1.3.6.1.2.1.1.5.0")?;
        let agent = ScriptedAgent::spawn(
            "public",
            HashMap::from([(oid.clone(), Value::OctetString(b"router1".to_vec()))]),
        )
        .await?;

        let backend = UdpBackend::connect(agent.addr(), "public").await?;
        let varbind = backend.get(&oid).await?;
        assert_eq!(oid, varbind.oid);
        assert_eq!(Value::OctetString(b"router1".to_vec()), varbind.value);

        Ok(())
    }

    #[tokio::test]
    async fn get_unknown_oid_returns_exception() -> anyhow::Result<()> {
        let agent = ScriptedAgent::spawn("public", HashMap::new()).await?;

        let backend = UdpBackend::connect(agent.addr(), "public").await?;
        let varbind = backend.get(&Oid::parse("1.3.6.1.9.9.9.0")?).await?;
        assert_eq!(Value::NoSuchObject, varbind.value);
        assert!(varbind.value.is_exception());

        Ok(())
    }

    #[tokio::test]
    async fn get_times_out_on_silent_agent() -> anyhow::Result<()> {
        // An agent that never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await?;

        let backend = UdpBackend::connect_with(
            silent.local_addr()?,
            "public",
            Duration::from_millis(50),
            1,
        )
        .await?;
        match backend.get(&Oid::parse("1.3.6.1.2.1.1.5.0")?).await {
            Err(SnmpError::Timeout { attempts }) => assert_eq!(2, attempts),
            other => panic!("expected timeout, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn get_reports_agent_error_status() -> anyhow::Result<()> {
        let oid = Oid::parse("1.3.6.1.2.1.1.5.0")?;
        // A hand-rolled agent that answers everything with genErr.
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((n, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(message) = wire::decode_message(&buf[..n]) else {
                    continue;
                };
                let response = wire::encode_response(
                    &message.community,
                    message.pdu.request_id,
                    5, // genErr
                    1,
                    &message.pdu.varbinds,
                )
                .unwrap();
                let _ = socket.send_to(&response, peer).await;
            }
        });

        let backend = UdpBackend::connect(addr, "public").await?;
        match backend.get(&oid).await {
            Err(SnmpError::ErrorStatus { status, index }) => {
                assert_eq!(5, status);
                assert_eq!(1, index);
            }
            other => panic!("expected error status, got {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn concurrent_gets_share_the_backend() -> anyhow::Result<()> {
        let oid1 = Oid::parse("1.3.6.1.2.1.1.5.0")?;
        let oid2 = Oid::parse("1.3.6.1.2.1.1.6.0")?;
        let agent = ScriptedAgent::spawn(
            "public",
            HashMap::from([
                (oid1.clone(), Value::Integer(1)),
                (oid2.clone(), Value::Integer(2)),
            ]),
        )
        .await?;

        let backend =
            std::sync::Arc::new(UdpBackend::connect(agent.addr(), "public").await?);
        let task1 = tokio::spawn({
            let backend = std::sync::Arc::clone(&backend);
            let oid1 = oid1.clone();
            async move { backend.get(&oid1).await }
        });
        let task2 = tokio::spawn({
            let backend = std::sync::Arc::clone(&backend);
            let oid2 = oid2.clone();
            async move { backend.get(&oid2).await }
        });
        assert_eq!(Value::Integer(1), task1.await??.value);
        assert_eq!(Value::Integer(2), task2.await??.value);

        Ok(())
    }
}
