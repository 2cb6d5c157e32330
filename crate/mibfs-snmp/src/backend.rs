use crate::error::SnmpError;
use crate::value::VarBind;
use async_trait::async_trait;
use mibfs_types::Oid;

/// Capability to fetch management values from a remote agent.
///
/// A backend may be shared by any number of nodes and must tolerate
/// concurrent calls; implementations serialize or multiplex network
/// traffic as they see fit. Callers must not assume any caching or
/// extra retries beyond what the implementation documents; every call
/// may round-trip to the agent.
#[async_trait]
pub trait SnmpBackend: Send + Sync {
    /// Fetch the current value bound to `oid`.
    ///
    /// A successful result may still carry an exception marker; check
    /// [Value::is_exception](crate::Value::is_exception).
    async fn get(&self, oid: &Oid) -> Result<VarBind, SnmpError>;
}
