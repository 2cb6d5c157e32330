use mibfs_types::{Oid, Path};

/// Daemon configuration, usually read from a TOML file.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct Config {
    /// The agent whose values are exported.
    pub agent: AgentConfig,

    #[serde(default)]
    pub mount: MountConfig,

    /// The values to export and where to put them.
    #[serde(default, rename = "entry")]
    pub entries: Vec<EntryConfig>,
}

/// The SNMP agent to talk to.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct AgentConfig {
    /// host:port the agent listens on, usually port 161.
    pub address: String,

    /// Community string sent with every request.
    pub community: String,

    /// How long to wait for an answer before retransmitting, in
    /// milliseconds.
    pub timeout_ms: Option<u64>,

    /// How many times to retransmit before giving up.
    pub retries: Option<u32>,
}

#[derive(Clone, Debug, Default, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct MountConfig {
    /// Let users other than the mount owner access the filesystem.
    #[serde(default)]
    pub allow_other: bool,
}

/// One exported value.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize, PartialEq, Eq)]
pub struct EntryConfig {
    /// Where the value appears, relative to the mountpoint.
    pub path: Path,

    /// The address of the value on the agent.
    pub oid: Oid,

    /// Fixed content. An entry with fixed content never contacts the
    /// agent.
    pub content: Option<String>,
}
