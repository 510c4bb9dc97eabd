use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeHeartbeat {
    pub node: String,
    pub address: String,
    pub port: u16,
    pub status: String,
    pub version: String,
    pub load: [f64; 3],
    pub timestamp: i64, // milliseconds since UNIX_EPOCH
}

/// Published on the client channel when a node comes up.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct NodeAnnouncement {
    pub node: String,
    pub status: String,
    pub version: String,
}
