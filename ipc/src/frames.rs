use serde::{Deserialize, Serialize};

/// Represents a frame sent from the host to the module.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostFrame {
    /// A command for the peer. `id` is set only when the host waits for a reply.
    Eval {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
        payload: String,
    },
    /// The host stopped waiting for the reply to `id`.
    Cancel { id: u64 },
}

/// Represents a frame sent from the module back to the host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModuleFrame {
    /// Result of a correlated `Eval`.
    Reply { id: u64, payload: String },
    /// Peer-level failure of a correlated `Eval`.
    Error { id: u64, message: String },
    /// Unsolicited host instructions; also carries replies to uncorrelated sends.
    Push { payload: String },
}

impl HostFrame {
    /// Creates a fire-and-forget eval frame.
    pub fn eval(payload: impl Into<String>) -> Self {
        HostFrame::Eval {
            id: None,
            payload: payload.into(),
        }
    }

    /// Creates an eval frame whose reply is awaited under `id`.
    pub fn request(id: u64, payload: impl Into<String>) -> Self {
        HostFrame::Eval {
            id: Some(id),
            payload: payload.into(),
        }
    }
}
