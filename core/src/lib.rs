// Core of the peer bridge:
// - Escaping of text destined for the peer's command syntax
// - Peer list/script splitting
// - Typed host values and their serialization
// - Configuration loading
// - Shared error types

// Export escape module - Structural character escaping
pub mod escape;
pub use escape::{escape, needs_escape};

// Export list module - Peer list and script splitting
pub mod list;
pub use list::{split_list, split_script};

// Export value module - Typed host values
pub mod value;
pub use value::{HostValue, ValueTag};

// Export serialize module - Host value rendering
pub mod serialize;
pub use serialize::{serialize, serialize_tagged, word};

// Export config module - Configuration loading
pub mod config;
pub use config::{BridgeConfig, ErrorPolicy};

// Export errors module - Shared error types
pub mod errors;
pub use errors::{BridgeError, BridgeResult, ErrorKind};
