// This crate centralizes the definitions of what travels between host and module.

pub mod codec; // Content-Length framing over async byte streams
pub mod frames; // Host <-> module envelopes
pub mod instruction; // Closed vocabulary of host instructions carried in module payloads

pub use codec::{decode, read_frame, read_message, write_frame};
pub use frames::{HostFrame, ModuleFrame};
pub use instruction::{parse_instructions, HostInstruction};
