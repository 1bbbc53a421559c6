use peerlink_core::{split_script, BridgeError, BridgeResult};

/// One host-side action requested by the module.
///
/// Payloads pushed by the module are scripts of these commands; anything
/// outside this vocabulary is rejected rather than evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostInstruction {
    /// `log word...` writes a line to the host console.
    Log(String),
    /// `alert text` raises a user-visible notice.
    Alert(String),
    /// `set name tag literal` stores a typed host value.
    Set {
        name: String,
        tag: String,
        literal: String,
    },
    /// `unset name` removes a host value.
    Unset { name: String },
    /// `callback target expression` evaluates on the host and reports to `target`.
    Callback { target: String, expression: String },
    /// `source address callback` fetches `address` and reports to `callback`.
    Source { address: String, callback: String },
    /// `bgerror message` reports a peer-side background error.
    PeerError(String),
}

impl HostInstruction {
    pub fn opcode(&self) -> &'static str {
        match self {
            HostInstruction::Log(_) => "log",
            HostInstruction::Alert(_) => "alert",
            HostInstruction::Set { .. } => "set",
            HostInstruction::Unset { .. } => "unset",
            HostInstruction::Callback { .. } => "callback",
            HostInstruction::Source { .. } => "source",
            HostInstruction::PeerError(_) => "bgerror",
        }
    }

    fn from_words(words: Vec<String>) -> BridgeResult<Self> {
        let (opcode, args) = match words.split_first() {
            Some((opcode, args)) => (opcode.as_str(), args),
            None => return Err(BridgeError::Execution("empty command".to_string())),
        };

        match (opcode, args) {
            ("log", args) => Ok(HostInstruction::Log(args.join(" "))),
            ("alert", [text]) => Ok(HostInstruction::Alert(text.clone())),
            ("set", [name, tag, literal]) => Ok(HostInstruction::Set {
                name: name.clone(),
                tag: tag.clone(),
                literal: literal.clone(),
            }),
            ("unset", [name]) => Ok(HostInstruction::Unset { name: name.clone() }),
            ("callback", [target, expression]) => Ok(HostInstruction::Callback {
                target: target.clone(),
                expression: expression.clone(),
            }),
            ("source", [address, callback]) => Ok(HostInstruction::Source {
                address: address.clone(),
                callback: callback.clone(),
            }),
            ("bgerror", [message]) => Ok(HostInstruction::PeerError(message.clone())),
            ("alert" | "set" | "unset" | "callback" | "source" | "bgerror", args) => {
                Err(BridgeError::Execution(format!(
                    "wrong # args for \"{}\": got {}",
                    opcode,
                    args.len()
                )))
            }
            (other, _) => Err(BridgeError::Execution(format!(
                "invalid host instruction \"{}\"",
                other
            ))),
        }
    }
}

/// Parses a module payload into host instructions.
///
/// The whole payload is rejected if any command fails to parse.
pub fn parse_instructions(payload: &str) -> BridgeResult<Vec<HostInstruction>> {
    split_script(payload)?
        .into_iter()
        .map(HostInstruction::from_words)
        .collect()
}
