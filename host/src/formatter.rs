use crate::transport::Transport;
use peerlink_core::{escape, word, BridgeConfig, BridgeResult};
use std::time::Duration;
use tracing::debug;

const EVAL_PREFIX: &str = "eval:";

/// Builds outbound peer commands and hands them to the transport.
///
/// Two forms exist. Immediate commands are wrapped as-is: callers pass text
/// that is already valid peer syntax, typically a list of simple tokens.
/// Coroutine commands run inside the persistent coroutine context and are
/// escaped first, since they sit inside one more layer of quoting.
#[derive(Debug, Clone)]
pub struct CommandFormatter {
    transport: Transport,
    namespace: String,
    coroutine_context: String,
    request_timeout: Duration,
}

impl CommandFormatter {
    pub fn new(transport: Transport, config: &BridgeConfig) -> Self {
        Self {
            transport,
            namespace: config.namespace.clone(),
            coroutine_context: config.coroutine_context.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `eval:<ns>::wrap {<text>}`, with `text` left untouched.
    pub fn format_immediate(&self, text: &str) -> String {
        format!("{}::{}::wrap {{{}}}", EVAL_PREFIX, self.namespace, text)
    }

    /// `eval:<ns>::wrap {<ns>::coro <coroutine> <scope> "<escaped text>"}`.
    pub fn format_coroutine(&self, text: &str, scope: &str) -> String {
        let ns = &self.namespace;
        format!(
            "{}::{}::wrap {{::{}::coro {} {} \"{}\"}}",
            EVAL_PREFIX,
            ns,
            ns,
            self.coroutine_context,
            word(scope),
            escape(text)
        )
    }

    /// Joins `args` with single spaces and sends them as an immediate command.
    pub async fn send<S: AsRef<str>>(&self, args: &[S]) -> BridgeResult<()> {
        let text = args
            .iter()
            .map(|arg| arg.as_ref())
            .collect::<Vec<&str>>()
            .join(" ");
        self.immediate(&text).await
    }

    pub async fn immediate(&self, text: &str) -> BridgeResult<()> {
        let command = self.format_immediate(text);
        debug!(command = %command, "Sending immediate command");
        self.transport.post(command).await
    }

    pub async fn coroutine(&self, text: &str, scope: &str) -> BridgeResult<()> {
        let command = self.format_coroutine(text, scope);
        debug!(scope, bytes = command.len(), "Sending coroutine command");
        self.transport.post(command).await
    }

    /// Sends an immediate command and waits for the module's reply payload.
    pub async fn request_immediate(&self, text: &str) -> BridgeResult<String> {
        let command = self.format_immediate(text);
        self.transport.request(command, self.request_timeout).await
    }
}
