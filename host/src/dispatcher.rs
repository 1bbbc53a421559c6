use crate::fetcher::RemoteSourceFetcher;
use crate::formatter::CommandFormatter;
use crate::reporter::ErrorReporter;
use crate::runtime::HostRuntime;
use peerlink_core::{escape, serialize, BridgeError, BridgeResult, ErrorPolicy, HostValue};
use peerlink_ipc::{parse_instructions, HostInstruction};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Executes module payloads against the host runtime.
///
/// Failures never escape a message: they are reported (or forwarded to the
/// peer) and the next message is handled normally.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    runtime: Arc<Mutex<HostRuntime>>,
    formatter: CommandFormatter,
    fetcher: RemoteSourceFetcher,
    reporter: ErrorReporter,
    policy: ErrorPolicy,
}

impl Dispatcher {
    pub fn new(
        runtime: Arc<Mutex<HostRuntime>>,
        formatter: CommandFormatter,
        fetcher: RemoteSourceFetcher,
        reporter: ErrorReporter,
        policy: ErrorPolicy,
    ) -> Self {
        Self {
            runtime,
            formatter,
            fetcher,
            reporter,
            policy,
        }
    }

    /// Handles messages one at a time until the inbound channel closes.
    pub async fn run(self, mut inbound: mpsc::Receiver<String>) {
        while let Some(payload) = inbound.recv().await {
            self.on_message(&payload).await;
        }
        info!("Inbound channel closed, dispatcher stopping");
    }

    pub async fn on_message(&self, payload: &str) {
        debug!(bytes = payload.len(), "Dispatching module message");
        if let Err(e) = self.execute(payload).await {
            self.fail(e).await;
        }
    }

    /// Runs every instruction in `payload`, stopping at the first failure.
    pub async fn execute(&self, payload: &str) -> BridgeResult<()> {
        for instruction in parse_instructions(payload)? {
            self.apply(instruction).await?;
        }
        Ok(())
    }

    async fn apply(&self, instruction: HostInstruction) -> BridgeResult<()> {
        debug!(opcode = instruction.opcode(), "Applying host instruction");
        match instruction {
            HostInstruction::Log(line) => {
                info!(target: "peerlink::console", "{}", line);
                self.runtime.lock().await.log(line);
            }
            HostInstruction::Alert(text) => {
                warn!(target: "peerlink::alert", "{}", text);
                self.runtime.lock().await.alert(text);
            }
            HostInstruction::Set { name, tag, literal } => {
                let value = HostValue::from_tagged(&tag, &literal)?;
                self.runtime.lock().await.set(name, value);
            }
            HostInstruction::Unset { name } => {
                self.runtime.lock().await.unset(&name)?;
            }
            HostInstruction::Callback { target, expression } => {
                self.callback(&target, &expression).await;
            }
            HostInstruction::Source { address, callback } => {
                // completion is reported to the peer by the fetch task itself
                let _ = self.fetcher.fetch(&address, &callback);
            }
            HostInstruction::PeerError(message) => {
                self.reporter.surface(&BridgeError::Peer(message));
            }
        }
        Ok(())
    }

    /// Evaluates `expression` on the host and sends the rendered result to `target`.
    ///
    /// Failures here are always surfaced locally, whatever the policy.
    pub async fn callback(&self, target: &str, expression: &str) {
        let value = self.runtime.lock().await.evaluate(expression);
        let result = match value {
            Ok(value) => {
                let rendered = serialize(&value);
                self.formatter.send(&[target, rendered.as_str()]).await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            self.reporter.surface(&e);
        }
    }

    async fn fail(&self, err: BridgeError) {
        match self.policy {
            ErrorPolicy::Report => self.reporter.surface(&err),
            ErrorPolicy::Forward => {
                let command = format!(
                    "::{}::bgerror \"{}\"",
                    self.formatter.namespace(),
                    escape(&err.to_string())
                );
                if let Err(forward_err) = self.formatter.immediate(&command).await {
                    warn!("Could not forward error to peer: {}", forward_err);
                    self.reporter.surface(&err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchOutcome, SourceLoader};
    use crate::transport::Transport;
    use async_trait::async_trait;
    use peerlink_core::{split_script, BridgeConfig, ErrorKind};
    use peerlink_ipc::{codec, HostFrame};
    use tokio::io::{duplex, split, BufReader, DuplexStream, ReadHalf};

    #[derive(Debug)]
    struct EchoLoader;

    #[async_trait]
    impl SourceLoader for EchoLoader {
        async fn load(&self, address: &str) -> FetchOutcome {
            FetchOutcome::Loaded(format!("from {}", address))
        }
    }

    struct Harness {
        dispatcher: Dispatcher,
        runtime: Arc<Mutex<HostRuntime>>,
        reporter: ErrorReporter,
        module: BufReader<ReadHalf<DuplexStream>>,
    }

    impl Harness {
        async fn next_payload(&mut self) -> String {
            match codec::read_message::<_, HostFrame>(&mut self.module).await.unwrap() {
                Some(HostFrame::Eval { payload, .. }) => payload,
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    async fn harness(policy: ErrorPolicy) -> Harness {
        let (host_side, module_side) = duplex(64 * 1024);
        let (host_read, host_write) = split(host_side);
        let (module_read, _module_write) = split(module_side);
        let transport = Transport::new();
        let _inbound = transport.open(host_read, host_write).await.unwrap();

        let formatter = CommandFormatter::new(transport, &BridgeConfig::default());
        let fetcher = RemoteSourceFetcher::new(Arc::new(EchoLoader), formatter.clone());
        let runtime = Arc::new(Mutex::new(HostRuntime::new()));
        let reporter = ErrorReporter::new();
        let dispatcher = Dispatcher::new(
            runtime.clone(),
            formatter,
            fetcher,
            reporter.clone(),
            policy,
        );
        Harness {
            dispatcher,
            runtime,
            reporter,
            module: BufReader::new(module_read),
        }
    }

    #[tokio::test]
    async fn test_failing_message_does_not_block_next() {
        let h = harness(ErrorPolicy::Report).await;
        h.dispatcher.on_message("frobnicate now").await;
        h.dispatcher.on_message("log still running").await;

        assert_eq!(h.runtime.lock().await.console(), ["still running".to_string()]);
        let surfaced = h.reporter.snapshot();
        assert_eq!(surfaced.len(), 1);
        assert_eq!(surfaced[0].kind, ErrorKind::Execution);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_rest_of_message() {
        let h = harness(ErrorPolicy::Report).await;
        h.dispatcher.on_message("log a\nunset missing\nlog b").await;

        assert_eq!(h.runtime.lock().await.console(), ["a".to_string()]);
        assert_eq!(h.reporter.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_set_and_unset() {
        let h = harness(ErrorPolicy::Report).await;
        h.dispatcher
            .on_message("set colors list {red green}\nalert done")
            .await;
        {
            let runtime = h.runtime.lock().await;
            assert_eq!(
                runtime.get("colors"),
                Some(&HostValue::from(vec!["red", "green"]))
            );
            assert_eq!(runtime.alerts(), ["done".to_string()]);
        }

        h.dispatcher.on_message("unset colors").await;
        assert!(h.runtime.lock().await.get("colors").is_none());
        assert!(h.reporter.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tag_is_reported() {
        let h = harness(ErrorPolicy::Report).await;
        h.dispatcher.on_message("set x blob abc").await;
        assert!(h.runtime.lock().await.get("x").is_none());
        assert_eq!(h.reporter.snapshot()[0].kind, ErrorKind::Serialization);
    }

    #[tokio::test]
    async fn test_callback_sends_serialized_value() {
        let mut h = harness(ErrorPolicy::Report).await;
        h.dispatcher
            .on_message("set pair list {a b}\ncallback ::app::got pair")
            .await;
        assert_eq!(h.next_payload().await, "eval:::bridge::wrap {::app::got {a b}}");
    }

    #[tokio::test]
    async fn test_callback_value_with_separator_stays_one_argument() {
        let mut h = harness(ErrorPolicy::Report).await;
        h.dispatcher
            .on_message("set x string {a;b}\ncallback ::app::got x")
            .await;

        let payload = h.next_payload().await;
        let command = payload
            .strip_prefix("eval:::bridge::wrap {")
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap();
        assert_eq!(
            split_script(command).unwrap(),
            vec![vec!["::app::got".to_string(), "a;b".to_string()]]
        );
    }

    #[tokio::test]
    async fn test_chatty_module_keeps_bounded_console() {
        let h = harness(ErrorPolicy::Report).await;
        for i in 0..1000 {
            h.dispatcher.on_message(&format!("log line {}", i)).await;
        }
        let console = h.runtime.lock().await.console();
        assert!(console.len() <= 256);
        assert_eq!(console.last().map(String::as_str), Some("line 999"));
    }

    #[tokio::test]
    async fn test_callback_failure_is_surfaced_even_when_forwarding() {
        let h = harness(ErrorPolicy::Forward).await;
        h.dispatcher.callback("::app::got", "nothing").await;
        assert_eq!(h.reporter.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_forward_policy_sends_bgerror() {
        let mut h = harness(ErrorPolicy::Forward).await;
        h.dispatcher.on_message("frobnicate").await;

        let payload = h.next_payload().await;
        assert!(payload.starts_with("eval:::bridge::wrap {::bridge::bgerror \""));
        assert!(payload.contains("frobnicate"));
        assert!(h.reporter.is_empty());
    }

    #[tokio::test]
    async fn test_forward_falls_back_to_report_when_closed() {
        let h = harness(ErrorPolicy::Forward).await;
        h.dispatcher.formatter.transport().close().await;
        h.dispatcher.on_message("frobnicate").await;
        assert_eq!(h.reporter.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_peer_bgerror_is_surfaced() {
        let h = harness(ErrorPolicy::Forward).await;
        h.dispatcher.on_message("bgerror {invalid command name \"foo\"}").await;
        let surfaced = h.reporter.snapshot();
        assert_eq!(surfaced[0].kind, ErrorKind::Peer);
        assert!(surfaced[0].message.contains("invalid command name"));
    }

    #[tokio::test]
    async fn test_source_instruction_fetches() {
        let mut h = harness(ErrorPolicy::Report).await;
        h.dispatcher.on_message("source lib.tcl ::app::loaded").await;
        assert_eq!(
            h.next_payload().await,
            "eval:::bridge::wrap {::app::loaded {from lib.tcl}}"
        );
    }

    #[tokio::test]
    async fn test_run_processes_in_order() {
        let h = harness(ErrorPolicy::Report).await;
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(h.dispatcher.clone().run(rx));
        for line in ["log one", "bogus", "log two"] {
            tx.send(line.to_string()).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        assert_eq!(
            h.runtime.lock().await.console(),
            ["one".to_string(), "two".to_string()]
        );
    }
}
