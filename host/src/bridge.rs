use crate::dispatcher::Dispatcher;
use crate::fetcher::{HttpLoader, RemoteSourceFetcher, SourceLoader};
use crate::formatter::CommandFormatter;
use crate::harvester::{HostDocument, ScriptHarvester};
use crate::reporter::ErrorReporter;
use crate::runtime::HostRuntime;
use crate::transport::Transport;
use crate::widget::{WidgetAdapter, WidgetEvent};
use peerlink_core::{BridgeConfig, BridgeResult};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One host's connection to one module, with everything wired together.
#[derive(Debug)]
pub struct Bridge {
    config: BridgeConfig,
    transport: Transport,
    formatter: CommandFormatter,
    runtime: Arc<Mutex<HostRuntime>>,
    reporter: ErrorReporter,
    dispatcher: Dispatcher,
    harvester: ScriptHarvester,
    widgets: WidgetAdapter,
    dispatch_task: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Builds a bridge that loads sources over HTTP relative to `source_base_url`.
    pub fn new(config: BridgeConfig) -> BridgeResult<Self> {
        let loader = HttpLoader::new(config.source_base_url.as_deref())?;
        Ok(Self::with_loader(config, Arc::new(loader)))
    }

    pub fn with_loader(config: BridgeConfig, loader: Arc<dyn SourceLoader>) -> Self {
        let transport = Transport::new();
        let formatter = CommandFormatter::new(transport.clone(), &config);
        let runtime = Arc::new(Mutex::new(HostRuntime::new()));
        let reporter = ErrorReporter::new();
        let fetcher = RemoteSourceFetcher::new(loader, formatter.clone());
        let dispatcher = Dispatcher::new(
            runtime.clone(),
            formatter.clone(),
            fetcher,
            reporter.clone(),
            config.error_policy,
        );

        Self {
            harvester: ScriptHarvester::new(formatter.clone()),
            widgets: WidgetAdapter::new(formatter.clone()),
            config,
            transport,
            formatter,
            runtime,
            reporter,
            dispatcher,
            dispatch_task: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn formatter(&self) -> &CommandFormatter {
        &self.formatter
    }

    pub fn runtime(&self) -> Arc<Mutex<HostRuntime>> {
        self.runtime.clone()
    }

    pub fn reporter(&self) -> &ErrorReporter {
        &self.reporter
    }

    pub async fn open<R, W>(&self, reader: R, writer: W) -> BridgeResult<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let inbound = self.transport.open(reader, writer).await?;
        self.start_dispatch(inbound).await;
        Ok(())
    }

    /// Launches `command`, or the configured module command when it is empty.
    pub async fn open_process(&self, command: &[String]) -> BridgeResult<()> {
        let command = if command.is_empty() {
            self.config.module_command.as_slice()
        } else {
            command
        };
        let inbound = self.transport.open_process(command).await?;
        self.start_dispatch(inbound).await;
        Ok(())
    }

    async fn start_dispatch(&self, inbound: mpsc::Receiver<String>) {
        let task = tokio::spawn(self.dispatcher.clone().run(inbound));
        *self.dispatch_task.lock().await = Some(task);
    }

    pub async fn send<S: AsRef<str>>(&self, args: &[S]) -> BridgeResult<()> {
        self.formatter.send(args).await
    }

    /// Sends an immediate command and waits for the module's reply.
    pub async fn request(&self, text: &str) -> BridgeResult<String> {
        self.formatter.request_immediate(text).await
    }

    /// Runs the document's peer scripts in the bootstrap context.
    pub async fn bootstrap(&self, document: &HostDocument) -> BridgeResult<()> {
        self.collect(document, &self.config.bootstrap_context).await
    }

    pub async fn collect(&self, document: &HostDocument, scope: &str) -> BridgeResult<()> {
        self.harvester.collect(document, scope).await
    }

    pub async fn notify(&self, event: &WidgetEvent) -> BridgeResult<()> {
        self.widgets.notify(event).await
    }

    /// Waits until the module stops sending and every message has been handled.
    ///
    /// The dispatch handle stays in place until it completes, so dropping
    /// this future early never detaches the loop.
    pub async fn closed(&self) {
        let mut slot = self.dispatch_task.lock().await;
        if let Some(task) = slot.as_mut() {
            if let Err(e) = task.await {
                warn!("Dispatch task failed: {}", e);
            }
            *slot = None;
        }
    }

    pub async fn close(&self) {
        self.transport.close().await;
        self.closed().await;
        info!("Bridge closed");
    }
}
