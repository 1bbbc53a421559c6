use crate::formatter::CommandFormatter;
use async_trait::async_trait;
use peerlink_core::{escape, BridgeError, BridgeResult};
use reqwest::{StatusCode, Url};
use std::fmt::Debug;
use std::io::ErrorKind as IoErrorKind;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Result of loading one remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Status 200 with the body as text.
    Loaded(String),
    /// Any other status, or no response at all (`status` is then `None`).
    Failed { status: Option<u16>, reason: String },
}

impl FetchOutcome {
    /// Uses the canonical reason phrase for `status`; a custom phrase sent by
    /// the server is not carried through.
    fn from_status(status: StatusCode) -> Self {
        FetchOutcome::Failed {
            status: Some(status.as_u16()),
            reason: status
                .canonical_reason()
                .unwrap_or(status.as_str())
                .to_string(),
        }
    }

    pub fn into_error(self) -> Option<BridgeError> {
        match self {
            FetchOutcome::Loaded(_) => None,
            FetchOutcome::Failed { status, reason } => Some(BridgeError::Network { status, reason }),
        }
    }
}

/// Loads the text behind an address.
#[async_trait]
pub trait SourceLoader: Send + Sync + Debug {
    async fn load(&self, address: &str) -> FetchOutcome;
}

/// Loads sources over HTTP(S) with a plain GET, or from `file` URLs.
#[derive(Debug, Clone)]
pub struct HttpLoader {
    client: reqwest::Client,
    base: Option<Url>,
}

impl HttpLoader {
    pub fn new(base: Option<&str>) -> BridgeResult<Self> {
        let base = base
            .map(Url::parse)
            .transpose()
            .map_err(|e| BridgeError::ConfigError(format!("Invalid source base URL: {}", e)))?;
        Ok(Self {
            client: reqwest::Client::new(),
            base,
        })
    }

    fn resolve(&self, address: &str) -> Result<Url, String> {
        let resolved = match &self.base {
            Some(base) => base.join(address),
            None => Url::parse(address),
        };
        resolved.map_err(|e| format!("Invalid address \"{}\": {}", address, e))
    }

    async fn load_file(url: &Url) -> FetchOutcome {
        let path = match url.to_file_path() {
            Ok(path) => path,
            Err(()) => return FetchOutcome::from_status(StatusCode::BAD_REQUEST),
        };
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => FetchOutcome::Loaded(body),
            Err(e) => {
                debug!("Reading {} failed: {}", path.display(), e);
                let status = match e.kind() {
                    IoErrorKind::NotFound => StatusCode::NOT_FOUND,
                    IoErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                FetchOutcome::from_status(status)
            }
        }
    }

    async fn load_http(&self, url: Url) -> FetchOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                return FetchOutcome::Failed {
                    status: None,
                    reason: e.to_string(),
                }
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return FetchOutcome::from_status(status);
        }
        match response.text().await {
            Ok(body) => FetchOutcome::Loaded(body),
            Err(e) => FetchOutcome::Failed {
                status: Some(status.as_u16()),
                reason: e.to_string(),
            },
        }
    }
}

#[async_trait]
impl SourceLoader for HttpLoader {
    async fn load(&self, address: &str) -> FetchOutcome {
        let url = match self.resolve(address) {
            Ok(url) => url,
            Err(reason) => return FetchOutcome::Failed { status: None, reason },
        };
        debug!(url = %url, "Loading source");
        match url.scheme() {
            "file" => Self::load_file(&url).await,
            "http" | "https" => self.load_http(url).await,
            other => FetchOutcome::Failed {
                status: None,
                reason: format!("Unsupported scheme \"{}\"", other),
            },
        }
    }
}

/// Peer command reporting a fetch outcome to `callback`.
///
/// A loaded body is passed raw inside braces; a failure becomes a peer-level
/// `error` expression naming the reason.
pub fn completion_command(callback: &str, outcome: &FetchOutcome) -> String {
    match outcome {
        FetchOutcome::Loaded(body) => format!("{} {{{}}}", callback, body),
        FetchOutcome::Failed { reason, .. } => format!(
            "{} {{error \"Can't source -- {}\"}}",
            callback,
            escape(reason)
        ),
    }
}

/// Fetches sources for the peer and reports each completion exactly once.
#[derive(Debug, Clone)]
pub struct RemoteSourceFetcher {
    loader: Arc<dyn SourceLoader>,
    formatter: CommandFormatter,
}

impl RemoteSourceFetcher {
    pub fn new(loader: Arc<dyn SourceLoader>, formatter: CommandFormatter) -> Self {
        Self { loader, formatter }
    }

    /// Starts loading `address` in the background.
    ///
    /// Fetches are neither deduplicated nor retried; completions go out in
    /// whatever order the loads finish.
    pub fn fetch(&self, address: &str, callback: &str) -> JoinHandle<()> {
        let loader = Arc::clone(&self.loader);
        let formatter = self.formatter.clone();
        let address = address.to_string();
        let callback = callback.to_string();

        tokio::spawn(async move {
            let outcome = loader.load(&address).await;
            match outcome.clone().into_error() {
                None => info!(address = %address, "Fetched source"),
                Some(err) => warn!(address = %address, "Source fetch failed: {}", err),
            }

            let command = completion_command(&callback, &outcome);
            if let Err(e) = formatter.immediate(&command).await {
                warn!(address = %address, "Could not deliver fetch completion: {}", e);
            }
        })
    }
}
