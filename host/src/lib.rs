// Host side of the bridge:
// - Transport lifecycle and request correlation
// - Outbound command formatting
// - Inbound message dispatch against the host runtime
// - Remote source fetching, script harvesting and widget events

pub mod transport;
pub use transport::{PendingReply, Transport};

pub mod formatter;
pub use formatter::CommandFormatter;

pub mod runtime;
pub use runtime::HostRuntime;

pub mod reporter;
pub use reporter::{ErrorReporter, SurfacedError};

pub mod fetcher;
pub use fetcher::{completion_command, FetchOutcome, HttpLoader, RemoteSourceFetcher, SourceLoader};

pub mod dispatcher;
pub use dispatcher::Dispatcher;

pub mod harvester;
pub use harvester::{bundle, HostDocument, ScriptBlock, ScriptHarvester};

pub mod widget;
pub use widget::{WidgetAdapter, WidgetEvent};

pub mod bridge;
pub use bridge::Bridge;
