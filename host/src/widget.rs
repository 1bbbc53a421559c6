use crate::formatter::CommandFormatter;
use peerlink_core::{word, BridgeResult};
use tracing::trace;

/// A change on a host widget that the peer-side object `::oo::<id>` mirrors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// Text entry bound to a peer variable.
    Variable { id: String, value: String },
    Button { id: String },
    RadioButton { id: String, value: String },
    /// Unchecked boxes report `0` instead of their value.
    CheckButton {
        id: String,
        value: String,
        checked: bool,
    },
    Slider {
        id: String,
        value: String,
        user_initiated: bool,
    },
    Autocomplete {
        id: String,
        value: String,
        user_initiated: bool,
    },
}

impl WidgetEvent {
    pub fn id(&self) -> &str {
        match self {
            WidgetEvent::Variable { id, .. }
            | WidgetEvent::Button { id }
            | WidgetEvent::RadioButton { id, .. }
            | WidgetEvent::CheckButton { id, .. }
            | WidgetEvent::Slider { id, .. }
            | WidgetEvent::Autocomplete { id, .. } => id,
        }
    }

    /// Arguments of the `changed` notification, or `None` for synthetic
    /// slider and autocomplete updates the peer itself caused.
    pub fn command(&self) -> Option<Vec<String>> {
        let value = match self {
            WidgetEvent::Button { .. } => None,
            WidgetEvent::Variable { value, .. } | WidgetEvent::RadioButton { value, .. } => {
                Some(value.as_str())
            }
            WidgetEvent::CheckButton { value, checked, .. } => {
                Some(if *checked { value.as_str() } else { "0" })
            }
            WidgetEvent::Slider {
                value,
                user_initiated,
                ..
            }
            | WidgetEvent::Autocomplete {
                value,
                user_initiated,
                ..
            } => {
                if !user_initiated {
                    return None;
                }
                Some(value.as_str())
            }
        };

        let mut args = vec![format!("::oo::{}", self.id()), "changed".to_string()];
        if let Some(value) = value {
            args.push(word(value));
        }
        Some(args)
    }
}

/// Forwards widget events to their peer-side objects.
#[derive(Debug, Clone)]
pub struct WidgetAdapter {
    formatter: CommandFormatter,
}

impl WidgetAdapter {
    pub fn new(formatter: CommandFormatter) -> Self {
        Self { formatter }
    }

    pub async fn notify(&self, event: &WidgetEvent) -> BridgeResult<()> {
        match event.command() {
            Some(args) => self.formatter.send(&args).await,
            None => {
                trace!(id = event.id(), "Ignoring synthetic widget event");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Transport;
    use peerlink_core::{BridgeConfig, BridgeError};
    use peerlink_ipc::{codec, HostFrame};
    use tokio::io::{duplex, split, BufReader};

    fn args(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_commands() {
        let cases = vec![
            (
                WidgetEvent::Variable {
                    id: "name".to_string(),
                    value: "bob".to_string(),
                },
                args(&["::oo::name", "changed", "bob"]),
            ),
            (
                WidgetEvent::Button {
                    id: "ok".to_string(),
                },
                args(&["::oo::ok", "changed"]),
            ),
            (
                WidgetEvent::RadioButton {
                    id: "size".to_string(),
                    value: "large".to_string(),
                },
                args(&["::oo::size", "changed", "large"]),
            ),
            (
                WidgetEvent::CheckButton {
                    id: "opt".to_string(),
                    value: "1".to_string(),
                    checked: false,
                },
                args(&["::oo::opt", "changed", "0"]),
            ),
            (
                WidgetEvent::CheckButton {
                    id: "opt".to_string(),
                    value: "yes".to_string(),
                    checked: true,
                },
                args(&["::oo::opt", "changed", "yes"]),
            ),
            (
                WidgetEvent::Slider {
                    id: "vol".to_string(),
                    value: "5".to_string(),
                    user_initiated: true,
                },
                args(&["::oo::vol", "changed", "5"]),
            ),
            (
                WidgetEvent::Slider {
                    id: "vol".to_string(),
                    value: "5".to_string(),
                    user_initiated: false,
                },
                None,
            ),
            (
                WidgetEvent::Autocomplete {
                    id: "city".to_string(),
                    value: "New York".to_string(),
                    user_initiated: true,
                },
                args(&["::oo::city", "changed", "\"New York\""]),
            ),
        ];

        for (event, expected) in cases {
            assert_eq!(event.command(), expected, "{:?}", event);
        }
    }

    #[tokio::test]
    async fn test_notify_sends_changed() {
        let (host_side, module_side) = duplex(16 * 1024);
        let (host_read, host_write) = split(host_side);
        let transport = Transport::new();
        let _inbound = transport.open(host_read, host_write).await.unwrap();
        let adapter =
            WidgetAdapter::new(CommandFormatter::new(transport, &BridgeConfig::default()));

        adapter
            .notify(&WidgetEvent::Slider {
                id: "vol".to_string(),
                value: "5".to_string(),
                user_initiated: true,
            })
            .await
            .unwrap();

        let (module_read, _module_write) = split(module_side);
        let mut reader = BufReader::new(module_read);
        let frame: Option<HostFrame> = codec::read_message(&mut reader).await.unwrap();
        assert_eq!(
            frame,
            Some(HostFrame::eval("eval:::bridge::wrap {::oo::vol changed 5}"))
        );
    }

    #[tokio::test]
    async fn test_synthetic_event_is_not_sent() {
        let adapter = WidgetAdapter::new(CommandFormatter::new(
            Transport::new(),
            &BridgeConfig::default(),
        ));
        let synthetic = WidgetEvent::Autocomplete {
            id: "city".to_string(),
            value: "Oslo".to_string(),
            user_initiated: false,
        };
        adapter.notify(&synthetic).await.unwrap();

        let button = WidgetEvent::Button {
            id: "ok".to_string(),
        };
        assert!(matches!(
            adapter.notify(&button).await,
            Err(BridgeError::TransportUnavailable)
        ));
    }
}
