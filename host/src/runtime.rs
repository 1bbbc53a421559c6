use indexmap::IndexMap;
use peerlink_core::{BridgeError, BridgeResult, HostValue};
use std::collections::VecDeque;

/// Console and alert lines kept for the embedding application; older lines
/// are only in the log.
const MAX_RETAINED: usize = 256;

fn retain(lines: &mut VecDeque<String>, line: String) {
    if lines.len() == MAX_RETAINED {
        lines.pop_front();
    }
    lines.push_back(line);
}

/// Host-side state that module messages act upon.
#[derive(Debug, Default)]
pub struct HostRuntime {
    variables: IndexMap<String, HostValue>,
    console: VecDeque<String>,
    alerts: VecDeque<String>,
}

impl HostRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: HostValue) {
        self.variables.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&HostValue> {
        self.variables.get(name)
    }

    pub fn unset(&mut self, name: &str) -> BridgeResult<HostValue> {
        self.variables.shift_remove(name).ok_or_else(|| {
            BridgeError::Execution(format!("can't unset \"{}\": no such variable", name))
        })
    }

    pub fn log(&mut self, line: impl Into<String>) {
        retain(&mut self.console, line.into());
    }

    pub fn alert(&mut self, text: impl Into<String>) {
        retain(&mut self.alerts, text.into());
    }

    /// The most recent console lines, oldest first.
    pub fn console(&self) -> Vec<String> {
        self.console.iter().cloned().collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.iter().cloned().collect()
    }

    /// Evaluates a `name(.segment)*` path, with an optional leading `$`.
    ///
    /// Segments select map entries by key and sequence elements by index.
    pub fn evaluate(&self, expression: &str) -> BridgeResult<HostValue> {
        let path = expression.trim();
        let path = path.strip_prefix('$').unwrap_or(path);
        if path.is_empty() {
            return Err(BridgeError::Execution("empty expression".to_string()));
        }

        let mut segments = path.split('.');
        let root = segments.next().unwrap_or_default();
        let mut current = self.variables.get(root).ok_or_else(|| {
            BridgeError::Execution(format!("can't read \"{}\": no such variable", root))
        })?;

        for segment in segments {
            current = match current {
                HostValue::Map(entries) => entries.get(segment).ok_or_else(|| {
                    BridgeError::Execution(format!(
                        "key \"{}\" not known in \"{}\"",
                        segment, path
                    ))
                })?,
                HostValue::Seq(items) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| items.get(index))
                    .ok_or_else(|| {
                        BridgeError::Execution(format!(
                            "index \"{}\" out of range in \"{}\"",
                            segment, path
                        ))
                    })?,
                HostValue::Str(_) | HostValue::Fragment(_) => {
                    return Err(BridgeError::Execution(format!(
                        "can't index into {} value in \"{}\"",
                        current.tag(),
                        path
                    )))
                }
            };
        }

        Ok(current.clone())
    }
}
