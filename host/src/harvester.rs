use crate::formatter::CommandFormatter;
use peerlink_core::{word, BridgeResult};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info};

/// One script element of the host document, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    pub src: Option<String>,
    pub body: String,
}

/// The script blocks of a host document that are meant for the peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDocument {
    blocks: Vec<ScriptBlock>,
}

fn script_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("script element regex")
    })
}

fn attribute_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)([a-z_:][-a-z0-9_:.]*)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#)
            .expect("attribute regex")
    })
}

fn attribute(attributes: &str, wanted: &str) -> Option<String> {
    attribute_regex().captures_iter(attributes).find_map(|caps| {
        let name = caps.get(1)?.as_str();
        if !name.eq_ignore_ascii_case(wanted) {
            return None;
        }
        let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4));
        Some(value.map(|m| m.as_str().to_string()).unwrap_or_default())
    })
}

impl HostDocument {
    pub fn new(blocks: Vec<ScriptBlock>) -> Self {
        Self { blocks }
    }

    /// Scans `html` for `<script>` elements whose `type` equals `script_type`,
    /// ignoring ASCII case. Elements of any other type are skipped.
    pub fn from_html(html: &str, script_type: &str) -> Self {
        let blocks = script_regex()
            .captures_iter(html)
            .filter_map(|caps| {
                let attributes = caps.get(1).map_or("", |m| m.as_str());
                let kind = attribute(attributes, "type")?;
                if !kind.trim().eq_ignore_ascii_case(script_type) {
                    return None;
                }
                Some(ScriptBlock {
                    src: attribute(attributes, "src").filter(|src| !src.is_empty()),
                    body: caps.get(2).map_or("", |m| m.as_str()).to_string(),
                })
            })
            .collect::<Vec<_>>();
        debug!(count = blocks.len(), script_type, "Scanned host document");
        Self { blocks }
    }

    pub fn blocks(&self) -> &[ScriptBlock] {
        &self.blocks
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Concatenates every block into a single peer script.
///
/// A referenced block contributes `source <src>`; a non-blank inline body is
/// carried verbatim. Pieces are joined with newlines in document order.
pub fn bundle(document: &HostDocument) -> String {
    let mut pieces = Vec::new();
    for block in &document.blocks {
        if let Some(src) = &block.src {
            pieces.push(format!("source {}", word(src)));
        }
        if !block.body.trim().is_empty() {
            pieces.push(block.body.clone());
        }
    }
    pieces.join("\n")
}

#[derive(Debug, Clone)]
pub struct ScriptHarvester {
    formatter: CommandFormatter,
}

impl ScriptHarvester {
    pub fn new(formatter: CommandFormatter) -> Self {
        Self { formatter }
    }

    /// Sends the document's bundle to the peer as one coroutine command in `scope`.
    pub async fn collect(&self, document: &HostDocument, scope: &str) -> BridgeResult<()> {
        let script = bundle(document);
        if script.is_empty() {
            debug!("No peer scripts to collect");
            return Ok(());
        }
        info!(blocks = document.blocks.len(), scope, "Collecting peer scripts");
        self.formatter.coroutine(&script, scope).await
    }
}
