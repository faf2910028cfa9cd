//! Diagram rendering wait protocol.
//!
//! Diagrams are expanded by a script running inside the capture surface, which
//! shares no memory with this process. The two sides talk through a narrow
//! contract: the wrapper injects a bootstrap that drives the library and
//! publishes `window.mermaidReady`, and the capture service sends the probe
//! expressions below and decodes their JSON replies.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, de::DeserializeOwned};
use thiserror::Error;

use crate::application::render::DIAGRAM_CLASS;

pub const DEFAULT_DIAGRAM_SCRIPT_URL: &str =
    "https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.min.js";
pub const DEFAULT_LIBRARY_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_LIBRARY_POLL_ATTEMPTS: u32 = 50;

/// Global the bootstrap flips to `true` or `false` once it reaches a terminal state.
pub const READINESS_FLAG: &str = "mermaidReady";
/// Global the bootstrap sets once it has handed the containers to the library.
pub const STARTED_FLAG: &str = "markfolioDiagramsStarted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiagramTheme {
    #[default]
    Default,
    Neutral,
    Dark,
    Forest,
    Base,
}

impl DiagramTheme {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagramTheme::Default => "default",
            DiagramTheme::Neutral => "neutral",
            DiagramTheme::Dark => "dark",
            DiagramTheme::Forest => "forest",
            DiagramTheme::Base => "base",
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown diagram theme `{0}`")]
pub struct UnknownThemeError(String);

impl FromStr for DiagramTheme {
    type Err = UnknownThemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(DiagramTheme::Default),
            "neutral" => Ok(DiagramTheme::Neutral),
            "dark" => Ok(DiagramTheme::Dark),
            "forest" => Ok(DiagramTheme::Forest),
            "base" => Ok(DiagramTheme::Base),
            _ => Err(UnknownThemeError(value.to_string())),
        }
    }
}

/// How the in-page bootstrap loads and drives the diagram library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramSettings {
    pub script_url: String,
    pub theme: DiagramTheme,
    pub library_poll_interval: Duration,
    pub library_poll_attempts: u32,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            script_url: DEFAULT_DIAGRAM_SCRIPT_URL.to_string(),
            theme: DiagramTheme::default(),
            library_poll_interval: DEFAULT_LIBRARY_POLL_INTERVAL,
            library_poll_attempts: DEFAULT_LIBRARY_POLL_ATTEMPTS,
        }
    }
}

/// Terminal and non-terminal states of the in-page protocol as observed
/// through the readiness flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramState {
    /// The flag is unset: library still loading or render in flight.
    Pending,
    Rendered,
    Failed,
}

impl From<Option<bool>> for DiagramState {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => DiagramState::Pending,
            Some(true) => DiagramState::Rendered,
            Some(false) => DiagramState::Failed,
        }
    }
}

/// Reply to [`DiagramProbe::progress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DiagramProgress {
    pub ready: Option<bool>,
    pub total: u64,
    pub pending: u64,
}

impl DiagramProgress {
    pub fn state(&self) -> DiagramState {
        DiagramState::from(self.ready)
    }

    /// Every container owns rendered vector output.
    pub fn is_complete(&self) -> bool {
        self.pending == 0
    }
}

/// Reply to [`DiagramProbe::network`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(rename = "readyState")]
    pub ready_state: String,
    pub resources: u64,
}

impl NetworkSnapshot {
    pub fn is_loaded(&self) -> bool {
        self.ready_state == "complete"
    }
}

/// Probe expressions evaluated inside the capture surface. Each returns a
/// JSON string so replies survive any backend's value marshalling.
pub struct DiagramProbe;

impl DiagramProbe {
    pub fn library_present() -> &'static str {
        "JSON.stringify(typeof window.mermaid !== \"undefined\")"
    }

    pub fn progress() -> String {
        format!(
            "JSON.stringify((function () {{ \
               var nodes = document.querySelectorAll(\".{class}\"); \
               var pending = 0; \
               for (var i = 0; i < nodes.length; i++) {{ if (!nodes[i].querySelector(\"svg\")) {{ pending++; }} }} \
               var flag = window.{flag}; \
               return {{ ready: typeof flag === \"boolean\" ? flag : null, total: nodes.length, pending: pending }}; \
             }})())",
            class = DIAGRAM_CLASS,
            flag = READINESS_FLAG,
        )
    }

    /// Initialise and run the library when the bootstrap gave up before the
    /// script arrived. Replies `true` when a render was started.
    pub fn kick_render(theme: DiagramTheme) -> String {
        format!(
            "JSON.stringify((function () {{ \
               if (window.{started} || typeof window.mermaid === \"undefined\") {{ return false; }} \
               window.{started} = true; \
               window.{flag} = undefined; \
               try {{ \
                 window.mermaid.initialize({{ theme: \"{theme}\", startOnLoad: false }}); \
                 Promise.resolve(window.mermaid.run({{ querySelector: \".{class}\" }})).then( \
                   function () {{ window.{flag} = true; }}, \
                   function (error) {{ console.error(error); window.{flag} = false; }}); \
               }} catch (error) {{ console.error(error); window.{flag} = false; }} \
               return true; \
             }})())",
            started = STARTED_FLAG,
            theme = theme.as_str(),
            class = DIAGRAM_CLASS,
            flag = READINESS_FLAG,
        )
    }

    pub fn network() -> &'static str {
        "JSON.stringify({ readyState: document.readyState, resources: performance.getEntriesByType(\"resource\").length })"
    }
}

#[derive(Debug, Error)]
#[error("unexpected probe reply: {0}")]
pub struct ProbeDecodeError(String);

/// Decode a probe reply, accepting either the JSON string the probes produce
/// or an already structured value.
pub fn decode_reply<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ProbeDecodeError> {
    match value {
        serde_json::Value::String(raw) => {
            serde_json::from_str(&raw).map_err(|err| ProbeDecodeError(format!("{err}: {raw}")))
        }
        other => serde_json::from_value(other).map_err(|err| ProbeDecodeError(err.to_string())),
    }
}
