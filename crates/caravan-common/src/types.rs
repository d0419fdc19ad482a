use serde::{Deserialize, Serialize};

/// Operating posture of the agent: connected agents report status and
/// inventory to the remote console, disconnected agents run standalone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    Connected,
    Disconnected,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Connected => write!(f, "connected"),
            AgentMode::Disconnected => write!(f, "disconnected"),
        }
    }
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "connected" => Ok(AgentMode::Connected),
            "disconnected" => Ok(AgentMode::Disconnected),
            _ => Err(format!("unknown agent mode: {s}")),
        }
    }
}

/// Collector state machine states. `Collected` is terminal until the process
/// restarts; `Error` can be re-armed through stop/start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    Ready,
    Connecting,
    Collecting,
    Collected,
    Error,
}

impl CollectorState {
    pub fn wire_value(&self) -> &'static str {
        match self {
            CollectorState::Ready => "ready",
            CollectorState::Connecting => "connecting",
            CollectorState::Collecting => "collecting",
            CollectorState::Collected => "collected",
            CollectorState::Error => "error",
        }
    }

    /// The v1 console status vocabulary, used when `legacy_status_enabled`
    /// is set.
    pub fn legacy_wire_value(&self) -> &'static str {
        match self {
            CollectorState::Ready => "waiting-for-credentials",
            CollectorState::Connecting | CollectorState::Collecting => {
                "gathering-initial-inventory"
            }
            CollectorState::Collected => "up-to-date",
            CollectorState::Error => "error",
        }
    }
}

impl std::fmt::Display for CollectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.wire_value())
    }
}

/// Snapshot of the collector engine: current state plus the last recorded
/// error, if any.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorStatus {
    pub state: CollectorState,
    pub error: Option<String>,
}

/// Observed console connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connected,
    Disconnected,
    Error,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Error => write!(f, "error"),
        }
    }
}

/// Console-facing status: `current` reflects the last observed connectivity,
/// `target` the desired mode, `error` the last dispatch failure.
#[derive(Debug, Clone, Serialize)]
pub struct ConsoleStatus {
    pub current: ConnectionState,
    pub target: ConnectionState,
    pub error: Option<String>,
}

impl ConsoleStatus {
    pub fn new(target: ConnectionState) -> Self {
        Self {
            current: ConnectionState::Disconnected,
            target,
            error: None,
        }
    }
}
