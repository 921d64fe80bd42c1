//! Service lifecycle states.

/// Service operational state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Store loaded, engines not yet scheduled.
    Starting,
    /// Background engines are scheduled.
    Running,
    /// Engines are being stopped and state flushed.
    ShuttingDown,
    /// Service is stopped.
    Stopped,
}

impl ServiceState {
    /// Check if the background engines are scheduled.
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceState::Running)
    }

    /// Check if the service is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServiceState::Stopped)
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::ShuttingDown => "shutting_down",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
