use serde::{Deserialize, Serialize};

/// Lifecycle of the producer and display consumer tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl TaskState {
    pub fn can_transition_to(&self, target: &TaskState) -> bool {
        use TaskState::*;

        matches!(
            (self, target),
            (Idle, Running) | (Running, Stopped) | (Stopped, Running)
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
        }
    }
}

/// Lifecycle of the persistence writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum WriterState {
    #[default]
    Idle,
    /// Sink open, channel accepting values
    Running,
    /// Channel closed, backlog still being written
    Draining,
    /// Sink closed; terminal
    Closed,
}

impl WriterState {
    pub fn can_transition_to(&self, target: &WriterState) -> bool {
        use WriterState::*;

        matches!(
            (self, target),
            (Idle, Running) | (Running, Draining) | (Running, Closed) | (Draining, Closed)
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Draining => "Draining",
            Self::Closed => "Closed",
        }
    }
}

/// Lifecycle of the whole pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    ShuttingDown,
    Completed,
    Error { error_msg: String },
}

impl PipelineState {
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        matches!(
            (self, target),
            (Idle, Running) |
            (Idle, Error { .. }) |
            (Running, ShuttingDown) |
            (ShuttingDown, Completed) |
            (ShuttingDown, Error { .. })
        )
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::ShuttingDown => "ShuttingDown",
            Self::Completed => "Completed",
            Self::Error { .. } => "Error",
        }
    }
}
