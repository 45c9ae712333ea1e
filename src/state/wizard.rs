//! Wizard stage machine
//!
//! The wizard only decides which operations are legal in which stage.
//! It never touches field data.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle stage of an application session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStage {
    #[default]
    Select,
    Upload,
    Processing,
    Review,
    Complete,
}

impl WizardStage {
    /// All stages in progress-indicator order
    pub const ALL: [WizardStage; 5] = [
        Self::Select,
        Self::Upload,
        Self::Processing,
        Self::Review,
        Self::Complete,
    ];

    /// Position in the progress indicator (0-based)
    pub fn index(self) -> usize {
        match self {
            Self::Select => 0,
            Self::Upload => 1,
            Self::Processing => 2,
            Self::Review => 3,
            Self::Complete => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Select => "Select Visa",
            Self::Upload => "Upload Docs",
            Self::Processing => "AI Processing",
            Self::Review => "Review",
            Self::Complete => "Complete",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Upload => "upload",
            Self::Processing => "processing",
            Self::Review => "review",
            Self::Complete => "complete",
        }
    }

    /// Stage reached by taking `transition` from this stage, if the edge exists
    pub fn next(self, transition: Transition) -> Option<WizardStage> {
        match (self, transition) {
            (_, Transition::Reset) => Some(Self::Select),
            (Self::Select, Transition::FormsResolved) => Some(Self::Upload),
            (Self::Upload, Transition::ProcessingStarted) => Some(Self::Processing),
            (Self::Processing, Transition::ProcessingSucceeded) => Some(Self::Review),
            (Self::Processing, Transition::ProcessingFailed) => Some(Self::Upload),
            (Self::Review, Transition::Finalized) => Some(Self::Complete),
            _ => None,
        }
    }
}

impl fmt::Display for WizardStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Edges of the stage graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    FormsResolved,
    ProcessingStarted,
    ProcessingSucceeded,
    ProcessingFailed,
    Finalized,
    Reset,
}

impl Transition {
    fn name(self) -> &'static str {
        match self {
            Self::FormsResolved => "forms resolved",
            Self::ProcessingStarted => "start processing",
            Self::ProcessingSucceeded => "processing succeeded",
            Self::ProcessingFailed => "processing failed",
            Self::Finalized => "finalize",
            Self::Reset => "reset",
        }
    }
}

/// Stage-changing operations, at most one of which may be outstanding per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardOperation {
    BeginUpload,
    BeginProcessing,
    Finalize,
}

impl WizardOperation {
    /// Stage the session must be in for the operation to start
    pub fn required_stage(self) -> WizardStage {
        match self {
            Self::BeginUpload => WizardStage::Select,
            Self::BeginProcessing => WizardStage::Upload,
            Self::Finalize => WizardStage::Review,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BeginUpload => "form resolution",
            Self::BeginProcessing => "processing",
            Self::Finalize => "finalization",
        }
    }
}

impl fmt::Display for WizardOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the progress indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepProgress {
    pub stage: WizardStage,
    pub label: &'static str,
    /// 1-based step number
    pub number: usize,
    pub completed: bool,
    pub current: bool,
}

/// Current stage plus the outstanding stage-changing operation, if any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Wizard {
    stage: WizardStage,
    in_flight: Option<WizardOperation>,
}

impl Wizard {
    pub fn stage(&self) -> WizardStage {
        self.stage
    }

    pub fn in_flight(&self) -> Option<WizardOperation> {
        self.in_flight
    }

    /// Claim the wizard for a stage-changing operation.
    ///
    /// Rejects rather than queues when another operation is outstanding.
    pub fn begin(&mut self, operation: WizardOperation) -> Result<(), SessionError> {
        if let Some(current) = self.in_flight {
            return Err(SessionError::OperationInProgress(current));
        }
        if self.stage != operation.required_stage() {
            return Err(SessionError::InvalidStage {
                operation: operation.name(),
                stage: self.stage,
            });
        }
        self.in_flight = Some(operation);
        Ok(())
    }

    /// Release the claim taken by [`Wizard::begin`]
    pub fn end(&mut self) {
        self.in_flight = None;
    }

    /// Take a transition edge, failing if the graph has no such edge from the current stage
    pub fn advance(&mut self, transition: Transition) -> Result<WizardStage, SessionError> {
        let next = self
            .stage
            .next(transition)
            .ok_or(SessionError::InvalidStage {
                operation: transition.name(),
                stage: self.stage,
            })?;
        tracing::info!(from = self.stage.as_str(), to = next.as_str(), "wizard transition");
        self.stage = next;
        Ok(next)
    }

    /// Check that a non-stage-changing operation may run now
    pub fn ensure_idle_in(
        &self,
        stage: WizardStage,
        operation: &'static str,
    ) -> Result<(), SessionError> {
        if let Some(current) = self.in_flight {
            return Err(SessionError::OperationInProgress(current));
        }
        if self.stage != stage {
            return Err(SessionError::InvalidStage {
                operation,
                stage: self.stage,
            });
        }
        Ok(())
    }

    pub fn progress(&self) -> Vec<StepProgress> {
        let current = self.stage.index();
        WizardStage::ALL
            .iter()
            .map(|stage| StepProgress {
                stage: *stage,
                label: stage.label(),
                number: stage.index() + 1,
                completed: stage.index() < current,
                current: stage.index() == current,
            })
            .collect()
    }
}
