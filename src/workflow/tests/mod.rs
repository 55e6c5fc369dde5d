//! Unit tests for the workflow module.

mod executor_tests;
mod handler_tests;

use crate::workflow::{
    domain::{Project, ProjectType, Step, StepId},
    ports::{StepContext, StepHandler, StepHandlerError, StepHandlerResult},
};
use async_trait::async_trait;
use std::sync::Mutex;

/// Handler that records the steps it ran and fails selected ones.
#[derive(Debug, Default)]
pub(super) struct ScriptedHandler {
    failing: Vec<StepId>,
    ran: Mutex<Vec<StepId>>,
}

impl ScriptedHandler {
    pub(super) fn failing(steps: &[&str]) -> Self {
        Self {
            failing: steps.iter().copied().map(StepId::from).collect(),
            ran: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn ran(&self) -> Vec<StepId> {
        self.ran.lock().map(|ran| ran.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl StepHandler for ScriptedHandler {
    async fn handle(&self, step: &Step, _context: &StepContext) -> StepHandlerResult<String> {
        if let Ok(mut ran) = self.ran.lock() {
            ran.push(step.id().clone());
        }
        if self.failing.contains(step.id()) {
            return Err(StepHandlerError::CommandFailed {
                kind: "command",
                status: "exit status: 1".to_owned(),
                output: format!("{} broke", step.id()),
            });
        }
        Ok(format!("{} ok", step.id()))
    }
}

pub(super) fn project_at(path: &camino::Utf8Path) -> Project {
    Project::new("demo", path, ProjectType::Generic)
}
