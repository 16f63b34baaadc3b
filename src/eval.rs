//! Pipeline orchestration: parse a line, wire the channels, launch every
//! stage, hand the descriptors over, reap everything, report.

use std::fmt;

use crate::channel::ChannelSet;
use crate::error::JshError;
use crate::job::{self, StageHandle, StageStatus};
use crate::parser;
use crate::spawn;
use crate::types::PipelineRequest;

/// What one line of input amounted to.
#[derive(Debug)]
pub enum Evaluation {
    /// Blank line; nothing ran, nothing to report.
    NoOp,
    /// A pipeline ran to completion.
    Pipeline(PipelineReport),
}

/// Termination statuses for one pipeline run, in stage order.
#[derive(Debug)]
pub struct PipelineReport {
    statuses: Vec<StageStatus>,
}

impl PipelineReport {
    pub fn statuses(&self) -> &[StageStatus] {
        &self.statuses
    }

    /// The pipeline's overall status: the last stage's, as in ordinary
    /// shell `|` chains.
    pub fn last_status(&self) -> StageStatus {
        *self.statuses.last().expect("a pipeline has at least one stage")
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_status() {
            StageStatus::Exited(code) => write!(f, "jsh status: {code}"),
            StageStatus::Signaled(sig) => {
                write!(f, "jsh status: killed by signal {} ({})", sig as i32, sig)
            }
        }
    }
}

/// Evaluates one line of input end to end.
pub fn eval_line(line: &str) -> Result<Evaluation, JshError> {
    match parser::parse(line)? {
        None => Ok(Evaluation::NoOp),
        Some(request) => run_request(&request).map(Evaluation::Pipeline),
    }
}

/// Runs a parsed pipeline: allocates the connecting channels, launches
/// one child per stage, closes the host's copies of every channel
/// descriptor, then reaps every child.
///
/// If a launch fails partway, the channels are dropped and the stages
/// already running are reaped before the error surfaces, so no child is
/// left behind and no descriptor stays open.
pub fn run_request(request: &PipelineRequest) -> Result<PipelineReport, JshError> {
    let stages = request.stages();
    let channels = ChannelSet::for_stages(stages.len()).map_err(JshError::ChannelAlloc)?;
    tracing::debug!(
        stages = stages.len(),
        channels = channels.channel_count(),
        "channels allocated"
    );

    let mut handles: Vec<StageHandle> = Vec::with_capacity(stages.len());
    for (index, stage) in stages.iter().enumerate() {
        match spawn::launch_stage(index, stage, &channels) {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                drop(channels);
                let _ = job::reap_all(&handles);
                return Err(err);
            }
        }
    }

    // Every channel descriptor now lives with the children. The host's
    // copies must go before the wait, or a stage reading for
    // end-of-stream would never see it.
    drop(channels);
    tracing::debug!(stages = handles.len(), "host channel ends closed");

    let statuses = job::reap_all(&handles).map_err(JshError::Wait)?;
    Ok(PipelineReport { statuses })
}
