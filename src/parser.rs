//! Line tokenizer: one line of input becomes an ordered list of command
//! stages.
//!
//! The grammar is deliberately tiny. `|` separates stages and whitespace
//! separates words; there is no quoting, no escaping, and no expansion.

use thiserror::Error;

use crate::types::{CommandStage, PipelineRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A `|` with no command on one side of it. `stage` is the 1-based
    /// position of the empty segment.
    #[error("stage {stage} is empty")]
    EmptyStage { stage: usize },
}

/// Tokenizes one line.
///
/// A line of only whitespace is a no-op and parses to `None`. Anything
/// else must name a command in every `|`-separated segment; an empty
/// segment is rejected here, before any process is spawned.
pub fn parse(line: &str) -> Result<Option<PipelineRequest>, ParseError> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let mut stages = Vec::new();
    for (idx, segment) in line.split('|').enumerate() {
        let words: Vec<String> = segment.split_whitespace().map(str::to_owned).collect();
        let stage = CommandStage::new(words).ok_or(ParseError::EmptyStage { stage: idx + 1 })?;
        stages.push(stage);
    }
    Ok(PipelineRequest::new(stages))
}
