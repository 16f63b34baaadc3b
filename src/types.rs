/// One command within a pipeline: the program name followed by its
/// arguments, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStage {
    words: Vec<String>,
}

impl CommandStage {
    /// Builds a stage from its words. An empty word list has no program
    /// to run, so it yields `None`.
    pub fn new(words: Vec<String>) -> Option<CommandStage> {
        if words.is_empty() {
            None
        } else {
            Some(CommandStage { words })
        }
    }

    /// The program name, resolved against `PATH` at exec time.
    pub fn program(&self) -> &str {
        &self.words[0]
    }

    /// Every word, program name first. This is the child's argv.
    pub fn words(&self) -> &[String] {
        &self.words
    }
}

/// An ordered pipeline of at least one stage. Adjacent stages get
/// connected stdout-to-stdin when the request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineRequest {
    stages: Vec<CommandStage>,
}

impl PipelineRequest {
    /// Builds a request from its stages; `None` when there are none.
    pub fn new(stages: Vec<CommandStage>) -> Option<PipelineRequest> {
        if stages.is_empty() {
            None
        } else {
            Some(PipelineRequest { stages })
        }
    }

    pub fn stages(&self) -> &[CommandStage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}
