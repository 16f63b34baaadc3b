//! jsh: a small Unix shell that runs command pipelines.
//!
//! One line of input describes a pipeline: commands separated by `|`,
//! words separated by whitespace. Each command runs as its own process,
//! adjacent commands are connected stdout-to-stdin with a pipe, and once
//! every stage has terminated the last stage's status is the result.
//!
//! ```no_run
//! let outcome = jsh::eval_line("echo hello | wc -c")?;
//! if let jsh::Evaluation::Pipeline(report) = outcome {
//!     println!("{report}");
//! }
//! # Ok::<(), jsh::JshError>(())
//! ```

mod channel;
mod error;
mod eval;
mod job;
mod parser;
mod spawn;
mod types;

pub use error::JshError;
pub use eval::{eval_line, run_request, Evaluation, PipelineReport};
pub use job::{StageHandle, StageStatus};
pub use parser::{parse, ParseError};
pub use types::{CommandStage, PipelineRequest};
