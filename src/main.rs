//! The jsh binary: a read loop around the pipeline evaluator.
//!
//! Interactive sessions get a line editor and the `jsh$ ` prompt; input
//! piped on stdin is read line by line with no prompt, so scripted runs
//! produce clean output. `-c <line>` evaluates one line and exits with
//! its status.

use std::io::{self, BufRead, IsTerminal};
use std::process::ExitCode;

use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jsh::{Evaluation, StageStatus};

const PROMPT: &str = "jsh$ ";

fn main() -> ExitCode {
    // Diagnostics stay on stderr; stdout carries pipeline output and
    // status reports only.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    match args.get(1).map(String::as_str) {
        None => run_repl(),
        Some("-c") => match args.get(2) {
            Some(line) => one_shot(line),
            None => {
                eprintln!("jsh error: -c needs a command line");
                ExitCode::from(2)
            }
        },
        Some("-h") | Some("--help") => {
            print_help();
            ExitCode::SUCCESS
        }
        Some("-V") | Some("--version") => {
            println!("jsh {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        Some(other) => {
            eprintln!("jsh error: unknown option: {other}");
            print_help();
            ExitCode::from(2)
        }
    }
}

fn print_help() {
    println!("usage: jsh            start an interactive session");
    println!("       jsh -c LINE    run one pipeline and exit with its status");
    println!("       jsh -h         show this help");
    println!("       jsh -V         show the version");
}

/// Evaluates one line and exits with the pipeline's status code.
fn one_shot(line: &str) -> ExitCode {
    match jsh::eval_line(line) {
        Ok(Evaluation::NoOp) => ExitCode::SUCCESS,
        Ok(Evaluation::Pipeline(report)) => {
            println!("{report}");
            status_exit_code(report.last_status())
        }
        Err(err) => {
            eprintln!("jsh error: {err}");
            ExitCode::from(2)
        }
    }
}

fn status_exit_code(status: StageStatus) -> ExitCode {
    ExitCode::from((status.code() & 0xff) as u8)
}

fn run_repl() -> ExitCode {
    let result = if io::stdin().is_terminal() {
        interactive_loop()
    } else {
        script_loop()
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("jsh error: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Prompted loop with line editing and in-session history.
fn interactive_loop() -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                if line.trim() == "exit" {
                    break;
                }
                let _ = editor.add_history_entry(&line);
                dispatch(&line);
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Unprompted loop for piped input.
fn script_loop() -> Result<()> {
    for line in io::stdin().lock().lines() {
        let line = line?;
        if line.trim() == "exit" {
            break;
        }
        dispatch(&line);
    }
    Ok(())
}

/// Evaluates one line, reporting status to stdout and problems to stderr.
fn dispatch(line: &str) {
    match jsh::eval_line(line) {
        Ok(Evaluation::NoOp) => {}
        Ok(Evaluation::Pipeline(report)) => println!("{report}"),
        Err(err) => eprintln!("jsh error: {err}"),
    }
}
