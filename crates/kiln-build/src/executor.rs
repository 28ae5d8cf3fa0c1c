//! External build executor
//!
//! Spawns the ninja-compatible executor against a written description and
//! blocks until it exits. Output is echoed line by line while the child runs
//! and also captured, so a failure carries it verbatim. Nothing is retried.

use crate::error::{BuildError, BuildResult};
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Result of a successful executor run
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Program that ran
    pub tool: String,
    /// Exit code (always 0 here; failures become errors)
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Wall-clock time spent waiting
    pub duration: Duration,
}

/// Runs the external executor
#[derive(Debug, Clone)]
pub struct Executor {
    program: PathBuf,
    echo: bool,
}

impl Executor {
    /// Create an executor for `program` (e.g. "ninja")
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            echo: true,
        }
    }

    /// Echo captured output after each run
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Build every default target of the description
    pub fn execute(&self, destination: &Path) -> BuildResult<ExecOutput> {
        self.invoke(destination, Vec::new())
    }

    /// Build a single target of the description
    pub fn execute_target(&self, destination: &Path, target: &Path) -> BuildResult<ExecOutput> {
        self.invoke(destination, vec![target.as_os_str().to_owned()])
    }

    /// Remove the description's built outputs (`-t clean`)
    pub fn clean(&self, destination: &Path) -> BuildResult<ExecOutput> {
        self.invoke(destination, vec!["-t".into(), "clean".into()])
    }

    fn invoke(&self, destination: &Path, extra: Vec<OsString>) -> BuildResult<ExecOutput> {
        let (dir, file) = split_destination(destination)?;
        let tool = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command.arg("-C").arg(dir).arg("-f").arg(file).args(&extra);

        debug!(tool = %tool, dir = %dir.display(), "spawning executor");
        let start = Instant::now();

        let mut child = command
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BuildError::io(&self.program, e))?;

        let stdout = child
            .stdout
            .take()
            .map(|pipe| pump(pipe, self.echo, Stream::Stdout));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| pump(pipe, self.echo, Stream::Stderr));
        let status = child.wait().map_err(|e| BuildError::io(&self.program, e))?;

        let duration = start.elapsed();
        let stdout = stdout.map(collect).unwrap_or_default();
        let stderr = stderr.map(collect).unwrap_or_default();

        if !status.success() {
            let code = status.code().unwrap_or(1);
            let mut combined = stdout;
            combined.push_str(&stderr);
            return Err(BuildError::tool_failure(tool, code, combined));
        }

        info!(tool = %tool, elapsed_ms = duration.as_millis() as u64, "executor finished");
        Ok(ExecOutput {
            tool,
            code: 0,
            stdout,
            stderr,
            duration,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Read a child pipe to the end on its own thread, echoing as lines arrive
fn pump<R>(pipe: R, echo: bool, stream: Stream) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut captured = String::new();
        let mut line = Vec::new();
        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&line);
                    if echo {
                        match stream {
                            Stream::Stdout => {
                                let mut out = io::stdout().lock();
                                let _ = out.write_all(text.as_bytes());
                                let _ = out.flush();
                            }
                            Stream::Stderr => {
                                let _ = io::stderr().lock().write_all(text.as_bytes());
                            }
                        }
                    }
                    captured.push_str(&text);
                }
            }
        }
        captured
    })
}

fn collect(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Run a built program with inherited stdio
pub fn run_artifact(path: &Path, args: &[String], cwd: &Path) -> BuildResult<()> {
    if !path.exists() {
        return Err(BuildError::missing_artifact(path, "build"));
    }

    info!(program = %path.display(), "running artifact");
    let status = Command::new(path)
        .args(args)
        .current_dir(cwd)
        .status()
        .map_err(|e| BuildError::io(path, e))?;

    if !status.success() {
        return Err(BuildError::tool_failure(
            path.display().to_string(),
            status.code().unwrap_or(1),
            String::new(),
        ));
    }
    Ok(())
}

fn split_destination(destination: &Path) -> BuildResult<(&Path, &Path)> {
    let file = destination.file_name().ok_or_else(|| {
        BuildError::Configuration(format!(
            "'{}' is not a description file",
            destination.display()
        ))
    })?;
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, Path::new(file)))
}
