//! Process bridge: run the external LLM script for one question and collect its output.
//!
//! The command line is `<interpreter> <script> [args...] <input>`. The same input is
//! written to the child's stdin, which is then closed. stdout and stderr share a single
//! pipe, so the result interleaves them exactly as the child wrote them. Lines end at
//! `\n`, `\r` or `\r\n`; every line is terminated with `\n` in the result.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Raw output of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// All output lines (stdout and stderr merged), each followed by `\n`.
    pub output: String,
    /// Exit code, `None` when the child was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Failure of one invocation. Every variant keeps the output read so far.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to write to process input: {source}")]
    Write {
        #[source]
        source: io::Error,
        partial_output: String,
    },
    #[error("failed to read process output: {source}")]
    Read {
        #[source]
        source: io::Error,
        partial_output: String,
    },
    #[error("failed to wait for process: {source}")]
    Wait {
        #[source]
        source: io::Error,
        partial_output: String,
    },
    #[error("process timed out after {after:?}")]
    Timeout {
        after: Duration,
        partial_output: String,
    },
}

impl BridgeError {
    /// Output accumulated before the failure (empty if the process never started).
    pub fn partial_output(&self) -> &str {
        match self {
            BridgeError::Spawn { .. } => "",
            BridgeError::Write { partial_output, .. }
            | BridgeError::Read { partial_output, .. }
            | BridgeError::Wait { partial_output, .. }
            | BridgeError::Timeout { partial_output, .. } => partial_output,
        }
    }

    pub fn into_partial_output(self) -> String {
        match self {
            BridgeError::Spawn { .. } => String::new(),
            BridgeError::Write { partial_output, .. }
            | BridgeError::Read { partial_output, .. }
            | BridgeError::Wait { partial_output, .. }
            | BridgeError::Timeout { partial_output, .. } => partial_output,
        }
    }
}

/// Launches the external script. Cheap to clone; holds no process state between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessBridge {
    interpreter: String,
    script: String,
    args: Vec<String>,
    default_input: String,
    working_dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl ProcessBridge {
    pub fn new(interpreter: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script: script.into(),
            args: Vec::new(),
            default_input: crate::config::DEFAULT_INPUT.to_string(),
            working_dir: None,
            envs: Vec::new(),
            timeout: None,
        }
    }

    /// Extra arguments placed between the script and the question.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Literal sent instead of an empty question.
    #[must_use]
    pub fn with_default_input(mut self, input: impl Into<String>) -> Self {
        self.default_input = input.into();
        self
    }

    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.envs
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Kill the process and fail with [`BridgeError::Timeout`] after `limit`.
    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The text actually sent: `question`, or the default literal if it is empty.
    pub fn effective_input<'a>(&'a self, question: &'a str) -> &'a str {
        if question.is_empty() {
            &self.default_input
        } else {
            question
        }
    }

    /// Run the script for `question` and return its merged output.
    ///
    /// Dropping the returned future kills the child process.
    pub async fn invoke(&self, question: &str) -> Result<ProcessResult, BridgeError> {
        let result = self.run(question).await;
        match &result {
            Ok(res) => info!(
                bytes = res.output.len(),
                exit_code = ?res.exit_code,
                "bridge call finished"
            ),
            Err(e) => warn!(
                error = %e,
                partial_bytes = e.partial_output().len(),
                "bridge call failed"
            ),
        }
        result
    }

    async fn run(&self, question: &str) -> Result<ProcessResult, BridgeError> {
        let input = self.effective_input(question);
        let spawn_error = |source| BridgeError::Spawn {
            program: self.interpreter.clone(),
            source,
        };

        // stdout and stderr share one pipe, so lines keep the order they were written in.
        let (reader, writer) = io::pipe().map_err(spawn_error)?;
        let error_writer = writer.try_clone().map_err(spawn_error)?;

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(&self.script)
            .args(&self.args)
            .arg(input)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::from(writer))
            .stderr(Stdio::from(error_writer))
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let spawned = cmd.spawn();
        // Release our copies of the write end; the reader sees EOF once the child is gone.
        drop(cmd);
        let mut child = spawned.map_err(spawn_error)?;
        debug!(pid = ?child.id(), interpreter = %self.interpreter, script = %self.script, "spawned bridge process");

        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(reader, tx).map_err(|source| BridgeError::Read {
            source,
            partial_output: String::new(),
        })?;

        // Written from its own task: a child that never reads stdin must not stall the timeout.
        let feeder = child.stdin.take().map(|stdin| {
            let bytes = input.as_bytes().to_vec();
            tokio::spawn(feed_input(stdin, bytes))
        });

        let mut output = String::new();
        let finished = match self.timeout {
            Some(limit) => {
                let timed =
                    tokio::time::timeout(limit, collect(&mut child, &mut rx, &mut output)).await;
                match timed {
                    Ok(finished) => finished,
                    Err(_) => {
                        if let Some(feeder) = &feeder {
                            feeder.abort();
                        }
                        if let Err(e) = child.kill().await {
                            warn!(error = %e, "failed to kill timed-out bridge process");
                        }
                        return Err(BridgeError::Timeout {
                            after: limit,
                            partial_output: output,
                        });
                    }
                }
            }
            None => collect(&mut child, &mut rx, &mut output).await,
        };

        let exit_code = match finished {
            Ok(exit_code) => exit_code,
            Err(Stage::Read(source)) => {
                return Err(BridgeError::Read {
                    source,
                    partial_output: output,
                })
            }
            Err(Stage::Wait(source)) => {
                return Err(BridgeError::Wait {
                    source,
                    partial_output: output,
                })
            }
        };

        if let Some(feeder) = feeder {
            let written = feeder
                .await
                .unwrap_or_else(|e| Err(io::Error::other(e.to_string())));
            if let Err(source) = written {
                return Err(BridgeError::Write {
                    source,
                    partial_output: output,
                });
            }
        }
        Ok(ProcessResult { output, exit_code })
    }
}

/// Write the whole input and close stdin. A closed pipe means the child is done reading.
async fn feed_input(mut stdin: ChildStdin, bytes: Vec<u8>) -> io::Result<()> {
    match stdin.write_all(&bytes).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            debug!("bridge process closed its input early");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

enum Stage {
    Read(io::Error),
    Wait(io::Error),
}

/// Drain merged lines into `output` until the output pipe closes, then reap the child.
async fn collect(
    child: &mut Child,
    rx: &mut mpsc::UnboundedReceiver<io::Result<String>>,
    output: &mut String,
) -> Result<Option<i32>, Stage> {
    while let Some(line) = rx.recv().await {
        let line = line.map_err(Stage::Read)?;
        output.push_str(&line);
        output.push('\n');
    }
    let status = child.wait().await.map_err(Stage::Wait)?;
    Ok(status.code())
}

/// Read the merged output on a dedicated thread and send it line by line.
fn forward_lines(
    reader: io::PipeReader,
    tx: mpsc::UnboundedSender<io::Result<String>>,
) -> io::Result<()> {
    std::thread::Builder::new()
        .name("knecht-bridge-output".into())
        .spawn(move || {
            let mut lines = LineSplitter::new(io::BufReader::new(reader));
            let mut buf = Vec::new();
            loop {
                match lines.next_line(&mut buf) {
                    Ok(false) => break,
                    Ok(true) => {
                        let line = String::from_utf8_lossy(&buf).into_owned();
                        if tx.send(Ok(line)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(e));
                        break;
                    }
                }
            }
        })
        .map(|_| ())
}

/// Splits a byte stream into lines ended by `\n`, `\r` or `\r\n`.
struct LineSplitter<R> {
    inner: R,
    /// The previous line ended in `\r`; a leading `\n` belongs to it.
    skip_lf: bool,
}

impl<R: BufRead> LineSplitter<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            skip_lf: false,
        }
    }

    /// Fill `line` with the next line, without terminator. `Ok(false)` at end of stream.
    fn next_line(&mut self, line: &mut Vec<u8>) -> io::Result<bool> {
        line.clear();
        let mut started = false;
        loop {
            let available = match self.inner.fill_buf() {
                Ok(available) => available,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if available.is_empty() {
                return Ok(started);
            }
            let skip = usize::from(self.skip_lf && available[0] == b'\n');
            self.skip_lf = false;
            let rest = &available[skip..];
            match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    line.extend_from_slice(&rest[..pos]);
                    let ended_by_cr = rest[pos] == b'\r';
                    self.inner.consume(skip + pos + 1);
                    self.skip_lf = ended_by_cr;
                    return Ok(true);
                }
                None => {
                    line.extend_from_slice(rest);
                    started |= !rest.is_empty();
                    let used = available.len();
                    self.inner.consume(used);
                }
            }
        }
    }
}
