use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::{DumpReader, ListingProvider, LsRequest, ProviderError, SnapshotFilter};

/// How to invoke restic.
#[derive(Debug, Clone)]
pub struct ResticConfig {
    /// The restic binary, looked up in `$PATH` if not absolute.
    pub binary: PathBuf,
    pub repository: String,
    pub password_file: Option<PathBuf>,
    pub password_command: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub no_cache: bool,
    pub no_lock: bool,
    /// Extended options, passed as `-o key=value`.
    pub options: Vec<String>,
    /// Upper bound for a single invocation.
    pub timeout: Duration,
}

impl Default for ResticConfig {
    fn default() -> Self {
        Self {
            binary: "restic".into(),
            repository: String::new(),
            password_file: None,
            password_command: None,
            cache_dir: None,
            no_cache: false,
            no_lock: false,
            options: vec![],
            timeout: Duration::from_secs(120),
        }
    }
}

/// [ListingProvider] running the restic binary in JSON mode.
///
/// The child process is killed if the request serving it is dropped, or
/// takes longer than the configured timeout.
pub struct ResticCommand {
    config: ResticConfig,
}

impl ResticCommand {
    pub fn new(config: ResticConfig) -> Self {
        Self { config }
    }

    fn program(&self) -> String {
        self.config.binary.display().to_string()
    }

    /// Flags common to all invocations.
    fn global_args(&self) -> Vec<OsString> {
        let c = &self.config;
        let mut args: Vec<OsString> = vec!["--json".into(), "--quiet".into()];
        if !c.repository.is_empty() {
            args.extend(["--repo".into(), c.repository.clone().into()]);
        }
        if let Some(password_file) = &c.password_file {
            args.extend(["--password-file".into(), password_file.into()]);
        }
        if let Some(password_command) = &c.password_command {
            args.extend(["--password-command".into(), password_command.into()]);
        }
        if let Some(cache_dir) = &c.cache_dir {
            args.extend(["--cache-dir".into(), cache_dir.into()]);
        }
        if c.no_cache {
            args.push("--no-cache".into());
        }
        if c.no_lock {
            args.push("--no-lock".into());
        }
        for option in &c.options {
            args.extend(["--option".into(), option.into()]);
        }
        args
    }

    fn ls_args(request: &LsRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["ls".into()];
        if request.long {
            args.push("--long".into());
        }
        if request.recursive {
            args.push("--recursive".into());
        }
        push_filters(&mut args, &request.hosts, &request.tags, &request.paths);
        // everything after `--` is positional, even if it starts with a dash.
        args.push("--".into());
        args.push(request.snapshot_id.clone().into());
        args.extend(request.dirs.iter().map(OsString::from));
        args
    }

    fn snapshots_args(filter: &SnapshotFilter) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["snapshots".into()];
        push_filters(&mut args, &filter.hosts, &filter.tags, &filter.paths);
        args
    }

    fn dump_args(snapshot_id: &str, path: &str) -> Vec<OsString> {
        vec!["dump".into(), "--".into(), snapshot_id.into(), path.into()]
    }

    fn command(&self, args: Vec<OsString>) -> Command {
        let mut cmd = Command::new(&self.config.binary);
        cmd.args(self.global_args())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn spawn(&self, args: Vec<OsString>) -> Result<Child, ProviderError> {
        debug!(args = ?args, "running restic");
        self.command(args)
            .spawn()
            .map_err(|source| ProviderError::Spawn {
                program: self.program(),
                source,
            })
    }

    /// Runs restic to completion, with its stdout going into `sink`.
    async fn run(&self, args: Vec<OsString>, sink: &mut Vec<u8>) -> Result<(), ProviderError> {
        let mut child = self.spawn(args)?;
        let io_err = |source| ProviderError::Io {
            program: self.program(),
            source,
        };

        let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => unreachable!("stdout and stderr are piped"),
        };

        let mut stderr_buf = Vec::new();
        let status = tokio::time::timeout(self.config.timeout, async {
            let (out, err) = tokio::join!(
                stdout.read_to_end(sink),
                stderr.read_to_end(&mut stderr_buf)
            );
            out?;
            err?;
            Ok::<_, std::io::Error>(child.wait().await?)
        })
        .await
        .map_err(|_| ProviderError::Timeout {
            program: self.program(),
            timeout: self.config.timeout,
        })?
        .map_err(io_err)?;

        if !status.success() {
            return Err(ProviderError::Exit {
                program: self.program(),
                status,
                stderr: String::from_utf8_lossy(&stderr_buf).trim().to_owned(),
            });
        }

        Ok(())
    }
}

/// Filter values are attached with `=`, so they can't be read as flags.
fn push_filters(args: &mut Vec<OsString>, hosts: &[String], tags: &[String], paths: &[String]) {
    for (flag, values) in [("--host", hosts), ("--tag", tags), ("--path", paths)] {
        args.extend(values.iter().map(|v| OsString::from(format!("{}={}", flag, v))));
    }
}

/// Reads stderr of a child to the end, in the background.
fn drain(mut stderr: ChildStderr) -> JoinHandle<Vec<u8>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut buf).await {
            warn!(err = %e, "failed to read stderr of restic");
        }
        buf
    })
}

#[async_trait]
impl ListingProvider for ResticCommand {
    #[instrument(skip(self, sink), err)]
    async fn ls(&self, request: &LsRequest, sink: &mut Vec<u8>) -> Result<(), ProviderError> {
        self.run(Self::ls_args(request), sink).await
    }

    #[instrument(skip(self, sink), err)]
    async fn snapshots(
        &self,
        filter: &SnapshotFilter,
        sink: &mut Vec<u8>,
    ) -> Result<(), ProviderError> {
        self.run(Self::snapshots_args(filter), sink).await
    }

    /// Returns once restic produced the first bytes of the file, or exited.
    #[instrument(skip(self), err)]
    async fn dump(&self, snapshot_id: &str, path: &str) -> Result<DumpReader, ProviderError> {
        let mut child = self.spawn(Self::dump_args(snapshot_id, path))?;
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => unreachable!("stdout and stderr are piped"),
        };
        let stderr = drain(stderr);

        let mut reader = BufReader::new(stdout);
        let empty = tokio::time::timeout(self.config.timeout, reader.fill_buf())
            .await
            .map_err(|_| ProviderError::Timeout {
                program: self.program(),
                timeout: self.config.timeout,
            })?
            .map_err(|source| ProviderError::Io {
                program: self.program(),
                source,
            })?
            .is_empty();

        if empty {
            // restic either failed, or the file is empty.
            let status = child.wait().await.map_err(|source| ProviderError::Io {
                program: self.program(),
                source,
            })?;
            if !status.success() {
                return Err(ProviderError::Exit {
                    program: self.program(),
                    status,
                    stderr: String::from_utf8_lossy(&stderr.await.unwrap_or_default())
                        .trim()
                        .to_owned(),
                });
            }
            return Ok(Box::new(reader));
        }

        // reap the child once the body has been streamed out.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    let stderr = stderr.await.unwrap_or_default();
                    warn!(
                        status = %status,
                        stderr = %String::from_utf8_lossy(&stderr).trim(),
                        "restic dump failed while streaming"
                    )
                }
                Err(e) => warn!(err = %e, "failed to wait for restic dump"),
                Ok(_) => {}
            }
        });

        Ok(Box::new(reader))
    }

    fn repository(&self) -> &str {
        &self.config.repository
    }
}
