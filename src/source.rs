// SPDX-License-Identifier: MIT
//
// Row sources for the kestrel binary.
//
//   GitLog   `git log` in a child process. A reader thread drains its
//            stdout; `poll` checks `try_wait` once per loop iteration and
//            kills the child once it runs past the timeout.
//   TsvFile  a tab-separated file, first line as column titles, re-read
//            on refresh.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use k_widget::{Column, Constraint, Fetch, Row, RowSource};
use tracing::{debug, warn};

// ─── git log ─────────────────────────────────────────────────────────────────

/// `%h<TAB>%an<TAB>%ad<TAB>%s`, one commit per line.
const GIT_FORMAT: &str = "--pretty=format:%h%x09%an%x09%ad%x09%s";

struct Running {
    child: Child,
    started: Instant,
    output: Receiver<io::Result<Vec<u8>>>,
}

pub struct GitLog {
    repo: PathBuf,
    limit: usize,
    timeout: Duration,
    running: Option<Running>,
    /// A fetch that failed before it could start, reported on next poll.
    failed: Option<String>,
}

impl GitLog {
    /// Start fetching the last `limit` commits of `repo`.
    pub fn new(repo: impl Into<PathBuf>, limit: usize, timeout: Duration) -> Self {
        let mut log = Self {
            repo: repo.into(),
            limit,
            timeout,
            running: None,
            failed: None,
        };
        log.refresh();
        log
    }

    pub fn columns() -> Vec<Column> {
        vec![
            Column::new("commit", Constraint::Fixed(9)),
            Column::new("author", Constraint::Fixed(18)),
            Column::new("date", Constraint::Fixed(11)),
            Column::new("subject", Constraint::Fill(1)),
        ]
    }

    fn spawn(&self) -> io::Result<Running> {
        let mut child = Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .args(["log", "--no-color", "--date=short", GIT_FORMAT])
            .arg(format!("-n{}", self.limit))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let (tx, rx) = mpsc::channel();
        if let Some(mut stdout) = child.stdout.take() {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let result = stdout.read_to_end(&mut buf).map(|_| buf);
                // The receiver is gone if the fetch was abandoned.
                let _ = tx.send(result);
            });
        }
        Ok(Running {
            child,
            started: Instant::now(),
            output: rx,
        })
    }

    fn abandon(&mut self) {
        if let Some(mut running) = self.running.take() {
            if let Err(e) = running.child.kill() {
                warn!(error = %e, "failed to kill git");
            }
            let _ = running.child.wait();
        }
    }
}

impl RowSource for GitLog {
    fn poll(&mut self) -> Option<Fetch> {
        if let Some(reason) = self.failed.take() {
            return Some(Fetch::Failed(reason));
        }
        let running = self.running.as_mut()?;

        match running.child.try_wait() {
            Ok(Some(status)) if status.success() => match running.output.try_recv() {
                Ok(Ok(bytes)) => {
                    self.running = None;
                    let text = String::from_utf8_lossy(&bytes);
                    Some(Fetch::Rows(text.lines().map(parse_git_line).collect()))
                }
                Ok(Err(e)) => {
                    self.running = None;
                    Some(Fetch::Failed(format!("reading git output: {e}")))
                }
                // Exited, but the reader has not finished draining yet.
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.running = None;
                    Some(Fetch::Failed("git output lost".into()))
                }
            },
            Ok(Some(status)) => {
                self.running = None;
                Some(Fetch::Failed(format!("git log failed ({status})")))
            }
            Ok(None) if running.started.elapsed() > self.timeout => {
                self.abandon();
                Some(Fetch::Failed(format!(
                    "git log timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
            Ok(None) => None,
            Err(e) => {
                self.abandon();
                Some(Fetch::Failed(format!("waiting for git: {e}")))
            }
        }
    }

    fn refresh(&mut self) {
        self.abandon();
        match self.spawn() {
            Ok(running) => {
                debug!(repo = %self.repo.display(), limit = self.limit, "git log started");
                self.running = Some(running);
            }
            Err(e) => self.failed = Some(format!("cannot run git: {e}")),
        }
    }

    fn title(&self) -> String {
        format!("git log {}", self.repo.display())
    }
}

impl Drop for GitLog {
    fn drop(&mut self) {
        self.abandon();
    }
}

fn parse_git_line(line: &str) -> Row {
    let mut row: Row = line.splitn(4, '\t').map(str::to_owned).collect();
    row.resize(4, String::new());
    row
}

// ─── TSV file ────────────────────────────────────────────────────────────────

pub struct TsvFile {
    path: PathBuf,
    pending: Option<Fetch>,
}

impl TsvFile {
    /// Read `path` once for its column titles. The rows follow on the
    /// first poll.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<(Self, Vec<Column>)> {
        let path = path.into();
        let (titles, rows) = read_tsv(&path)?;
        let columns = titles
            .into_iter()
            .map(|t| Column::new(t, Constraint::Fill(1)))
            .collect();
        let file = Self {
            path,
            pending: Some(Fetch::Rows(rows)),
        };
        Ok((file, columns))
    }
}

impl RowSource for TsvFile {
    fn poll(&mut self) -> Option<Fetch> {
        self.pending.take()
    }

    fn refresh(&mut self) {
        self.pending = Some(match read_tsv(&self.path) {
            Ok((_, rows)) => Fetch::Rows(rows),
            Err(e) => Fetch::Failed(format!("{}: {e}", self.path.display())),
        });
    }

    fn title(&self) -> String {
        self.path.display().to_string()
    }
}

/// Column titles and rows of a tab-separated file.
fn read_tsv(path: &Path) -> io::Result<(Vec<String>, Vec<Row>)> {
    let text = fs::read_to_string(path)?;
    Ok(parse_tsv(&text))
}

fn parse_tsv(text: &str) -> (Vec<String>, Vec<Row>) {
    let mut lines = text.lines().filter(|l| !l.is_empty());
    let titles: Vec<String> = lines
        .next()
        .map(|l| l.split('\t').map(str::to_owned).collect())
        .unwrap_or_default();
    let rows = lines
        .map(|l| l.split('\t').map(str::to_owned).collect())
        .collect();
    (titles, rows)
}
