// SPDX-License-Identifier: MIT
//
// kestrel — a terminal commit browser.
//
// The binary is a thin host around the crates:
//
//   k-term   → terminal control, input decoding, rendering, event loop
//   k-modal  → modes, counts, operators, key sequences
//   k-widget → widget tree, table, status line, notifications, `Ui`
//
// It picks a row source from the command line, hands it to a `Ui` and
// runs the loop. Rows opened with Enter are printed to stdout once the
// terminal is restored, one first cell per line, so kestrel can sit in a
// pipeline:
//
//   git show $(kestrel)
//
// Logging goes to the file named by KESTREL_LOG, if set; stdout is the
// terminal. RUST_LOG filters it as usual.

mod source;

use std::env;
use std::fs::File;
use std::path::Path;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use k_term::event_loop::{EventLoop, LoopConfig};
use k_widget::{Ui, UiConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::source::{GitLog, TsvFile};

/// Commits fetched per `git log`.
const GIT_LIMIT: usize = 2000;
/// How long `git log` may run before it is killed.
const GIT_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the loop wakes to look for finished fetches.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

const USAGE: &str = "usage: kestrel [REPO | FILE.tsv]

Browse the commits of REPO (default: the current directory), or the
rows of a tab-separated FILE whose first line holds the column titles.

keys: j/k move, gg/G ends, C-d/C-u half pages, dd delete, yy yank,
      i filter, Enter open, :q quit, :e reload";

fn init_logging() {
    let Some(path) = env::var_os("KESTREL_LOG") else {
        return;
    };
    let file = match File::create(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("kestrel: cannot open log file {}: {e}", Path::new(&path).display());
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn run(ui: &mut Ui<impl k_widget::RowSource>) -> k_term::Result<()> {
    let config = LoopConfig {
        tick_interval: Some(POLL_INTERVAL),
        ..LoopConfig::default()
    };
    EventLoop::with_config(config).run(ui)
}

fn main() {
    init_logging();

    let arg = env::args().nth(1);
    if matches!(arg.as_deref(), Some("-h" | "--help")) {
        println!("{USAGE}");
        return;
    }
    let target = arg.unwrap_or_else(|| ".".to_owned());
    let path = Path::new(&target);
    info!(path = %path.display(), "starting");

    let result = if path.is_file() {
        let (file, columns) = TsvFile::open(path).unwrap_or_else(|e| {
            eprintln!("kestrel: {}: {e}", path.display());
            process::exit(1);
        });
        let mut ui = Ui::new(file, columns, UiConfig::default());
        run(&mut ui).map(|()| ui.take_opened())
    } else {
        let log = GitLog::new(path, GIT_LIMIT, GIT_TIMEOUT);
        let mut ui = Ui::new(log, GitLog::columns(), UiConfig::default());
        run(&mut ui).map(|()| ui.take_opened())
    };

    match result {
        Ok(opened) => {
            for row in opened {
                if let Some(first) = row.first() {
                    println!("{first}");
                }
            }
        }
        Err(e) => {
            eprintln!("kestrel: {e}");
            process::exit(1);
        }
    }
}
