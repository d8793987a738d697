// SPDX-License-Identifier: MIT
//
// Terminal driver: raw mode, screen modes, signals and guaranteed restore.
//
// Safety: termios (tcgetattr/tcsetattr), ioctl(TIOCGWINSZ), poll, read,
// write and sigaction are the POSIX interfaces for terminal control and
// have no safe wrapper in std. Each unsafe block is one call.
#![allow(unsafe_code)]
//
// Lifecycle:
//
//   enter()    capture the current attributes, switch to raw mode, then
//              alternate screen, hidden cursor, cleared screen, mouse
//              tracking. If the attributes cannot be read or applied the
//              call fails with `TerminalUnavailable` and nothing has been
//              sent to the terminal.
//
//   restore()  undo all of it, in reverse. Idempotent. `Drop` calls it.
//
// The captured attributes live inside the `Terminal` value. A panic hook
// installed by `enter` holds a weak reference to the same slot: if the
// program panics in raw mode, the hook writes the restore sequence straight
// to the output fd (no stdout lock, which the panicking frame may hold),
// resets the attributes, and only then lets the previous hook print the
// message. Once `restore` has run the slot is empty and the hook does
// nothing.
//
// Signals: SIGWINCH and the termination signals (SIGTERM, SIGHUP, SIGINT,
// SIGQUIT) only store `true` into an atomic and write one byte to a
// self-pipe. `wait_readable` polls the pipe next to the input fd, so a
// signal that lands just before the wait still ends it. The loop then sees
// the flag: a resize becomes an event and a termination unwinds the loop
// normally and `Drop` restores the terminal. Handlers can only reach
// statics, which is why the flags and the pipe's write end are the one
// piece of module state.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, warn};

use crate::ansi::{self, MouseMode};
use crate::error::{Error, Result};

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    /// Geometry assumed when the window size cannot be queried.
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };

    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.cols as u32 * self.rows as u32
    }
}

// ─── Signal flags ───────────────────────────────────────────────────────────

static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
static QUIT_REQUESTED: AtomicBool = AtomicBool::new(false);
/// Write end of the active terminal's self-pipe, or -1.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_winch(_sig: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Relaxed);
    wake();
}

extern "C" fn on_terminate(_sig: libc::c_int) {
    QUIT_REQUESTED.store(true, Ordering::Relaxed);
    wake();
}

/// Async-signal-safe: one `write(2)` to a non-blocking pipe. A full pipe
/// already has a wake-up pending, so a failed write loses nothing.
fn wake() {
    let fd = WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        unsafe { libc::write(fd, (&raw const byte).cast::<libc::c_void>(), 1) };
    }
}

/// A non-blocking, close-on-exec pipe: `(read, write)`.
fn wake_pipe() -> io::Result<(libc::c_int, libc::c_int)> {
    let mut fds = [0; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(io::Error::last_os_error());
    }
    for fd in fds {
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
        unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    }
    Ok((fds[0], fds[1]))
}

const TERMINATION_SIGNALS: [libc::c_int; 4] =
    [libc::SIGTERM, libc::SIGHUP, libc::SIGINT, libc::SIGQUIT];

/// Install `handler` for `sig`, returning the action it replaced.
fn install_handler(sig: libc::c_int, handler: extern "C" fn(libc::c_int)) -> io::Result<libc::sigaction> {
    // SAFETY: sigaction structs are plain C data; zeroed is a valid value.
    let mut sa: libc::sigaction = unsafe { std::mem::zeroed() };
    let mut old: libc::sigaction = unsafe { std::mem::zeroed() };
    sa.sa_sigaction = handler as *const () as usize;
    sa.sa_flags = libc::SA_RESTART;
    unsafe { libc::sigemptyset(&raw mut sa.sa_mask) };
    if unsafe { libc::sigaction(sig, &raw const sa, &raw mut old) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(old)
}

// ─── Queries ────────────────────────────────────────────────────────────────

/// Whether stdin is a terminal.
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

/// Window size from `ioctl(TIOCGWINSZ)` on stdout, or `None` if that isn't
/// a terminal.
#[must_use]
pub fn window_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) };
    (rc == 0 && ws.ws_col > 0 && ws.ws_row > 0).then_some(Size {
        cols: ws.ws_col,
        rows: ws.ws_row,
    })
}

/// Write all of `bytes` to `fd`, retrying short writes and EINTR.
fn write_fd(fd: libc::c_int, mut bytes: &[u8]) -> io::Result<()> {
    while !bytes.is_empty() {
        let n = unsafe { libc::write(fd, bytes.as_ptr().cast::<libc::c_void>(), bytes.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if n == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        #[allow(clippy::cast_sign_loss)] // n > 0 checked above
        let n = n as usize;
        bytes = &bytes[n..];
    }
    Ok(())
}

// ─── Raw mode ───────────────────────────────────────────────────────────────

/// cfmakeraw: no echo, no canonical input, no signal keys, no IEXTEN,
/// no flow control or CR translation, no output processing, 8-bit chars.
/// VMIN=1/VTIME=0 so a read after poll returns what is there.
fn make_raw(t: &mut libc::termios) {
    t.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    t.c_oflag &= !libc::OPOST;
    t.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    t.c_cflag &= !(libc::CSIZE | libc::PARENB);
    t.c_cflag |= libc::CS8;
    t.c_cc[libc::VMIN] = 1;
    t.c_cc[libc::VTIME] = 0;
}

type SavedAttrs = Mutex<Option<libc::termios>>;

// ─── Terminal ───────────────────────────────────────────────────────────────

/// Handle on the controlling terminal (stdin for input, stdout for output).
///
/// ```no_run
/// use k_term::terminal::Terminal;
///
/// let mut term = Terminal::new();
/// term.enter()?;
/// // ... run frames ...
/// term.restore()?; // or just drop it
/// # Ok::<(), k_term::Error>(())
/// ```
pub struct Terminal {
    input: libc::c_int,
    output: libc::c_int,
    /// Attributes captured by `enter`, shared with this handle's panic hook.
    saved: Arc<SavedAttrs>,
    /// Signal actions replaced by `enter`, put back by `restore`.
    prev_actions: Vec<(libc::c_int, libc::sigaction)>,
    /// Self-pipe `(read, write)` the signal handlers write to while active.
    wake: Option<(libc::c_int, libc::c_int)>,
    hook_installed: bool,
    mouse: MouseMode,
    size: Size,
    active: bool,
}

impl Terminal {
    /// Handle on stdin/stdout. Nothing is changed until [`enter`](Self::enter).
    #[must_use]
    pub fn new() -> Self {
        Self {
            input: libc::STDIN_FILENO,
            output: libc::STDOUT_FILENO,
            saved: Arc::new(Mutex::new(None)),
            prev_actions: Vec::new(),
            wake: None,
            hook_installed: false,
            mouse: MouseMode::default(),
            size: window_size().unwrap_or(Size::FALLBACK),
            active: false,
        }
    }

    /// Mouse tracking granularity used by the next `enter`.
    #[must_use]
    pub const fn with_mouse(mut self, mode: MouseMode) -> Self {
        self.mouse = mode;
        self
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Switch to raw mode and the full-screen UI state.
    ///
    /// Idempotent while active.
    ///
    /// # Errors
    ///
    /// - [`Error::TerminalUnavailable`] if the attributes cannot be read or
    ///   set. Nothing has been written to the terminal at that point.
    /// - [`Error::Io`] if the mode-switch sequences cannot be written; the
    ///   terminal is restored before returning.
    pub fn enter(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }

        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(self.input, &raw mut original) } != 0 {
            return Err(Error::TerminalUnavailable(io::Error::last_os_error()));
        }
        let mut raw = original;
        make_raw(&mut raw);

        // Published before the switch so a panic from here on restores.
        *self.lock_saved() = Some(original);
        if unsafe { libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const raw) } != 0 {
            let err = io::Error::last_os_error();
            *self.lock_saved() = None;
            return Err(Error::TerminalUnavailable(err));
        }
        self.active = true;

        self.install_panic_hook();
        self.install_signal_handlers();

        let mut seq = Vec::with_capacity(64);
        ansi::enter_alt_screen(&mut seq)?;
        ansi::cursor_hide(&mut seq)?;
        ansi::clear_screen(&mut seq)?;
        ansi::enable_mouse(&mut seq, self.mouse)?;
        if let Err(err) = write_fd(self.output, &seq) {
            let _ = self.restore();
            return Err(err.into());
        }

        self.size = self.query_geometry();
        debug!(cols = self.size.cols, rows = self.size.rows, "terminal entered");
        Ok(())
    }

    /// Put the terminal back exactly as `enter` found it.
    ///
    /// Idempotent; a no-op when not active. Every step is attempted even if
    /// an earlier one fails.
    ///
    /// # Errors
    ///
    /// The first failure among writing the restore sequence and resetting
    /// the attributes.
    pub fn restore(&mut self) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        for (sig, action) in self.prev_actions.drain(..) {
            unsafe { libc::sigaction(sig, &raw const action, std::ptr::null_mut()) };
        }
        self.close_wake_pipe();

        let written = write_fd(self.output, ansi::RESTORE);
        let attrs = match self.lock_saved().take() {
            Some(original) => {
                if unsafe { libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const original) } == 0 {
                    Ok(())
                } else {
                    Err(Error::TerminalUnavailable(io::Error::last_os_error()))
                }
            }
            None => Ok(()),
        };
        debug!("terminal restored");
        written?;
        attrs
    }

    // ─── Geometry and signals ────────────────────────────────────────────

    /// Query the window size. Falls back to 80×24 when stdout is not a
    /// terminal. The result is cached as [`size`](Self::size).
    pub fn query_geometry(&mut self) -> Size {
        self.size = window_size().unwrap_or(Size::FALLBACK);
        self.size
    }

    /// Consume the resize flag set by SIGWINCH.
    #[must_use]
    pub fn take_resize(&self) -> bool {
        RESIZE_PENDING.swap(false, Ordering::Relaxed)
    }

    /// Whether a termination signal has arrived since `enter`.
    #[must_use]
    pub fn quit_requested(&self) -> bool {
        QUIT_REQUESTED.load(Ordering::Relaxed)
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Block until input is readable or `timeout` passes (`None` waits
    /// forever). This is the loop's only suspension point.
    ///
    /// Returns `false` on timeout, and also when a signal interrupts the
    /// wait (directly or through the self-pipe) so the caller can look at
    /// the signal flags.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if `poll` fails for any other reason.
    pub fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        let millis = timeout.map_or(-1, |d| {
            // Round up: waking early for a deadline just spins.
            i32::try_from(d.as_micros().div_ceil(1000)).unwrap_or(i32::MAX)
        });
        // poll skips negative fds, so the pipe slot is inert without one.
        let mut fds = [
            libc::pollfd {
                fd: self.input,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: self.wake.map_or(-1, |(read, _)| read),
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 2, millis) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        if fds[1].revents != 0 {
            self.drain_wake_pipe();
        }
        Ok(fds[0].revents != 0)
    }

    /// Read whatever input is available. `Ok(0)` means end of input (the
    /// terminal hung up).
    ///
    /// # Errors
    ///
    /// [`Error::Io`] on a read failure other than EINTR.
    pub fn read_input(&self, buf: &mut [u8]) -> Result<usize> {
        loop {
            let n = unsafe { libc::read(self.input, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)] // n >= 0 checked above
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err.into());
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn lock_saved(&self) -> std::sync::MutexGuard<'_, Option<libc::termios>> {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_wake_pipe(&mut self) {
        if self.wake.is_some() {
            return;
        }
        match wake_pipe() {
            Ok((read, write)) => {
                self.wake = Some((read, write));
                WAKE_FD.store(write, Ordering::Relaxed);
            }
            Err(err) => warn!(%err, "cannot create signal wake pipe"),
        }
    }

    fn close_wake_pipe(&mut self) {
        if let Some((read, write)) = self.wake.take() {
            let _ = WAKE_FD.compare_exchange(write, -1, Ordering::Relaxed, Ordering::Relaxed);
            unsafe { libc::close(read) };
            unsafe { libc::close(write) };
        }
    }

    fn drain_wake_pipe(&self) {
        let Some((read, _)) = self.wake else {
            return;
        };
        let mut buf = [0u8; 64];
        while unsafe { libc::read(read, buf.as_mut_ptr().cast::<libc::c_void>(), buf.len()) } > 0 {}
    }

    fn install_signal_handlers(&mut self) {
        QUIT_REQUESTED.store(false, Ordering::Relaxed);
        self.open_wake_pipe();
        let handlers = std::iter::once((libc::SIGWINCH, on_winch as extern "C" fn(libc::c_int)))
            .chain(TERMINATION_SIGNALS.iter().map(|&s| (s, on_terminate as extern "C" fn(libc::c_int))));
        for (sig, handler) in handlers {
            match install_handler(sig, handler) {
                Ok(old) => self.prev_actions.push((sig, old)),
                Err(err) => warn!(sig, %err, "cannot install signal handler"),
            }
        }
    }

    /// Chain a hook in front of the current one. It holds only a weak
    /// reference to the saved attributes and is inert once they are gone.
    fn install_panic_hook(&mut self) {
        if self.hook_installed {
            return;
        }
        self.hook_installed = true;
        let saved: Weak<SavedAttrs> = Arc::downgrade(&self.saved);
        let (input, output) = (self.input, self.output);
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if let Some(saved) = saved.upgrade() {
                // try_lock: the panicking thread may hold the lock.
                if let Ok(mut guard) = saved.try_lock() {
                    if let Some(original) = guard.take() {
                        let _ = write_fd(output, ansi::RESTORE);
                        unsafe { libc::tcsetattr(input, libc::TCSAFLUSH, &raw const original) };
                    }
                }
            }
            previous(info);
        }));
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for Terminal {
    /// Writes go straight to the output fd, unbuffered: a frame handed
    /// over with `write_all` is one `write(2)` unless the kernel splits it.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::write(self.output, buf.as_ptr().cast::<libc::c_void>(), buf.len()) };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)]
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!(%err, "terminal restore failed");
        }
        self.close_wake_pipe();
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("size", &self.size)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
//
// Test runners rarely have a terminal on stdin, so these check the non-TTY
// behavior: `enter` must refuse cleanly and everything else must be inert.
