//! Pinned prompt/status frame at the bottom of the terminal.
//!
//! The frame occupies the last four rows of the screen:
//!
//! ```text
//! rows - 4   prompt     (cursor rests at the end of the prompt)
//! rows - 3   status
//! rows - 2   padding
//! rows - 1   parking
//! ```
//!
//! Every operation builds its escape sequences into a buffer and writes them
//! with a single `write_all` while holding the render lock, so sequences from
//! the input loop and the clock callbacks never interleave.

use std::{
    env,
    io::{self, IsTerminal, Stdout, Write},
    sync::Arc,
};

use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    style::Print,
    terminal::{self, Clear, ClearType},
    QueueableCommand,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::mode::{ModeError, TerminalModeController};

/// Rows taken by the frame.
pub const FRAME_ROWS: u16 = 4;
/// Smallest terminal that can take an in-place status update.
pub const MIN_STATUS_ROWS: u16 = 3;
/// Presence forces cursor-positioned rendering on.
pub const FORCE_ANSI_ENV: &str = "CAPWORLD_FORCE_ANSI";
/// Presence forces plain sequential rendering. Wins over [`FORCE_ANSI_ENV`].
pub const DISABLE_ANSI_ENV: &str = "CAPWORLD_DISABLE_ANSI";

/// Reports the terminal height in rows.
pub trait RowSource: Send {
    fn rows(&self) -> Option<u16>;
}

/// Row count of the controlling terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrosstermRows;

impl RowSource for CrosstermRows {
    fn rows(&self) -> Option<u16> {
        terminal::size()
            .ok()
            .map(|(_, rows)| rows)
            .filter(|rows| *rows > 0)
    }
}

/// Inputs to the ANSI capability decision.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnsiDetection {
    pub stdout_is_terminal: bool,
    pub force: bool,
    pub disable: bool,
}

impl AnsiDetection {
    /// Inspect stdout and the override variables.
    pub fn detect() -> Self {
        Self {
            stdout_is_terminal: io::stdout().is_terminal(),
            force: flag_present(FORCE_ANSI_ENV),
            disable: flag_present(DISABLE_ANSI_ENV),
        }
    }

    pub fn supports_ansi(&self) -> bool {
        if self.disable {
            false
        } else {
            self.force || self.stdout_is_terminal
        }
    }
}

fn flag_present(name: &str) -> bool {
    env::var_os(name).is_some_and(|value| !value.is_empty())
}

/// Snapshot of what the renderer believes is on screen.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrameState {
    pub ansi_capable: bool,
    /// A frame has been painted and is expected to still be visible.
    pub frame_active: bool,
    /// Single-line status updates may be positioned into the frame.
    pub status_region_active: bool,
    pub last_rendered_status: Option<String>,
    /// The frame was torn down for ordinary output and awaits `resume`.
    pub suspended: bool,
}

struct Inner<W, R> {
    out: W,
    rows: R,
    state: FrameState,
    // Set after an erasing suspend: the next block of output starts at the
    // old prompt row instead of below the cleared frame.
    anchor_output: bool,
    buf: Vec<u8>,
}

/// Sole writer of the terminal once configured.
pub struct FrameRenderer<W = Stdout, R = CrosstermRows> {
    inner: Mutex<Inner<W, R>>,
    mode: Arc<TerminalModeController>,
}

impl FrameRenderer {
    /// Renderer writing to the process stdout.
    pub fn stdout(mode: Arc<TerminalModeController>) -> Self {
        Self::new(io::stdout(), CrosstermRows, mode)
    }
}

impl<W: Write + Send, R: RowSource> FrameRenderer<W, R> {
    pub fn new(out: W, rows: R, mode: Arc<TerminalModeController>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                out,
                rows,
                state: FrameState::default(),
                anchor_output: false,
                buf: Vec::with_capacity(512),
            }),
            mode,
        }
    }

    /// Detect ANSI support and hide control-character echo on the input side.
    ///
    /// Returns `false` when the input mode could not be changed; rendering
    /// still works in that case.
    pub fn configure(&self) -> bool {
        self.configure_with(AnsiDetection::detect())
    }

    pub fn configure_with(&self, detection: AnsiDetection) -> bool {
        let ansi = detection.supports_ansi();
        self.inner.lock().state.ansi_capable = ansi;
        info!(
            ansi,
            stdout_is_terminal = detection.stdout_is_terminal,
            force = detection.force,
            disable = detection.disable,
            "terminal output configured"
        );

        match self.mode.engage() {
            Ok(engaged) => {
                debug!(engaged, "terminal input mode configured");
                true
            }
            Err(err) => {
                warn!(error = ?err, "could not change terminal input mode");
                false
            }
        }
    }

    /// Undo the input mode change. Safe to call repeatedly.
    pub fn restore(&self) -> Result<(), ModeError> {
        self.mode.restore()
    }

    pub fn set_ansi_capable(&self, ansi: bool) {
        self.inner.lock().state.ansi_capable = ansi;
    }

    pub fn is_ansi_capable(&self) -> bool {
        self.inner.lock().state.ansi_capable
    }

    pub fn state(&self) -> FrameState {
        self.inner.lock().state.clone()
    }

    /// Paint prompt and status as a fresh frame, leaving the cursor after the
    /// prompt.
    pub fn render_full(&self, prompt: &str, status: &str) -> io::Result<()> {
        self.inner.lock().render_full(prompt, status)
    }

    /// Repaint only the status row. Skipped when no positioned frame is up or
    /// when `status` is already on screen.
    pub fn update_status_only(&self, status: &str) -> io::Result<()> {
        self.inner.lock().update_status(status)
    }

    /// Tear the frame down so ordinary output can scroll. Returns whether a
    /// painted frame was erased.
    pub fn suspend(&self) -> io::Result<bool> {
        self.inner.lock().suspend()
    }

    /// Allow the frame back; the next `render_full` repaints it.
    pub fn resume(&self) {
        self.inner.lock().state.suspended = false;
    }

    /// Write ordinary scrolling output, suspending an active frame first.
    /// A trailing newline is added when missing.
    pub fn print_block(&self, text: &str) -> io::Result<()> {
        self.inner.lock().print_block(text)
    }
}

impl<W: Write, R: RowSource> Inner<W, R> {
    fn rows_at_least(&self, minimum: u16) -> Option<u16> {
        self.rows.rows().filter(|rows| *rows >= minimum)
    }

    fn positioned_frame_up(&self) -> bool {
        self.state.ansi_capable && self.state.frame_active && self.state.status_region_active
    }

    fn render_full(&mut self, prompt: &str, status: &str) -> io::Result<()> {
        self.buf.clear();
        let rows = if self.state.ansi_capable {
            self.rows_at_least(FRAME_ROWS)
        } else {
            None
        };

        match rows {
            Some(rows) => {
                let scroll_in = !self.positioned_frame_up();
                encode_frame(&mut self.buf, rows, prompt, status, scroll_in)?;
                self.state.status_region_active = true;
            }
            None => {
                if self.state.ansi_capable {
                    debug!("terminal too short or size unknown; rendering plain prompt");
                }
                encode_plain(&mut self.buf, prompt, status)?;
                self.state.status_region_active = false;
            }
        }

        self.state.frame_active = true;
        self.state.suspended = false;
        self.state.last_rendered_status = Some(status.to_string());
        self.anchor_output = false;
        self.flush()
    }

    fn update_status(&mut self, status: &str) -> io::Result<()> {
        if self.state.suspended || !self.positioned_frame_up() {
            return Ok(());
        }
        if self.state.last_rendered_status.as_deref() == Some(status) {
            return Ok(());
        }

        let Some(rows) = self.rows_at_least(MIN_STATUS_ROWS) else {
            debug!("terminal too short for status updates; waiting for a full render");
            self.state.status_region_active = false;
            return Ok(());
        };

        self.buf.clear();
        encode_status(&mut self.buf, rows - MIN_STATUS_ROWS, status)?;
        self.state.last_rendered_status = Some(status.to_string());
        self.flush()
    }

    fn suspend(&mut self) -> io::Result<bool> {
        if self.state.suspended {
            return Ok(false);
        }

        self.buf.clear();
        let mut erased = false;
        if !self.state.ansi_capable {
            self.buf.queue(Print("\n"))?;
        } else if self.positioned_frame_up() {
            match self.rows_at_least(FRAME_ROWS) {
                Some(rows) => {
                    encode_erase(&mut self.buf, rows)?;
                    erased = true;
                }
                None => {
                    self.buf.queue(Print("\n"))?;
                }
            }
        }

        self.state.suspended = true;
        self.state.frame_active = false;
        self.state.status_region_active = false;
        self.anchor_output = erased;
        self.flush()?;
        Ok(erased)
    }

    fn print_block(&mut self, text: &str) -> io::Result<()> {
        if self.positioned_frame_up() {
            self.suspend()?;
        }

        self.buf.clear();
        if std::mem::take(&mut self.anchor_output) {
            if let Some(rows) = self.rows_at_least(FRAME_ROWS) {
                self.buf.queue(MoveTo(0, rows - FRAME_ROWS))?;
            }
        }
        self.buf.queue(Print(text))?;
        if !text.ends_with('\n') {
            self.buf.queue(Print("\n"))?;
        }
        self.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let result = self
            .out
            .write_all(&self.buf)
            .and_then(|()| self.out.flush());
        self.buf.clear();
        result
    }
}

fn text_width(text: &str) -> u16 {
    u16::try_from(text.chars().count()).unwrap_or(u16::MAX)
}

fn encode_frame(
    out: &mut Vec<u8>,
    rows: u16,
    prompt: &str,
    status: &str,
    scroll_in: bool,
) -> io::Result<()> {
    let top = rows - FRAME_ROWS;

    // Push existing scrollback up so the frame does not paint over it.
    if scroll_in {
        out.queue(MoveTo(0, rows - 1))?;
        for _ in 1..FRAME_ROWS {
            out.queue(Print("\n"))?;
        }
    }

    for row in top..rows {
        out.queue(MoveTo(0, row))?.queue(Clear(ClearType::CurrentLine))?;
    }
    out.queue(MoveTo(0, top))?.queue(Print(prompt))?;
    out.queue(MoveTo(0, top + 1))?.queue(Print(status))?;
    out.queue(MoveTo(text_width(prompt), top))?;
    Ok(())
}

// Ends on a second prompt so typed input follows one.
fn encode_plain(out: &mut Vec<u8>, prompt: &str, status: &str) -> io::Result<()> {
    out.queue(Print(prompt))?
        .queue(Print("\n"))?
        .queue(Print(status))?
        .queue(Print("\n"))?
        .queue(Print(prompt))?;
    Ok(())
}

fn encode_status(out: &mut Vec<u8>, row: u16, status: &str) -> io::Result<()> {
    out.queue(SavePosition)?
        .queue(MoveTo(0, row))?
        .queue(Clear(ClearType::CurrentLine))?
        .queue(Print(status))?
        .queue(RestorePosition)?;
    Ok(())
}

fn encode_erase(out: &mut Vec<u8>, rows: u16) -> io::Result<()> {
    let top = rows - FRAME_ROWS;
    for row in (top..rows).rev() {
        out.queue(MoveTo(0, row))?.queue(Clear(ClearType::CurrentLine))?;
    }
    out.queue(MoveTo(0, rows - 1))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::Command;
    use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Capture {
        bytes: Arc<Mutex<Vec<u8>>>,
        writes: Arc<AtomicUsize>,
    }

    impl Capture {
        fn take(&self) -> Vec<u8> {
            std::mem::take(&mut *self.bytes.lock())
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl Write for Capture {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.bytes.lock().extend_from_slice(data);
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Clone)]
    struct Rows(Arc<AtomicU16>);

    impl Rows {
        fn set(&self, rows: u16) {
            self.0.store(rows, Ordering::SeqCst);
        }
    }

    impl RowSource for Rows {
        fn rows(&self) -> Option<u16> {
            Some(self.0.load(Ordering::SeqCst)).filter(|rows| *rows > 0)
        }
    }

    struct Harness {
        renderer: FrameRenderer<Capture, Rows>,
        out: Capture,
        rows: Rows,
    }

    fn harness(ansi: bool, rows: u16) -> Harness {
        let out = Capture::default();
        let rows = Rows(Arc::new(AtomicU16::new(rows)));
        let renderer = FrameRenderer::new(
            out.clone(),
            rows.clone(),
            Arc::new(TerminalModeController::detached()),
        );
        renderer.set_ansi_capable(ansi);
        Harness {
            renderer,
            out,
            rows,
        }
    }

    fn bytes_of(command: impl Command) -> Vec<u8> {
        let mut out = Vec::new();
        out.queue(command).unwrap();
        out
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .filter(|window| *window == needle)
            .count()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        count(haystack, needle) > 0
    }

    #[test]
    fn full_render_paints_frame_and_parks_cursor_after_prompt() {
        let h = harness(true, 24);
        h.renderer.render_full("cash> ", "Balance $10").unwrap();

        let out = h.out.take();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("cash> "));
        assert!(text.contains("Balance $10"));
        assert!(contains(&out, &bytes_of(MoveTo(0, 20))));
        assert!(contains(&out, &bytes_of(MoveTo(0, 21))));
        assert!(out.ends_with(&bytes_of(MoveTo(6, 20))));
        assert_eq!(count(&out, &bytes_of(Clear(ClearType::CurrentLine))), 4);

        let state = h.renderer.state();
        assert!(state.frame_active);
        assert!(state.status_region_active);
        assert_eq!(state.last_rendered_status.as_deref(), Some("Balance $10"));
    }

    #[test]
    fn repaint_of_live_frame_does_not_scroll() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "one").unwrap();
        assert!(h.out.take().contains(&b'\n'));

        h.renderer.render_full("> ", "two").unwrap();
        assert!(!h.out.take().contains(&b'\n'));
    }

    #[test]
    fn identical_status_is_not_rewritten() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "day 1").unwrap();
        let after_render = h.out.writes();

        h.renderer.update_status_only("day 1").unwrap();
        assert_eq!(h.out.writes(), after_render);

        h.renderer.update_status_only("day 2").unwrap();
        assert_eq!(h.out.writes(), after_render + 1);
        h.renderer.update_status_only("day 2").unwrap();
        assert_eq!(h.out.writes(), after_render + 1);
    }

    #[test]
    fn status_update_saves_and_restores_cursor_once() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "old").unwrap();
        h.out.take();

        h.renderer.update_status_only("new").unwrap();
        let out = h.out.take();
        assert_eq!(count(&out, &bytes_of(SavePosition)), 1);
        assert_eq!(count(&out, &bytes_of(RestorePosition)), 1);
        assert!(out.starts_with(&bytes_of(SavePosition)));
        assert!(out.ends_with(&bytes_of(RestorePosition)));
        assert!(contains(&out, &bytes_of(MoveTo(0, 21))));
        assert!(String::from_utf8_lossy(&out).contains("new"));
    }

    #[test]
    fn status_row_follows_resize() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "a").unwrap();
        h.rows.set(30);
        h.out.take();

        h.renderer.update_status_only("b").unwrap();
        assert!(contains(&h.out.take(), &bytes_of(MoveTo(0, 27))));
    }

    #[test]
    fn updates_need_a_rendered_frame() {
        let h = harness(true, 24);
        h.renderer.update_status_only("early").unwrap();
        assert_eq!(h.out.writes(), 0);
    }

    #[test]
    fn suspend_resume_render_matches_fresh_render() {
        let fresh = harness(true, 24);
        fresh.renderer.render_full("$ ", "status").unwrap();
        let expected = fresh.out.take();

        let h = harness(true, 24);
        h.renderer.render_full("$ ", "other").unwrap();
        assert!(h.renderer.suspend().unwrap());
        h.renderer.resume();
        h.out.take();
        h.renderer.render_full("$ ", "status").unwrap();

        assert_eq!(h.out.take(), expected);
        assert_eq!(h.renderer.state(), fresh.renderer.state());
    }

    #[test]
    fn suspend_erases_bottom_up_and_blocks_updates() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "s").unwrap();
        h.out.take();

        assert!(h.renderer.suspend().unwrap());
        let out = h.out.take();
        assert_eq!(count(&out, &bytes_of(Clear(ClearType::CurrentLine))), 4);
        assert!(out.starts_with(&bytes_of(MoveTo(0, 23))));
        assert!(out.ends_with(&bytes_of(MoveTo(0, 23))));

        let state = h.renderer.state();
        assert!(state.suspended);
        assert!(!state.frame_active);
        assert!(!state.status_region_active);

        let writes = h.out.writes();
        h.renderer.update_status_only("changed").unwrap();
        assert_eq!(h.out.writes(), writes);

        assert!(!h.renderer.suspend().unwrap());
        assert_eq!(h.out.writes(), writes);
    }

    #[test]
    fn short_terminal_falls_back_until_full_render_on_taller_one() {
        let h = harness(true, 3);
        h.renderer.render_full("> ", "tiny").unwrap();
        assert_eq!(h.out.take(), b"> \ntiny\n".to_vec());
        assert!(!h.renderer.state().status_region_active);

        h.rows.set(40);
        let writes = h.out.writes();
        h.renderer.update_status_only("still tiny").unwrap();
        assert_eq!(h.out.writes(), writes);

        h.renderer.render_full("> ", "tall").unwrap();
        assert!(h.renderer.state().status_region_active);
        h.renderer.update_status_only("tall again").unwrap();
        assert_eq!(h.out.writes(), writes + 2);
    }

    #[test]
    fn unknown_size_falls_back_to_plain_layout() {
        let h = harness(true, 0);
        h.renderer.render_full("> ", "s").unwrap();
        assert_eq!(h.out.take(), b"> \ns\n> ".to_vec());
        assert!(h.renderer.state().frame_active);
        assert!(!h.renderer.state().status_region_active);
    }

    #[test]
    fn shrinking_below_status_minimum_disables_updates() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "a").unwrap();
        h.rows.set(2);
        let writes = h.out.writes();

        h.renderer.update_status_only("b").unwrap();
        assert_eq!(h.out.writes(), writes);
        assert!(!h.renderer.state().status_region_active);
    }

    #[test]
    fn plain_output_never_positions_cursor() {
        let h = harness(false, 24);
        h.renderer.render_full("> ", "s").unwrap();
        assert_eq!(h.out.take(), b"> \ns\n> ".to_vec());

        h.renderer.update_status_only("t").unwrap();
        assert!(h.out.take().is_empty());

        assert!(!h.renderer.suspend().unwrap());
        assert_eq!(h.out.take(), b"\n".to_vec());
    }

    #[test]
    fn print_block_suspends_and_starts_at_prompt_row() {
        let h = harness(true, 24);
        h.renderer.render_full("> ", "s").unwrap();
        h.out.take();

        h.renderer.print_block("hello").unwrap();
        let out = h.out.take();
        let mut tail = bytes_of(MoveTo(0, 20));
        tail.extend_from_slice(b"hello\n");
        assert!(out.ends_with(&tail));
        assert!(h.renderer.state().suspended);

        h.renderer.print_block("world\n").unwrap();
        assert_eq!(h.out.take(), b"world\n".to_vec());
    }

    #[test]
    fn restore_without_configure_writes_nothing() {
        let h = harness(true, 24);
        assert!(h.renderer.restore().is_ok());
        assert!(h.renderer.restore().is_ok());
        assert_eq!(h.out.writes(), 0);
    }

    #[test]
    fn configure_applies_detection() {
        let h = harness(false, 24);
        assert!(h.renderer.configure_with(AnsiDetection {
            stdout_is_terminal: true,
            force: false,
            disable: false,
        }));
        assert!(h.renderer.is_ansi_capable());
        assert_eq!(h.out.writes(), 0);
    }

    #[test]
    fn overrides_take_precedence_over_detection() {
        let detection = |stdout_is_terminal, force, disable| AnsiDetection {
            stdout_is_terminal,
            force,
            disable,
        };
        assert!(detection(true, false, false).supports_ansi());
        assert!(!detection(false, false, false).supports_ansi());
        assert!(detection(false, true, false).supports_ansi());
        assert!(!detection(true, false, true).supports_ansi());
        assert!(!detection(true, true, true).supports_ansi());
    }
}
