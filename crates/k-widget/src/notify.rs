// SPDX-License-Identifier: MIT
//
// Notification overlay: transient one-line messages layered over the UI.
//
// Notifications are kept in arrival order. Each one lives for its duration
// unless it is sticky; `tick(now)` drops every non-sticky one whose age is
// strictly greater than its duration. At most `max_visible` are shown,
// errors before warnings before info, oldest first within a level, one
// line each at the configured edge of the overlay's rect.
//
// The overlay is a tree node with an `Overlay` constraint, so its rect is
// the whole container. Only the lines it actually draws take mouse hits;
// a click on one dismisses it. Everything else falls through to the
// widgets underneath.

use std::cmp::Reverse;
use std::time::{Duration, Instant};

use k_term::buffer::{Grid, Rect};
use k_term::cell::{Attr, Style};
use k_term::color::Color;
use k_term::input::{MouseButton, MouseEvent, MouseEventKind};
use k_term::text::truncate_with_ellipsis;
use tracing::debug;

// ─── Notification ────────────────────────────────────────────────────────────

/// Severity. Higher levels are shown first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    const fn style(self) -> Style {
        match self {
            Self::Info => Style::DEFAULT.fg(Color::BLACK).bg(Color::CYAN),
            Self::Warning => Style::DEFAULT.fg(Color::BLACK).bg(Color::YELLOW),
            Self::Error => Style::DEFAULT
                .fg(Color::BRIGHT_WHITE)
                .bg(Color::RED)
                .attrs(Attr::BOLD),
        }
    }
}

/// Handle returned by [`Notifications::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub text: String,
    pub level: Level,
    pub created: Instant,
    pub duration: Duration,
    /// Survives `tick` until dismissed.
    pub sticky: bool,
}

impl Notification {
    /// Whether `tick(now)` removes it.
    #[must_use]
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.sticky && now.saturating_duration_since(self.created) > self.duration
    }

    /// The first instant at which it counts as expired. Expiry needs the
    /// age to exceed the duration, so this is one millisecond past it.
    fn expires_at(&self) -> Option<Instant> {
        if self.sticky {
            return None;
        }
        Some(self.created + self.duration + Duration::from_millis(1))
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Which edge of the overlay the lines stack from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Edge {
    #[default]
    Top,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayConfig {
    /// Lines shown at once. The rest wait their turn.
    pub max_visible: usize,
    pub edge: Edge,
    /// Lifetime used by [`Notifications::notify`].
    pub default_duration: Duration,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            max_visible: 3,
            edge: Edge::Top,
            default_duration: Duration::from_secs(3),
        }
    }
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Notifications {
    config: OverlayConfig,
    items: Vec<Notification>,
    next_id: u64,
}

impl Notifications {
    #[must_use]
    pub const fn new(config: OverlayConfig) -> Self {
        Self {
            config,
            items: Vec::new(),
            next_id: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Append a notification created at `now`.
    pub fn push(
        &mut self,
        text: impl Into<String>,
        level: Level,
        duration: Duration,
        sticky: bool,
        now: Instant,
    ) -> NotificationId {
        let id = NotificationId(self.next_id);
        self.next_id += 1;
        let text = text.into();
        debug!(?level, sticky, %text, "notification");
        self.items.push(Notification {
            id,
            text,
            level,
            created: now,
            duration,
            sticky,
        });
        id
    }

    /// Append a non-sticky notification with the configured duration.
    pub fn notify(&mut self, text: impl Into<String>, level: Level, now: Instant) -> NotificationId {
        self.push(text, level, self.config.default_duration, false, now)
    }

    /// Drop everything that has expired by `now`. Returns `true` if
    /// anything was dropped.
    pub fn tick(&mut self, now: Instant) -> bool {
        let before = self.items.len();
        self.items.retain(|n| !n.is_expired(now));
        self.items.len() != before
    }

    /// Remove one notification, sticky or not.
    pub fn dismiss(&mut self, id: NotificationId) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        self.items.len() != before
    }

    pub fn dismiss_all(&mut self) -> bool {
        let any = !self.items.is_empty();
        self.items.clear();
        any
    }

    /// When the next notification expires.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.items.iter().filter_map(Notification::expires_at).min()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// What gets drawn, in drawing order.
    #[must_use]
    pub fn visible(&self) -> Vec<&Notification> {
        let mut shown: Vec<&Notification> = self.items.iter().collect();
        // Stable: arrival order survives within a level.
        shown.sort_by_key(|n| Reverse(n.level));
        shown.truncate(self.config.max_visible);
        shown
    }

    /// The row of `rect` the `i`-th visible line occupies.
    fn line_rect(&self, rect: Rect, i: usize) -> Option<Rect> {
        let i = u16::try_from(i).ok().filter(|&i| i < rect.height)?;
        match self.config.edge {
            Edge::Top => rect.line(i),
            Edge::Bottom => rect.line(rect.height - 1 - i),
        }
    }

    // ─── Widget hooks ────────────────────────────────────────────────────

    pub(crate) fn draw(&self, grid: &mut Grid, rect: Rect) {
        let width = usize::from(rect.width);
        for (i, n) in self.visible().into_iter().enumerate() {
            let Some(line) = self.line_rect(rect, i) else {
                break;
            };
            let style = n.level.style();
            grid.fill(line, style, Some(rect));
            let text = truncate_with_ellipsis(&n.text, width.saturating_sub(2));
            grid.put_str(line.x + 1, line.y, &text, style, Some(line));
        }
    }

    /// The notification drawn at `(x, y)`, if any.
    fn at(&self, rect: Rect, x: u16, y: u16) -> Option<NotificationId> {
        self.visible()
            .into_iter()
            .enumerate()
            .find(|&(i, _)| self.line_rect(rect, i).is_some_and(|r| r.contains(x, y)))
            .map(|(_, n)| n.id)
    }

    pub(crate) fn hits(&self, rect: Rect, x: u16, y: u16) -> bool {
        self.at(rect, x, y).is_some()
    }

    pub(crate) fn on_mouse(&mut self, mouse: MouseEvent, rect: Rect) -> bool {
        if mouse.kind != MouseEventKind::Press(MouseButton::Left) {
            return false;
        }
        match self.at(rect, mouse.x, mouse.y) {
            Some(id) => self.dismiss(id),
            None => false,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
