// SPDX-License-Identifier: MIT
//
// Widget tree: an arena of nodes addressed by generational ids.
//
//   Container (vertical)
//   ├── Table          Fill(1)   ← focus
//   ├── StatusLine     Fixed(1)
//   └── Notifications  Overlay   z = 10
//
// Each node owns its children; `detach` frees a whole subtree. Ids carry
// the generation of their slot, so an id kept past `detach` resolves to
// nothing instead of to whatever reused the slot.
//
// Four passes run over the tree:
//
//   layout    containers split their rect between their children
//   dispatch  commands go to the focused node, mouse events to the topmost
//             node under the pointer
//   focus     one focusable node at most; blur is delivered before focus
//   draw      drawable nodes in ascending z, tree order within a z, each
//             clipped to its own rect

use std::cmp::Reverse;

use bitflags::bitflags;
use k_modal::Command;
use k_term::buffer::{Grid, Rect};
use k_term::input::{MouseEvent, MouseEventKind};
use tracing::debug;

use crate::layout::{Axis, Constraint, split};
use crate::notify::{Level, Notifications};
use crate::status::StatusLine;
use crate::table::{Row, Table};

// ─── Ids & capabilities ──────────────────────────────────────────────────────

/// Handle to a node. Stale once the node is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WidgetId {
    index: u32,
    generation: u32,
}

bitflags! {
    /// What a node takes part in.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Caps: u8 {
        /// Visited by the draw pass and by hit testing.
        const DRAWABLE  = 1 << 0;
        /// Can hold focus.
        const FOCUSABLE = 1 << 1;
        /// Told when its rect changes.
        const RESIZABLE = 1 << 2;
    }
}

// ─── Widget ──────────────────────────────────────────────────────────────────

/// Stacks its children along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Container {
    pub axis: Axis,
}

impl Container {
    #[must_use]
    pub const fn new(axis: Axis) -> Self {
        Self { axis }
    }
}

#[derive(Debug, Clone)]
pub enum Widget {
    Container(Container),
    Table(Table),
    StatusLine(StatusLine),
    Notifications(Notifications),
}

/// Something a widget asks the application to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Notify { text: String, level: Level },
    /// The user opened a row.
    Open(Row),
}

/// What [`WidgetTree::dispatch`] routes.
#[derive(Debug, Clone, Copy)]
pub enum Input<'a> {
    Command(&'a Command),
    Mouse(MouseEvent),
}

impl Widget {
    #[must_use]
    pub const fn caps(&self) -> Caps {
        match self {
            Self::Container(_) => Caps::empty(),
            Self::Table(_) => Caps::DRAWABLE.union(Caps::FOCUSABLE).union(Caps::RESIZABLE),
            Self::StatusLine(_) | Self::Notifications(_) => Caps::DRAWABLE,
        }
    }

    fn draw(&self, grid: &mut Grid, rect: Rect) {
        match self {
            Self::Container(_) => {}
            Self::Table(t) => t.draw(grid, rect),
            Self::StatusLine(s) => s.draw(grid, rect),
            Self::Notifications(n) => n.draw(grid, rect),
        }
    }

    fn on_command(&mut self, command: &Command, effects: &mut Vec<Effect>) -> bool {
        match self {
            Self::Table(t) => t.on_command(command, effects),
            Self::Container(_) | Self::StatusLine(_) | Self::Notifications(_) => false,
        }
    }

    fn on_mouse(&mut self, mouse: MouseEvent, rect: Rect) -> bool {
        match self {
            Self::Table(t) => t.on_mouse(mouse, rect),
            Self::Notifications(n) => n.on_mouse(mouse, rect),
            Self::Container(_) | Self::StatusLine(_) => false,
        }
    }

    fn on_focus(&mut self, focused: bool) {
        match self {
            Self::Table(t) => t.on_focus(focused),
            Self::Container(_) | Self::StatusLine(_) | Self::Notifications(_) => {}
        }
    }

    fn on_resize(&mut self, rect: Rect) {
        match self {
            Self::Table(t) => t.on_resize(rect),
            Self::Container(_) | Self::StatusLine(_) | Self::Notifications(_) => {}
        }
    }

    /// Whether the point belongs to this widget. Most widgets own their
    /// whole rect; the overlay only owns the lines it draws.
    fn hits(&self, rect: Rect, x: u16, y: u16) -> bool {
        match self {
            Self::Notifications(n) => n.hits(rect, x, y),
            Self::Container(_) | Self::Table(_) | Self::StatusLine(_) => rect.contains(x, y),
        }
    }

    #[must_use]
    pub const fn as_table(&self) -> Option<&Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    pub const fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Self::Table(t) => Some(t),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_status_line(&self) -> Option<&StatusLine> {
        match self {
            Self::StatusLine(s) => Some(s),
            _ => None,
        }
    }

    pub const fn as_status_line_mut(&mut self) -> Option<&mut StatusLine> {
        match self {
            Self::StatusLine(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_notifications(&self) -> Option<&Notifications> {
        match self {
            Self::Notifications(n) => Some(n),
            _ => None,
        }
    }

    pub const fn as_notifications_mut(&mut self) -> Option<&mut Notifications> {
        match self {
            Self::Notifications(n) => Some(n),
            _ => None,
        }
    }
}

// ─── Arena ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Node {
    widget: Widget,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    constraint: Constraint,
    rect: Rect,
    z: i32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone)]
pub struct WidgetTree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: WidgetId,
    focus: Option<WidgetId>,
}

impl WidgetTree {
    /// A tree holding only `root`, which gets whatever rect
    /// [`layout`](Self::layout) is given.
    #[must_use]
    pub fn new(root: Widget) -> Self {
        let mut tree = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: WidgetId {
                index: 0,
                generation: 0,
            },
            focus: None,
        };
        tree.root = tree.alloc(Node {
            widget: root,
            parent: None,
            children: Vec::new(),
            constraint: Constraint::Fill(1),
            rect: Rect::default(),
            z: 0,
        });
        tree
    }

    #[must_use]
    pub const fn root(&self) -> WidgetId {
        self.root
    }

    fn alloc(&mut self, node: Node) -> WidgetId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return WidgetId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        WidgetId {
            index,
            generation: 0,
        }
    }

    fn node(&self, id: WidgetId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    fn node_mut(&mut self, id: WidgetId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    /// Add `widget` as the last child of `parent`. Only containers take
    /// children. Children start at their parent's z.
    pub fn add(&mut self, parent: WidgetId, widget: Widget, constraint: Constraint) -> Option<WidgetId> {
        let z = match self.node(parent) {
            Some(Node {
                widget: Widget::Container(_),
                z,
                ..
            }) => *z,
            _ => return None,
        };
        let id = self.alloc(Node {
            widget,
            parent: Some(parent),
            children: Vec::new(),
            constraint,
            rect: Rect::default(),
            z,
        });
        if let Some(p) = self.node_mut(parent) {
            p.children.push(id);
        }
        Some(id)
    }

    /// Destroy `id` and everything under it. The root cannot be detached.
    pub fn detach(&mut self, id: WidgetId) -> bool {
        if id == self.root {
            return false;
        }
        let Some(parent) = self.node(id).and_then(|n| n.parent) else {
            return false;
        };
        if let Some(p) = self.node_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        let mut doomed = vec![id];
        while let Some(next) = doomed.pop() {
            let slot = &mut self.slots[next.index as usize];
            if let Some(node) = slot.node.take() {
                doomed.extend(node.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(next.index);
            if self.focus == Some(next) {
                debug!(?next, "focused widget detached");
                self.focus = None;
            }
        }
        true
    }

    #[must_use]
    pub fn contains(&self, id: WidgetId) -> bool {
        self.node(id).is_some()
    }

    /// Live nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, id: WidgetId) -> Option<&Widget> {
        self.node(id).map(|n| &n.widget)
    }

    pub fn get_mut(&mut self, id: WidgetId) -> Option<&mut Widget> {
        self.node_mut(id).map(|n| &mut n.widget)
    }

    #[must_use]
    pub fn rect(&self, id: WidgetId) -> Option<Rect> {
        self.node(id).map(|n| n.rect)
    }

    #[must_use]
    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.node(id).and_then(|n| n.parent)
    }

    #[must_use]
    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.node(id).map_or(&[], |n| n.children.as_slice())
    }

    #[must_use]
    pub fn z(&self, id: WidgetId) -> Option<i32> {
        self.node(id).map(|n| n.z)
    }

    pub fn set_z(&mut self, id: WidgetId, z: i32) -> bool {
        self.node_mut(id).map(|n| n.z = z).is_some()
    }

    /// All live nodes, parents before children, siblings in order.
    #[must_use]
    pub fn preorder(&self) -> Vec<WidgetId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else { continue };
            out.push(id);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    // ─── Layout ──────────────────────────────────────────────────────────

    /// Give the root `area` and lay everything out under it.
    pub fn layout(&mut self, area: Rect) {
        self.place(self.root, area);
    }

    fn place(&mut self, id: WidgetId, rect: Rect) {
        let Some(node) = self.node_mut(id) else { return };
        if node.rect != rect {
            node.rect = rect;
            if node.widget.caps().contains(Caps::RESIZABLE) {
                node.widget.on_resize(rect);
            }
        }
        let Widget::Container(container) = node.widget else {
            return;
        };
        let children = node.children.clone();
        let constraints: Vec<Constraint> = children
            .iter()
            .filter_map(|&c| self.node(c).map(|n| n.constraint))
            .collect();
        for (child, part) in children.into_iter().zip(split(rect, container.axis, &constraints)) {
            self.place(child, part);
        }
    }

    // ─── Focus ───────────────────────────────────────────────────────────

    #[must_use]
    pub const fn focused(&self) -> Option<WidgetId> {
        self.focus
    }

    /// Move focus to `id`. Returns `false` if it already had focus or
    /// cannot take it.
    pub fn set_focus(&mut self, id: WidgetId) -> bool {
        if self.focus == Some(id) {
            return false;
        }
        if !self
            .node(id)
            .is_some_and(|n| n.widget.caps().contains(Caps::FOCUSABLE))
        {
            return false;
        }
        if let Some(prev) = self.focus.and_then(|p| self.node_mut(p)) {
            prev.widget.on_focus(false);
        }
        if let Some(next) = self.node_mut(id) {
            next.widget.on_focus(true);
        }
        debug!(from = ?self.focus, to = ?id, "focus");
        self.focus = Some(id);
        true
    }

    /// Focus the focusable node after the current one in tree order,
    /// wrapping around.
    pub fn focus_next(&mut self) -> Option<WidgetId> {
        let ring: Vec<WidgetId> = self
            .preorder()
            .into_iter()
            .filter(|&id| {
                self.node(id)
                    .is_some_and(|n| n.widget.caps().contains(Caps::FOCUSABLE))
            })
            .collect();
        let next = match self.focus.and_then(|f| ring.iter().position(|&id| id == f)) {
            Some(i) => ring[(i + 1) % ring.len()],
            None => *ring.first()?,
        };
        self.set_focus(next);
        Some(next)
    }

    // ─── Dispatch ────────────────────────────────────────────────────────

    /// The topmost drawable node whose area holds `(x, y)`: highest z,
    /// then smallest area, then latest in tree order.
    #[must_use]
    pub fn hit_test(&self, x: u16, y: u16) -> Option<WidgetId> {
        self.preorder()
            .into_iter()
            .enumerate()
            .filter_map(|(order, id)| {
                let node = self.node(id)?;
                let hit = node.widget.caps().contains(Caps::DRAWABLE)
                    && node.widget.hits(node.rect, x, y);
                hit.then_some((node.z, Reverse(node.rect.area()), order, id))
            })
            .max_by_key(|&(z, area, order, _)| (z, area, order))
            .map(|(.., id)| id)
    }

    /// Route `input` and report whether a widget handled it. Effects the
    /// widget asks for are appended to `effects`.
    pub fn dispatch(&mut self, input: Input<'_>, effects: &mut Vec<Effect>) -> bool {
        match input {
            Input::Command(command) => {
                let Some(node) = self.focus.and_then(|id| self.node_mut(id)) else {
                    return false;
                };
                node.widget.on_command(command, effects)
            }
            Input::Mouse(mouse) => {
                let Some(id) = self.hit_test(mouse.x, mouse.y) else {
                    return false;
                };
                if matches!(mouse.kind, MouseEventKind::Press(_)) {
                    self.set_focus(id);
                }
                let Some(node) = self.node_mut(id) else {
                    return false;
                };
                node.widget.on_mouse(mouse, node.rect)
            }
        }
    }

    // ─── Draw ────────────────────────────────────────────────────────────

    /// Draw every drawable node into `grid`.
    pub fn draw(&self, grid: &mut Grid) {
        let mut order: Vec<(i32, &Node)> = self
            .preorder()
            .into_iter()
            .filter_map(|id| self.node(id))
            .filter(|n| n.widget.caps().contains(Caps::DRAWABLE))
            .map(|n| (n.z, n))
            .collect();
        // Stable: tree order survives within a z.
        order.sort_by_key(|&(z, _)| z);
        for (_, node) in order {
            if let Some(rect) = node.rect.intersect(grid.bounds()) {
                node.widget.draw(grid, rect);
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
