// SPDX-License-Identifier: MIT
//
// k-widget — Retained widget tree for kestrel.
//
// A small arena of widgets on top of k-term's grid and k-modal's commands:
// containers that split space by constraint, a scrollable table, a status
// line and a notification overlay, with focus, z-order and hit testing.
// `Ui` glues them to the event loop and to a `RowSource` that supplies the
// table's rows.
//
// Widgets are a closed enum and every pass matches on all of its variants.

#[cfg(unix)]
pub mod app;
pub mod layout;
pub mod notify;
pub mod source;
pub mod status;
pub mod table;
pub mod tree;

#[cfg(unix)]
pub use app::{Ui, UiConfig};
pub use layout::{Axis, Constraint};
pub use notify::{Level, Notifications, OverlayConfig};
pub use source::{Fetch, RowSource, StaticRows};
pub use table::{Column, Row, Table};
pub use tree::{Widget, WidgetId, WidgetTree};
