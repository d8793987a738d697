// SPDX-License-Identifier: MIT
//
// Space partitioning along one axis.
//
// Containers split their rect between children, and tables split their
// width between columns, with the same rule:
//
//   1. `Fixed(n)` children take `n` cells each, in order, while space lasts.
//   2. What remains goes to `Fill(w)` children in proportion to `w`. Cells
//      lost to rounding go one each to the first fills.
//   3. `Overlay` children take no share; they get the container's whole
//      rect on top of the others.
//
// Asking for more than there is never fails. Fixed requests are clamped in
// order (the last ones shrink first) and the overflow is traced.

use k_term::buffer::Rect;
use tracing::debug;

/// How a child asks for space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Exactly this many cells along the axis.
    Fixed(u16),
    /// A share of what the fixed children leave, weighted.
    Fill(u16),
    /// The whole container rect, layered over the partitioned children.
    Overlay,
}

impl Constraint {
    #[inline]
    #[must_use]
    pub const fn is_overlay(self) -> bool {
        matches!(self, Self::Overlay)
    }
}

/// Direction a container stacks its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    /// Top to bottom.
    #[default]
    Vertical,
    /// Left to right.
    Horizontal,
}

impl Axis {
    /// Length of `rect` along this axis.
    #[must_use]
    pub const fn length(self, rect: Rect) -> u16 {
        match self {
            Self::Vertical => rect.height,
            Self::Horizontal => rect.width,
        }
    }

    /// The slice of `rect` that starts `offset` cells in and is `len` long.
    #[must_use]
    pub const fn slice(self, rect: Rect, offset: u16, len: u16) -> Rect {
        match self {
            Self::Vertical => Rect::new(rect.x, rect.y + offset, rect.width, len),
            Self::Horizontal => Rect::new(rect.x + offset, rect.y, len, rect.height),
        }
    }
}

/// Cells each constraint gets out of `total`. Overlays get 0.
#[must_use]
pub fn partition(total: u16, constraints: &[Constraint]) -> Vec<u16> {
    let mut sizes = vec![0u16; constraints.len()];
    let mut remaining = total;

    let requested: u32 = constraints
        .iter()
        .map(|c| match c {
            Constraint::Fixed(n) => u32::from(*n),
            _ => 0,
        })
        .sum();
    if requested > u32::from(total) {
        debug!(requested, available = total, "layout overflow, clamping fixed sizes");
    }

    for (size, c) in sizes.iter_mut().zip(constraints) {
        if let Constraint::Fixed(n) = *c {
            *size = n.min(remaining);
            remaining -= *size;
        }
    }

    let weight: u32 = constraints
        .iter()
        .map(|c| match c {
            Constraint::Fill(w) => u32::from(*w),
            _ => 0,
        })
        .sum();
    if weight == 0 {
        return sizes;
    }

    let mut given = 0u16;
    for (size, c) in sizes.iter_mut().zip(constraints) {
        if let Constraint::Fill(w) = *c {
            let share = u32::from(remaining) * u32::from(w) / weight;
            // share <= remaining, which fits in u16.
            *size = u16::try_from(share).unwrap_or(remaining);
            given += *size;
        }
    }

    let mut leftover = remaining - given;
    for (size, c) in sizes.iter_mut().zip(constraints) {
        if leftover == 0 {
            break;
        }
        if matches!(c, Constraint::Fill(w) if *w > 0) {
            *size += 1;
            leftover -= 1;
        }
    }
    sizes
}

/// Split `rect` along `axis`. Overlay entries get the whole `rect`.
#[must_use]
pub fn split(rect: Rect, axis: Axis, constraints: &[Constraint]) -> Vec<Rect> {
    let sizes = partition(axis.length(rect), constraints);
    let mut offset = 0u16;
    sizes
        .iter()
        .zip(constraints)
        .map(|(&len, c)| {
            if c.is_overlay() {
                return rect;
            }
            let part = axis.slice(rect, offset, len);
            offset += len;
            part
        })
        .collect()
}
