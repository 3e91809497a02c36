use super::plot::{Diagram, PlotPoint};
use crate::format;

const OFFSET: f64 = 12.0;
const PAD: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TooltipContent {
    pub title: String,
    pub total: String,
    pub claims: String,
    pub beneficiaries: String,
}

impl TooltipContent {
    pub fn for_point(p: &PlotPoint) -> Self {
        Self {
            title: p.name.clone(),
            total: format::usd_whole(p.spend),
            claims: format::count(Some(p.claims)),
            beneficiaries: format::count(p.beneficiaries),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Hover(usize),
    Focus(usize),
    Leave,
    Blur,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TooltipState {
    Hidden,
    Shown { point: usize, x: f64, y: f64 },
}

/// Top-left corner for a `size` box near `anchor`, kept inside `viewport`.
/// Prefers right of and above the anchor, flipping sides on overflow.
pub fn place_tooltip(anchor: (f64, f64), size: (f64, f64), viewport: Viewport) -> (f64, f64) {
    let (ax, ay) = anchor;
    let (w, h) = size;

    let mut x = ax + OFFSET;
    if x + w > viewport.width - PAD {
        x = ax - OFFSET - w;
    }
    let mut y = ay - OFFSET - h;
    if y < PAD {
        y = ay + OFFSET;
    }

    let max_x = (viewport.width - w - PAD).max(PAD);
    let max_y = (viewport.height - h - PAD).max(PAD);
    (x.clamp(PAD, max_x), y.clamp(PAD, max_y))
}

impl TooltipState {
    /// Next state for a pointer/keyboard event. `origin` is the diagram's
    /// top-left corner in viewport coordinates.
    pub fn handle(
        self,
        event: PointerEvent,
        diagram: &Diagram,
        origin: (f64, f64),
        size: (f64, f64),
        viewport: Viewport,
    ) -> Self {
        match event {
            PointerEvent::Hover(idx) | PointerEvent::Focus(idx) => match diagram.points.get(idx) {
                Some(p) => {
                    let (x, y) = place_tooltip((origin.0 + p.x, origin.1 + p.y), size, viewport);
                    TooltipState::Shown { point: idx, x, y }
                }
                None => TooltipState::Hidden,
            },
            PointerEvent::Leave | PointerEvent::Blur | PointerEvent::Escape => TooltipState::Hidden,
        }
    }

    pub fn content(&self, diagram: &Diagram) -> Option<TooltipContent> {
        match self {
            TooltipState::Shown { point, .. } => diagram.points.get(*point).map(TooltipContent::for_point),
            TooltipState::Hidden => None,
        }
    }
}
