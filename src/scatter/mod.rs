//! Bubble scatter of claims against cost per claim, sized by spend.

pub mod plot;
pub mod scale;
pub mod tooltip;

pub use plot::{project, Diagram, Layout, PlotPoint, ScatterPlot, NOT_ENOUGH_DATA};
pub use scale::{nice_ceil, nice_step, ticks};
