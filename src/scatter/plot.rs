use super::scale::{nice_ceil, ticks, LinearScale, SqrtScale};
use crate::format;
use crate::model::{Category, Record};

pub const NOT_ENOUGH_DATA: &str = "Not enough data to plot";

/// Pixel geometry of the plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            width: 720.0,
            height: 420.0,
            margin_top: 24.0,
            margin_right: 32.0,
            margin_bottom: 48.0,
            margin_left: 72.0,
            min_radius: 4.0,
            max_radius: 28.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotPoint {
    pub name: String,
    pub category: Category,
    pub flagged: bool,
    pub claims: f64,
    pub unit_cost: f64,
    pub spend: f64,
    pub beneficiaries: Option<f64>,
    pub x: f64,
    pub y: f64,
    pub r: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AxisTick {
    pub value: f64,
    /// Pixel position along the axis
    pub position: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub title: &'static str,
    pub ceiling: f64,
    pub ticks: Vec<AxisTick>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    pub width: f64,
    pub height: f64,
    pub x_axis: Axis,
    pub y_axis: Axis,
    /// Largest spend first so smaller bubbles draw on top.
    pub points: Vec<PlotPoint>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScatterPlot {
    NotEnoughData,
    Populated(Diagram),
}

impl ScatterPlot {
    pub fn is_populated(&self) -> bool {
        matches!(self, ScatterPlot::Populated(_))
    }
}

struct Plottable<'a> {
    record: &'a Record,
    claims: f64,
    unit_cost: f64,
}

fn plottable(record: &Record) -> Option<Plottable<'_>> {
    let claims = record.known_claims().filter(|c| *c > 0.0)?;
    let spend = record.spend_total;
    if !(spend.is_finite() && spend > 0.0) {
        return None;
    }
    let unit_cost = spend / claims;
    if !(unit_cost.is_finite() && unit_cost > 0.0) {
        return None;
    }
    Some(Plottable { record, claims, unit_cost })
}

fn axis(title: &'static str, ceiling: f64, scale: &LinearScale, label: fn(f64) -> String) -> Axis {
    Axis {
        title,
        ceiling,
        ticks: ticks(ceiling)
            .into_iter()
            .map(|value| AxisTick { value, position: scale.apply(value), label: label(value) })
            .collect(),
    }
}

/// Place claims (x), cost per claim (y) and spend (radius) for `records`.
pub fn project(records: &[&Record], layout: &Layout) -> ScatterPlot {
    let mut points: Vec<Plottable<'_>> = records.iter().filter_map(|r| plottable(r)).collect();
    if points.is_empty() {
        return ScatterPlot::NotEnoughData;
    }
    points.sort_by(|a, b| {
        b.record
            .spend_total
            .partial_cmp(&a.record.spend_total)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let max_claims = points.iter().map(|p| p.claims).fold(0.0, f64::max);
    let max_cost = points.iter().map(|p| p.unit_cost).fold(0.0, f64::max);
    let max_spend = points.iter().map(|p| p.record.spend_total).fold(0.0, f64::max);

    let x_ceiling = nice_ceil(max_claims);
    let y_ceiling = nice_ceil(max_cost);
    let x_scale = LinearScale::new((0.0, x_ceiling), (layout.margin_left, layout.width - layout.margin_right));
    let y_scale = LinearScale::new((0.0, y_ceiling), (layout.height - layout.margin_bottom, layout.margin_top));
    let r_scale = SqrtScale {
        max_value: max_spend,
        min_radius: layout.min_radius,
        max_radius: layout.max_radius,
    };

    let points = points
        .into_iter()
        .map(|p| PlotPoint {
            name: p.record.display_name.clone(),
            category: p.record.category,
            flagged: p.record.is_flagged,
            claims: p.claims,
            unit_cost: p.unit_cost,
            spend: p.record.spend_total,
            beneficiaries: p.record.known_beneficiaries(),
            x: x_scale.apply(p.claims),
            y: y_scale.apply(p.unit_cost),
            r: r_scale.apply(p.record.spend_total),
        })
        .collect();

    ScatterPlot::Populated(Diagram {
        width: layout.width,
        height: layout.height,
        x_axis: axis("Claims", x_ceiling, &x_scale, format::count_compact),
        y_axis: axis("Cost per claim", y_ceiling, &y_scale, format::usd_compact),
        points,
    })
}
