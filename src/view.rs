//! Render-ready scoreboard for one filter selection, and the wiring that
//! keeps live counters in step with what is displayed.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::aggregate::{context_share, hero_total, movers, select, top_n, Filters, HeroTotal, MOVERS_N, TOP_N};
use crate::counter::{CounterEngine, Paint, TargetId};
use crate::format;
use crate::logging::{log, Domain, Level, ProfileScope};
use crate::model::Category;
use crate::registry::DatasetRegistry;
use crate::scatter::{project, Layout, ScatterPlot};
use crate::timectx::{self, LiveParams, TimeContext};

pub const HERO_TARGET: &str = "hero";

#[derive(Debug, Clone, PartialEq)]
pub enum HeroView {
    /// Guided empty state
    NoData { message: String },
    Total { label: String, total: f64, params: LiveParams },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedRow {
    pub target: TargetId,
    pub name: String,
    pub category: Category,
    pub spend: f64,
    pub params: LiveParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoverRow {
    pub name: String,
    pub spend: String,
    /// Signed change, or a note that there is no prior year
    pub change: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scoreboard {
    pub filters: Filters,
    pub time: TimeContext,
    pub hero: HeroView,
    pub top: Vec<RankedRow>,
    pub movers: Vec<MoverRow>,
    pub scatter: ScatterPlot,
    pub context_line: Option<String>,
    pub status: String,
}

impl Scoreboard {
    /// Counter targets this board displays, hero first.
    pub fn targets(&self) -> Vec<(TargetId, LiveParams)> {
        let mut out = Vec::with_capacity(self.top.len() + 1);
        if let HeroView::Total { params, .. } = &self.hero {
            out.push((HERO_TARGET.to_string(), *params));
        }
        for row in &self.top {
            out.push((row.target.clone(), row.params));
        }
        out
    }
}

/// The requested year when known, otherwise the newest known year.
pub fn choose_year(registry: &DatasetRegistry, requested: Option<i32>) -> Option<i32> {
    match requested {
        Some(y) if registry.dataset(y).is_some() => Some(y),
        _ => registry.latest_year(),
    }
}

fn no_data_message(filters: &Filters, upload_name: &str, has_dataset: bool) -> String {
    if has_dataset {
        format!(
            "No {}{} spending in {}. Try another filter.",
            filters.category.label(),
            if filters.flagged_only { " GLP-1" } else { "" },
            filters.year
        )
    } else {
        format!(
            "No data for {}. Upload {} to see it here.",
            filters.year, upload_name
        )
    }
}

pub fn build(registry: &DatasetRegistry, filters: &Filters, now: DateTime<Utc>, layout: &Layout) -> Scoreboard {
    let _scope = ProfileScope::with_context("build_scoreboard", &[("year", json!(filters.year))]);
    let time = timectx::compute(filters.year, now);
    let dataset = registry.dataset(filters.year);
    let slice = dataset.as_deref().map(|ds| select(ds, filters)).unwrap_or_default();

    let hero = match hero_total(&slice) {
        HeroTotal::NoData => {
            let upload_name = registry.config().dataset_file(filters.year);
            HeroView::NoData { message: no_data_message(filters, &upload_name, dataset.is_some()) }
        }
        HeroTotal::Total(total) => HeroView::Total {
            label: format!(
                "{} spending, {}{}",
                filters.category.label(),
                filters.year,
                if time.is_live { " (live estimate)" } else { "" }
            ),
            total,
            params: LiveParams::from_total(total, &time),
        },
    };

    let top = top_n(&slice, TOP_N)
        .into_iter()
        .enumerate()
        .map(|(i, r)| RankedRow {
            target: format!("top-{}", i),
            name: r.display_name.clone(),
            category: r.category,
            spend: r.spend_total,
            params: LiveParams::from_total(r.spend_total, &time),
        })
        .collect();

    let movers = movers(&slice, MOVERS_N)
        .into_iter()
        .map(|m| MoverRow {
            name: m.record.display_name.clone(),
            spend: format::usd_compact(m.record.spend_total),
            change: match (m.delta, m.pct_change) {
                (Some(d), Some(p)) => format!("{} ({})", format::usd_delta(d), format::percent(p)),
                (Some(d), None) => format::usd_delta(d),
                (None, _) => "no prior year".to_string(),
            },
        })
        .collect();

    let scatter = project(&slice, layout);

    let context_line = registry.context().map(|ctx| {
        let mut line = format!(
            "U.S. retail prescription drug spending, {}: {}",
            ctx.latest_year,
            format::usd_compact(ctx.value_usd)
        );
        if let HeroView::Total { total, .. } = &hero {
            if let Some(share) = context_share(*total, filters.year, Some(ctx)) {
                line.push_str(&format!(" · this selection is {} of it", format::percent(share)));
            }
        }
        line
    });

    let board = Scoreboard {
        filters: *filters,
        time,
        hero,
        top,
        movers,
        scatter,
        context_line,
        status: registry.status_text(),
    };
    log(
        Level::Debug,
        Domain::Render,
        "scoreboard",
        crate::logging::obj(&[
            ("year", json!(filters.year)),
            ("records", json!(slice.len())),
            ("live", json!(time.is_live)),
            ("scatter", json!(board.scatter.is_populated())),
        ]),
    );
    board
}

/// Release counters the board no longer shows, register new ones, and jump
/// every counter to its current value. Returns the resulting paints.
pub fn sync_counters(engine: &mut CounterEngine, board: &Scoreboard) -> Vec<Paint> {
    let targets = board.targets();
    let keep: Vec<TargetId> = targets.iter().map(|(id, _)| id.clone()).collect();
    engine.retain(&keep);

    let mut paints = Vec::new();
    for (id, params) in targets {
        if engine.state(&id).is_none() {
            engine.register(&id, format::usd_whole_formatter());
        }
        if let Some(p) = engine.update(&id, params) {
            paints.push(p);
        }
    }
    paints
}
