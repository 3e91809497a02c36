use std::cmp::Ordering;

use crate::model::{Category, Dataset, NationalContext, Record};

pub const TOP_N: usize = 5;
pub const MOVERS_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    fn admits(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryFilter::All => "Part B + Part D",
            CategoryFilter::Only(c) => c.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filters {
    pub year: i32,
    pub category: CategoryFilter,
    /// Restrict to GLP-1 drugs
    pub flagged_only: bool,
}

impl Filters {
    pub fn for_year(year: i32) -> Self {
        Self { year, category: CategoryFilter::All, flagged_only: false }
    }
}

/// Records of `dataset` admitted by `filters`, in dataset order.
pub fn select<'a>(dataset: &'a Dataset, filters: &Filters) -> Vec<&'a Record> {
    dataset
        .records
        .iter()
        .filter(|r| filters.category.admits(r.category))
        .filter(|r| !filters.flagged_only || r.is_flagged)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeroTotal {
    NoData,
    Total(f64),
}

pub fn hero_total(slice: &[&Record]) -> HeroTotal {
    let sum: f64 = slice.iter().map(|r| r.spend_total).filter(|v| v.is_finite()).sum();
    if slice.is_empty() || sum <= 0.0 {
        HeroTotal::NoData
    } else {
        HeroTotal::Total(sum)
    }
}

fn by_spend_desc(a: &&Record, b: &&Record) -> Ordering {
    b.spend_total.partial_cmp(&a.spend_total).unwrap_or(Ordering::Equal)
}

/// Largest `n` records by spend; ties keep dataset order.
pub fn top_n<'a>(slice: &[&'a Record], n: usize) -> Vec<&'a Record> {
    let mut ranked = slice.to_vec();
    ranked.sort_by(by_spend_desc);
    ranked.truncate(n);
    ranked
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mover<'a> {
    pub record: &'a Record,
    /// `None` when there is no prior-year figure
    pub delta: Option<f64>,
    pub pct_change: Option<f64>,
}

/// Records with a prior year ranked by change, then the rest ranked by size.
pub fn movers<'a>(slice: &[&'a Record], n: usize) -> Vec<Mover<'a>> {
    let mut scored: Vec<Mover<'a>> = Vec::new();
    let mut unscored: Vec<&'a Record> = Vec::new();
    for &rec in slice {
        match rec.known_prev_spend() {
            Some(prev) => scored.push(Mover {
                record: rec,
                delta: Some(rec.spend_total - prev),
                pct_change: if prev > 0.0 { Some((rec.spend_total - prev) / prev) } else { None },
            }),
            None => unscored.push(rec),
        }
    }
    scored.sort_by(|a, b| {
        let (da, db) = (a.delta.unwrap_or(0.0), b.delta.unwrap_or(0.0));
        db.partial_cmp(&da).unwrap_or(Ordering::Equal)
    });
    unscored.sort_by(by_spend_desc);

    scored
        .into_iter()
        .chain(unscored.into_iter().map(|record| Mover { record, delta: None, pct_change: None }))
        .take(n)
        .collect()
}

/// Slice total as a share of the national figure, when both describe the
/// same year.
pub fn context_share(total: f64, year: i32, ctx: Option<&NationalContext>) -> Option<f64> {
    let ctx = ctx?;
    let national = if ctx.latest_year == year {
        Some(ctx.value_usd)
    } else {
        ctx.series.iter().find(|p| p.year == year).map(|p| p.value_usd)
    }?;
    if national > 0.0 && total.is_finite() {
        Some(total / national)
    } else {
        None
    }
}
