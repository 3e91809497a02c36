use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Utc};
use serde_json::json;

use rx_scoreboard::aggregate::{CategoryFilter, Filters};
use rx_scoreboard::cache::LocalCache;
use rx_scoreboard::config::Config;
use rx_scoreboard::counter::clock::ClockDriver;
use rx_scoreboard::counter::CounterEngine;
use rx_scoreboard::format;
use rx_scoreboard::logging::{log, obj, v_str, Domain, Level};
use rx_scoreboard::model::Category;
use rx_scoreboard::registry::{DatasetRegistry, ForgetOutcome};
use rx_scoreboard::remote::{source_from_config, DatasetSource, NullSource};
use rx_scoreboard::scatter::tooltip::{PointerEvent, TooltipState, Viewport};
use rx_scoreboard::scatter::{Layout, ScatterPlot, NOT_ENOUGH_DATA};
use rx_scoreboard::view::{self, HeroView, Scoreboard, HERO_TARGET};

#[derive(Debug, Default)]
struct Args {
    uploads: Vec<String>,
    forget: bool,
    year: Option<i32>,
    part: Option<Category>,
    glp1: bool,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut i = 0;
    while i < raw.len() {
        match raw[i].as_str() {
            "--upload" => {
                while i + 1 < raw.len() && !raw[i + 1].starts_with("--") {
                    i += 1;
                    args.uploads.push(raw[i].clone());
                }
            }
            "--forget" => args.forget = true,
            "--glp1" => args.glp1 = true,
            "--year" => {
                i += 1;
                let v = raw.get(i).context("--year needs a value")?;
                args.year = Some(v.parse().with_context(|| format!("bad year {}", v))?);
            }
            "--part" => {
                i += 1;
                args.part = match raw.get(i).map(|s| s.to_uppercase()).as_deref() {
                    Some("B") => Some(Category::PartB),
                    Some("D") => Some(Category::PartD),
                    Some("ALL") => None,
                    other => bail!("--part expects B, D or all, got {:?}", other),
                };
            }
            other => bail!("unknown argument {}", other),
        }
        i += 1;
    }
    Ok(args)
}

fn read_uploads(paths: &[String]) -> Vec<(String, Vec<u8>)> {
    paths
        .iter()
        .filter_map(|p| match std::fs::read(p) {
            Ok(bytes) => Some((p.clone(), bytes)),
            Err(err) => {
                log(
                    Level::Warn,
                    Domain::Upload,
                    "read_failed",
                    obj(&[("name", v_str(p)), ("error", v_str(&err.to_string()))]),
                );
                eprintln!("could not read {}: {}", p, err);
                None
            }
        })
        .collect()
}

fn print_board(board: &Scoreboard, years: &[i32]) {
    let years_text = if years.is_empty() {
        "none".to_string()
    } else {
        years.iter().map(|y| y.to_string()).collect::<Vec<_>>().join(", ")
    };
    println!("Years available: {}", years_text);
    match &board.hero {
        HeroView::NoData { message } => println!("\n{}", message),
        HeroView::Total { label, total, .. } => {
            println!("\n{}", label);
            println!("  full year: {}", format::usd_compact(*total));
        }
    }
    if let Some(line) = &board.context_line {
        println!("{}", line);
    }

    if !board.top.is_empty() {
        println!("\nTop drugs by spending");
        for (i, row) in board.top.iter().enumerate() {
            println!("  {}. {} [{}] {}", i + 1, row.name, row.category.label(), format::usd_compact(row.spend));
        }
    }
    if !board.movers.is_empty() {
        println!("\nBiggest movers");
        for m in &board.movers {
            println!("  {} {} {}", m.name, m.spend, m.change);
        }
    }

    println!();
    match &board.scatter {
        ScatterPlot::NotEnoughData => println!("{}", NOT_ENOUGH_DATA),
        ScatterPlot::Populated(d) => {
            println!(
                "Scatter: {} drugs, claims up to {}, cost per claim up to {}",
                d.points.len(),
                format::count_compact(d.x_axis.ceiling),
                format::usd_compact(d.y_axis.ceiling)
            );
            let viewport = Viewport { width: d.width, height: d.height };
            let tip = TooltipState::Hidden.handle(PointerEvent::Focus(0), d, (0.0, 0.0), (180.0, 72.0), viewport);
            if let Some(c) = tip.content(d) {
                println!("  largest: {} · {} · {} claims · {} beneficiaries", c.title, c.total, c.claims, c.beneficiaries);
            }
        }
    }
    println!("\n{}", board.status);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = parse_args(&raw)?;
    let current_year = Utc::now().year();
    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("data_base", v_str(&cfg.data_base)),
            ("cache_path", v_str(&cfg.cache_path)),
            ("floor_year", json!(cfg.floor_year)),
            ("reduced_motion", json!(cfg.reduced_motion)),
        ]),
    );

    let source: Box<dyn DatasetSource> = match source_from_config(&cfg) {
        Ok(s) => s,
        Err(err) => {
            log(
                Level::Warn,
                Domain::Fetch,
                "source_unavailable",
                obj(&[("error", v_str(&format!("{:#}", err)))]),
            );
            Box::new(NullSource)
        }
    };
    let cache = LocalCache::new(&cfg.cache_path);
    let mut registry = DatasetRegistry::new(cfg.clone(), Box::new(cache), source);

    registry.hydrate().await;
    if args.forget {
        if let ForgetOutcome::Cleared { years, context } = registry.forget(current_year).await {
            log(
                Level::Info,
                Domain::Registry,
                "forgot",
                obj(&[("years", json!(years)), ("context", json!(context))]),
            );
        }
    }
    if !args.uploads.is_empty() {
        let files = read_uploads(&args.uploads);
        registry.ingest_batch(&files).await;
    }
    let years = registry.discover(current_year).await;

    let year = view::choose_year(&registry, args.year).unwrap_or(args.year.unwrap_or(current_year));
    let filters = Filters {
        year,
        category: args.part.map(CategoryFilter::Only).unwrap_or(CategoryFilter::All),
        flagged_only: args.glp1,
    };
    let board = view::build(&registry, &filters, Utc::now(), &Layout::default());
    print_board(&board, &years);

    let mut engine = CounterEngine::new();
    engine.set_reduced_motion(cfg.reduced_motion);
    let mut latest: BTreeMap<String, String> = BTreeMap::new();
    for paint in view::sync_counters(&mut engine, &board) {
        latest.insert(paint.target.clone(), paint.text);
    }

    if let Some(text) = latest.get(HERO_TARGET) {
        print!("\nSo far this year: {}", text);
        let _ = std::io::stdout().flush();
    }
    if cfg.run_secs > 0 && engine.wants_frame() {
        let driver = ClockDriver::new(cfg.frame_ms);
        let budget = Some(Duration::from_secs(cfg.run_secs));
        driver
            .run(&mut engine, budget, |paint| {
                if paint.target == HERO_TARGET {
                    print!("\rSo far this year: {}", paint.text);
                    let _ = std::io::stdout().flush();
                }
                latest.insert(paint.target.clone(), paint.text.clone());
            })
            .await;
    }
    if latest.contains_key(HERO_TARGET) {
        println!();
    }
    Ok(())
}
