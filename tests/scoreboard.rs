use chrono::{TimeZone, Utc};

use rx_scoreboard::aggregate::{CategoryFilter, Filters};
use rx_scoreboard::cache::LocalCache;
use rx_scoreboard::config::Config;
use rx_scoreboard::counter::CounterEngine;
use rx_scoreboard::model::Category;
use rx_scoreboard::registry::DatasetRegistry;
use rx_scoreboard::remote::NullSource;
use rx_scoreboard::scatter::{Layout, ScatterPlot};
use rx_scoreboard::view::{self, HeroView, HERO_TARGET};

const DATASET: &str = r#"[
  {"part": "D", "display_name": "Eliquis", "spend_total_usd": 18000000000, "claims": 25000000,
   "beneficiaries": 4000000, "prev_year": 2022, "prev_spend_total_usd": 16000000000},
  {"part": "D", "display_name": "Ozempic", "is_glp1": true, "spend_total_usd": 9000000000,
   "claims": 8000000, "prev_year": 2022, "prev_spend_total_usd": 4000000000},
  {"part": "B", "display_name": "Keytruda", "spend_total_usd": 5000000000, "claims": 900000},
  {"part": "D", "display_name": "Jardiance", "spend_total_usd": 8000000000},
  {"part": "D", "display_name": "Trulicity", "is_glp1": true, "spend_total_usd": 7000000000, "claims": 6000000},
  {"part": "B", "display_name": "Eylea", "spend_total_usd": 3000000000, "claims": 2000000}
]"#;

const CONTEXT: &str = r#"{"latest_year": 2023, "value_usd": 449700000000, "series": []}"#;

async fn registry_with_2023() -> DatasetRegistry {
    let mut reg = DatasetRegistry::new(Config::offline(), Box::new(LocalCache::in_memory()), Box::new(NullSource));
    reg.ingest_upload("medicare_drugs_2023.json", DATASET.as_bytes()).await;
    reg.ingest_upload("nhe_retail_rx.json", CONTEXT.as_bytes()).await;
    reg.clear_feedback();
    reg
}

#[tokio::test]
async fn past_year_shows_the_full_total_without_motion() {
    let reg = registry_with_2023().await;
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let board = view::build(&reg, &Filters::for_year(2023), now, &Layout::default());

    let HeroView::Total { total, params, label } = &board.hero else {
        panic!("expected a total");
    };
    assert_eq!(*total, 50_000_000_000.0);
    assert_eq!(params.target_value, *total);
    assert_eq!(params.rate_per_second, 0.0);
    assert!(!label.contains("live"));

    let names: Vec<&str> = board.top.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Eliquis", "Ozempic", "Jardiance", "Trulicity", "Keytruda"]);
    assert_eq!(board.movers[0].name, "Ozempic");
    assert_eq!(board.movers.len(), 6);

    let ScatterPlot::Populated(diagram) = &board.scatter else {
        panic!("expected a populated scatter");
    };
    // Jardiance has no claims
    assert_eq!(diagram.points.len(), 5);

    let line = board.context_line.as_deref().unwrap();
    assert!(line.contains("2023"));
    assert!(line.contains("of it"));
    assert!(board.status.ends_with("Session only (will not survive a reload): 2023, context."));
}

#[tokio::test]
async fn current_year_counts_up_from_elapsed_share() {
    let reg = registry_with_2023().await;
    let now = Utc.with_ymd_and_hms(2023, 7, 2, 12, 0, 0).unwrap();
    let board = view::build(&reg, &Filters::for_year(2023), now, &Layout::default());

    let HeroView::Total { total, params, label } = &board.hero else {
        panic!("expected a total");
    };
    assert!(board.time.is_live);
    assert!(label.ends_with("(live estimate)"));
    assert!(params.rate_per_second > 0.0);
    assert!(params.target_value > total * 0.49 && params.target_value < total * 0.51);
    assert_eq!(params.ceiling, *total);
}

#[tokio::test]
async fn missing_year_renders_the_guided_empty_state() {
    let reg = registry_with_2023().await;
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let board = view::build(&reg, &Filters::for_year(2021), now, &Layout::default());

    assert_eq!(
        board.hero,
        HeroView::NoData { message: "No data for 2021. Upload medicare_drugs_2021.json to see it here.".to_string() }
    );
    assert!(board.top.is_empty());
    assert!(board.movers.is_empty());
    assert_eq!(board.scatter, ScatterPlot::NotEnoughData);
    assert!(board.targets().is_empty());
    assert_eq!(view::choose_year(&reg, Some(2021)), Some(2023));
}

#[tokio::test]
async fn narrowing_filters_releases_stale_counters() {
    let reg = registry_with_2023().await;
    let now = Utc.with_ymd_and_hms(2023, 7, 2, 12, 0, 0).unwrap();
    let mut engine = CounterEngine::new();

    let all = view::build(&reg, &Filters::for_year(2023), now, &Layout::default());
    let paints = view::sync_counters(&mut engine, &all);
    assert_eq!(paints.len(), 6);
    assert_eq!(engine.registered_count(), 6);
    assert!(engine.wants_frame());

    let glp1 = Filters { year: 2023, category: CategoryFilter::Only(Category::PartD), flagged_only: true };
    let narrow = view::build(&reg, &glp1, now, &Layout::default());
    view::sync_counters(&mut engine, &narrow);
    assert_eq!(engine.registered_count(), 3);
    assert!(engine.state("top-4").is_none());
    assert!(engine.state(HERO_TARGET).is_some());

    let empty = Filters { year: 2023, category: CategoryFilter::Only(Category::PartB), flagged_only: true };
    let none = view::build(&reg, &empty, now, &Layout::default());
    assert!(matches!(none.hero, HeroView::NoData { .. }));
    view::sync_counters(&mut engine, &none);
    assert_eq!(engine.registered_count(), 0);
    assert!(!engine.wants_frame());
}

#[tokio::test]
async fn reduced_motion_paints_once_and_stays_still() {
    let reg = registry_with_2023().await;
    let now = Utc.with_ymd_and_hms(2023, 7, 2, 12, 0, 0).unwrap();
    let board = view::build(&reg, &Filters::for_year(2023), now, &Layout::default());

    let mut engine = CounterEngine::new();
    engine.set_reduced_motion(true);
    let paints = view::sync_counters(&mut engine, &board);
    assert!(paints.iter().any(|p| p.target == HERO_TARGET));
    assert!(!engine.wants_frame());
    assert!(engine.tick(std::time::Instant::now()).paints.is_empty());
}

#[tokio::test]
async fn empty_state_names_the_configured_upload_file() {
    let mut cfg = Config::offline();
    cfg.dataset_prefix = "partd_".to_string();
    let reg = DatasetRegistry::new(cfg, Box::new(LocalCache::in_memory()), Box::new(NullSource));
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();
    let board = view::build(&reg, &Filters::for_year(2024), now, &Layout::default());

    assert_eq!(
        board.hero,
        HeroView::NoData { message: "No data for 2024. Upload partd_2024.json to see it here.".to_string() }
    );
}
