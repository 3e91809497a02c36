use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Program track a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "B")]
    PartB,
    #[serde(rename = "D")]
    PartD,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::PartB => "Part B",
            Category::PartD => "Part D",
        }
    }
}

/// One drug's spending for a year, as emitted by the ETL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(rename = "part")]
    pub category: Category,
    pub display_name: String,
    #[serde(rename = "is_glp1", default)]
    pub is_flagged: bool,
    #[serde(default)]
    pub claims: Option<f64>,
    #[serde(default)]
    pub beneficiaries: Option<f64>,
    #[serde(rename = "spend_total_usd")]
    pub spend_total: f64,
    #[serde(rename = "prev_spend_total_usd", default)]
    pub prev_spend_total: Option<f64>,
    #[serde(default)]
    pub prev_year: Option<i32>,
}

fn known_count(v: Option<f64>) -> Option<f64> {
    v.filter(|n| n.is_finite() && *n >= 0.0)
}

impl Record {
    /// Claims, or `None` when the source left it unknown.
    pub fn known_claims(&self) -> Option<f64> {
        known_count(self.claims)
    }

    pub fn known_beneficiaries(&self) -> Option<f64> {
        known_count(self.beneficiaries)
    }

    /// Prior-year spend when a comparison exists.
    pub fn known_prev_spend(&self) -> Option<f64> {
        self.prev_spend_total.filter(|n| n.is_finite())
    }
}

/// All records published for one calendar year. Never mutated after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub year: i32,
    pub records: Vec<Record>,
}

impl Dataset {
    /// Parse a JSON array of records. Any other shape is an error.
    pub fn from_json(year: i32, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("invalid JSON")?;
        Self::from_value(year, value)
    }

    pub fn from_value(year: i32, value: Value) -> Result<Self> {
        if !value.is_array() {
            return Err(anyhow!("expected a JSON array of records"));
        }
        let records: Vec<Record> = serde_json::from_value(value).context("record shape mismatch")?;
        for (idx, rec) in records.iter().enumerate() {
            if !rec.spend_total.is_finite() || rec.spend_total < 0.0 {
                return Err(anyhow!("record {} has invalid spend_total_usd {}", idx, rec.spend_total));
            }
        }
        Ok(Self { year, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Where a year's dataset currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Remote,
    Cached,
    SessionOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub value_usd: f64,
}

/// National retail prescription spending headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalContext {
    pub latest_year: i32,
    pub value_usd: f64,
    #[serde(default)]
    pub series: Vec<SeriesPoint>,
}

impl NationalContext {
    /// Parse a single JSON object. Arrays and scalars are rejected.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("invalid JSON")?;
        if !value.is_object() {
            return Err(anyhow!("expected a JSON object"));
        }
        let ctx: NationalContext = serde_json::from_value(value).context("context shape mismatch")?;
        if !ctx.value_usd.is_finite() {
            return Err(anyhow!("context value_usd is not finite"));
        }
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"[
        {"year": 2022, "part": "D", "display_name": "Ozempic", "spend_total_usd": 4600000000.0,
         "claims": 1200000, "beneficiaries": 500000, "prev_year": 2021,
         "prev_spend_total_usd": 2600000000.0, "is_glp1": true},
        {"year": 2022, "part": "B", "display_name": "Keytruda", "spend_total_usd": 4900000000.0,
         "claims": null, "beneficiaries": null, "prev_year": null,
         "prev_spend_total_usd": null, "is_glp1": false}
    ]"#;

    #[test]
    fn parses_etl_records() {
        let ds = Dataset::from_json(2022, SAMPLE).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].category, Category::PartD);
        assert!(ds.records[0].is_flagged);
        assert_eq!(ds.records[0].known_claims(), Some(1_200_000.0));
        assert_eq!(ds.records[1].known_claims(), None);
        assert_eq!(ds.records[1].known_prev_spend(), None);
    }

    #[test]
    fn negative_counts_are_unknown() {
        let mut ds = Dataset::from_json(2022, SAMPLE).unwrap();
        ds.records[0].claims = Some(-3.0);
        assert_eq!(ds.records[0].known_claims(), None);
    }

    #[test]
    fn rejects_object_payload_for_dataset() {
        assert!(Dataset::from_json(2022, r#"{"latest_year": 2022, "value_usd": 1.0}"#).is_err());
    }

    #[test]
    fn rejects_negative_spend() {
        let text = r#"[{"part": "D", "display_name": "X", "spend_total_usd": -1.0}]"#;
        assert!(Dataset::from_json(2022, text).is_err());
    }

    #[test]
    fn context_requires_object() {
        let ctx = NationalContext::from_json(r#"{"latest_year": 2023, "value_usd": 449.7e9}"#).unwrap();
        assert_eq!(ctx.latest_year, 2023);
        assert!(ctx.series.is_empty());
        assert!(NationalContext::from_json("[]").is_err());
    }
}
