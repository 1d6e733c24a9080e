use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Row from one of the lookup tables (ship, port, contractor, pollutant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// One substance recorded on an operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollutantLine {
    pub pollutant_id: i64,
    pub name: String,
    pub volume: f64,
    pub cost: f64,
}

/// Operation row with resolved names and its line items, as fetched for the
/// list and detail views
#[derive(Debug, Clone, Deserialize)]
pub struct OperationRecord {
    pub id: i64,
    pub ship: String,
    pub port: String,
    pub contractor: String,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub pollutants: Vec<PollutantLine>,
}

/// Operation row as fetched for the analytics pass
#[derive(Debug, Clone, Deserialize)]
pub struct FleetOperation {
    pub id: i64,
    pub ship_id: i64,
    pub ship: String,
    pub date: NaiveDate,
    pub pollutants: Vec<PollutantLine>,
}

/// Validated line item headed for the store
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemInput {
    pub pollutant_id: i64,
    pub volume: f64,
    pub cost: f64,
}

/// Diagnostic record for a substance dropped from a submission because one of
/// its numeric fields failed to parse
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub pollutant_id: i64,
    pub field: &'static str,
    pub value: String,
}

/// Validated create/edit submission
#[derive(Debug, Clone)]
pub struct OperationInput {
    pub ship_id: i64,
    pub port_id: i64,
    pub contractor_id: i64,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub items: Vec<LineItemInput>,
}

impl OperationInput {
    /// Map an urlencoded submission to a validated input.
    ///
    /// Main fields (ship_id, port_id, contractor_id, date) are required and
    /// fail the whole submission when missing or unparsable. The per-substance
    /// `volume_{id}` / `cost_{id}` pairs are collected against the current
    /// pollutant set; a bad pair only drops that substance and is reported in
    /// the returned diagnostics.
    pub fn from_form(
        form: &HashMap<String, String>,
        pollutants: &[NamedRef],
    ) -> Result<(Self, Vec<SkippedField>), String> {
        let ship_id = require_id(form, "ship_id")?;
        let port_id = require_id(form, "port_id")?;
        let contractor_id = require_id(form, "contractor_id")?;
        let date = form
            .get("date")
            .ok_or_else(|| "missing field: date".to_string())
            .and_then(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|_| format!("invalid date: {:?}", raw))
            })?;
        let has_documents = form
            .get("has_documents")
            .map(|v| matches!(v.trim(), "on" | "true" | "1"))
            .unwrap_or(false);

        let (items, skipped) = collect_line_items(pollutants, form);

        Ok((
            Self {
                ship_id,
                port_id,
                contractor_id,
                date,
                has_documents,
                items,
            },
            skipped,
        ))
    }
}

/// Build the substance -> (volume, cost) mapping from the dynamic form
/// fields, iterating over the current pollutant set.
///
/// Absent or blank fields count as zero; all-zero pairs are dropped rather
/// than stored. A non-blank field that fails numeric parsing skips that one
/// substance and yields a [`SkippedField`] diagnostic.
pub fn collect_line_items(
    pollutants: &[NamedRef],
    form: &HashMap<String, String>,
) -> (Vec<LineItemInput>, Vec<SkippedField>) {
    let mut items = Vec::new();
    let mut skipped = Vec::new();

    for pollutant in pollutants {
        let volume_key = format!("volume_{}", pollutant.id);
        let cost_key = format!("cost_{}", pollutant.id);

        let volume = parse_amount(form, &volume_key);
        let cost = parse_amount(form, &cost_key);

        match (volume, cost) {
            (Ok(volume), Ok(cost)) => {
                if volume > 0.0 || cost > 0.0 {
                    items.push(LineItemInput {
                        pollutant_id: pollutant.id,
                        volume,
                        cost,
                    });
                }
            }
            (volume, cost) => {
                if let Err(value) = volume {
                    skipped.push(SkippedField {
                        pollutant_id: pollutant.id,
                        field: "volume",
                        value,
                    });
                }
                if let Err(value) = cost {
                    skipped.push(SkippedField {
                        pollutant_id: pollutant.id,
                        field: "cost",
                        value,
                    });
                }
            }
        }
    }

    (items, skipped)
}

/// Parse one numeric form field. Absent/blank means 0.0; negative amounts are
/// clamped to zero. Err carries the raw value for diagnostics.
fn parse_amount(form: &HashMap<String, String>, key: &str) -> Result<f64, String> {
    match form.get(key) {
        None => Ok(0.0),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map(|v| v.max(0.0))
                .map_err(|_| raw.clone())
        }
    }
}

fn require_id(form: &HashMap<String, String>, key: &str) -> Result<i64, String> {
    form.get(key)
        .ok_or_else(|| format!("missing field: {}", key))
        .and_then(|raw| {
            raw.trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid {}: {:?}", key, raw))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pollutants() -> Vec<NamedRef> {
        vec![
            NamedRef {
                id: 1,
                name: "Fresh water".into(),
            },
            NamedRef {
                id: 2,
                name: "Sewage".into(),
            },
            NamedRef {
                id: 7,
                name: "Garbage".into(),
            },
        ]
    }

    fn form(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_all_zero_pair_dropped() {
        let f = form(&[("volume_7", "0"), ("cost_7", "0"), ("volume_1", "12.5")]);
        let (items, skipped) = collect_line_items(&pollutants(), &f);
        assert!(skipped.is_empty());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pollutant_id, 1);
        assert_eq!(items[0].volume, 12.5);
        assert_eq!(items[0].cost, 0.0);
    }

    #[test]
    fn test_absent_and_blank_fields_mean_zero() {
        let f = form(&[("volume_2", "   "), ("cost_2", "30")]);
        let (items, skipped) = collect_line_items(&pollutants(), &f);
        assert!(skipped.is_empty());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pollutant_id, 2);
        assert_eq!(items[0].volume, 0.0);
        assert_eq!(items[0].cost, 30.0);
    }

    #[test]
    fn test_bad_value_skips_only_that_substance() {
        let f = form(&[
            ("volume_1", "abc"),
            ("cost_1", "10"),
            ("volume_2", "5"),
            ("cost_2", "50"),
        ]);
        let (items, skipped) = collect_line_items(&pollutants(), &f);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pollutant_id, 2);
        assert_eq!(
            skipped,
            vec![SkippedField {
                pollutant_id: 1,
                field: "volume",
                value: "abc".into(),
            }]
        );
    }

    #[test]
    fn test_negative_amounts_clamp_to_zero() {
        let f = form(&[("volume_1", "-3"), ("cost_1", "-1")]);
        let (items, skipped) = collect_line_items(&pollutants(), &f);
        assert!(items.is_empty());
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_from_form_happy_path() {
        let f = form(&[
            ("ship_id", "3"),
            ("port_id", "1"),
            ("contractor_id", "2"),
            ("date", "2025-06-01"),
            ("volume_1", "40"),
            ("cost_1", "800"),
        ]);
        let (input, skipped) = OperationInput::from_form(&f, &pollutants()).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(input.ship_id, 3);
        assert_eq!(input.port_id, 1);
        assert_eq!(input.contractor_id, 2);
        assert_eq!(input.date, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(!input.has_documents);
        assert_eq!(input.items.len(), 1);
    }

    #[test]
    fn test_from_form_has_documents_checkbox() {
        let mut f = form(&[
            ("ship_id", "1"),
            ("port_id", "1"),
            ("contractor_id", "1"),
            ("date", "2025-06-01"),
        ]);
        f.insert("has_documents".into(), "on".into());
        let (input, _) = OperationInput::from_form(&f, &pollutants()).unwrap();
        assert!(input.has_documents);
    }

    #[test]
    fn test_from_form_rejects_missing_and_bad_main_fields() {
        let f = form(&[("port_id", "1"), ("contractor_id", "1"), ("date", "2025-06-01")]);
        assert!(OperationInput::from_form(&f, &pollutants())
            .unwrap_err()
            .contains("ship_id"));

        let f = form(&[
            ("ship_id", "1"),
            ("port_id", "1"),
            ("contractor_id", "1"),
            ("date", "junk"),
        ]);
        assert!(OperationInput::from_form(&f, &pollutants())
            .unwrap_err()
            .contains("date"));
    }
}
