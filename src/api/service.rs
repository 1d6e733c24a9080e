//! Shared business logic for the port-call servicing tracker
//!
//! Holds the filter builder, the per-operation cost rollup and the fleet-wide
//! aggregation pass, plus the store-facing service used by the HTTP handlers.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::db::DbConn;
use crate::models::{FleetOperation, NamedRef, OperationInput, OperationRecord, PollutantLine};

// ============================================================================
// Filter Builder
// ============================================================================

/// Raw, loosely-validated list-request parameters as they arrive on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterParams {
    pub ship_ids: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub port_id: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Typed operation-list filter. Malformed request input degrades to "no such
/// filter" here; nothing in this type can fail downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationFilter {
    pub ship_ids: Option<Vec<i64>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub port_id: Option<i64>,
    pub order: SortOrder,
}

impl OperationFilter {
    pub fn from_params(params: &FilterParams) -> Self {
        let ship_ids = params.ship_ids.as_deref().and_then(parse_ship_ids);
        let start_date = params.start_date.as_deref().and_then(parse_date);
        let end_date = params.end_date.as_deref().and_then(parse_date);
        let port_id = params
            .port_id
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|id| *id != 0);
        let order = match params.sort_order.as_deref() {
            Some(raw) if raw.trim().eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        };

        Self {
            ship_ids,
            start_date,
            end_date,
            port_id,
            order,
        }
    }
}

/// One bad token drops the whole ship filter, not just that token.
fn parse_ship_ids(raw: &str) -> Option<Vec<i64>> {
    if raw.trim().is_empty() {
        return None;
    }
    let mut ids = Vec::new();
    for token in raw.split(',') {
        match token.trim().parse::<i64>() {
            Ok(id) => ids.push(id),
            Err(_) => return None,
        }
    }
    Some(ids)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

// ============================================================================
// Cost Rollup
// ============================================================================

/// Total cost of one operation: the sum of its line-item costs, 0.0 for an
/// operation with no line items. The single formula behind both the list and
/// the detail views.
pub fn total_cost(items: &[PollutantLine]) -> f64 {
    items.iter().map(|item| item.cost).sum()
}

// ============================================================================
// View types
// ============================================================================

/// Operation row for the list view, with its rolled-up total cost
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub id: i64,
    pub ship: String,
    pub port: String,
    pub contractor: String,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub total_cost: f64,
}

impl From<OperationRecord> for OperationSummary {
    fn from(record: OperationRecord) -> Self {
        Self {
            id: record.id,
            ship: record.ship,
            port: record.port,
            contractor: record.contractor,
            date: record.date,
            has_documents: record.has_documents,
            total_cost: total_cost(&record.pollutants),
        }
    }
}

/// Full operation payload for the detail view
#[derive(Debug, Clone)]
pub struct OperationDetail {
    pub id: i64,
    pub ship: String,
    pub port: String,
    pub contractor: String,
    pub date: NaiveDate,
    pub has_documents: bool,
    pub pollutants: Vec<PollutantLine>,
    pub total_cost: f64,
}

impl From<OperationRecord> for OperationDetail {
    fn from(record: OperationRecord) -> Self {
        let total_cost = total_cost(&record.pollutants);
        Self {
            id: record.id,
            ship: record.ship,
            port: record.port,
            contractor: record.contractor,
            date: record.date,
            has_documents: record.has_documents,
            pollutants: record.pollutants,
            total_cost,
        }
    }
}

// ============================================================================
// Aggregation Engine
// ============================================================================

/// Per-ship statistics over the cutoff-bounded operation set
#[derive(Debug, Clone)]
pub struct ShipSummary {
    pub ship_id: i64,
    pub ship: String,
    pub operation_count: i64,
    pub total_volume: f64,
    pub total_cost: f64,
    pub pollutants: Vec<String>,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

/// Summed volume/cost for one (ship, substance) pair
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub ship: String,
    pub pollutant: String,
    pub volume: f64,
    pub cost: f64,
}

#[derive(Debug, Clone)]
pub struct AnalyticsReport {
    pub cutoff: NaiveDate,
    pub summary: Vec<ShipSummary>,
    pub breakdown: Vec<BreakdownRow>,
}

/// Per-ship summary with outer-join semantics: every ship appears exactly
/// once, ships without matching operations keep count 0 and empty aggregates.
pub fn summarize_ships(ships: &[NamedRef], operations: &[FleetOperation]) -> Vec<ShipSummary> {
    ships
        .iter()
        .map(|ship| {
            let mut operation_count = 0;
            let mut total_volume = 0.0;
            let mut cost_sum = 0.0;
            let mut names = BTreeSet::new();
            let mut first_date: Option<NaiveDate> = None;
            let mut last_date: Option<NaiveDate> = None;

            for op in operations.iter().filter(|op| op.ship_id == ship.id) {
                operation_count += 1;
                for item in &op.pollutants {
                    total_volume += item.volume;
                    cost_sum += item.cost;
                    names.insert(item.name.clone());
                }
                first_date = Some(first_date.map_or(op.date, |d| d.min(op.date)));
                last_date = Some(last_date.map_or(op.date, |d| d.max(op.date)));
            }

            ShipSummary {
                ship_id: ship.id,
                ship: ship.name.clone(),
                operation_count,
                total_volume,
                total_cost: cost_sum,
                pollutants: names.into_iter().collect(),
                first_date,
                last_date,
            }
        })
        .collect()
}

/// Per-ship-per-substance totals over the same operation set. Pairs whose
/// every matching line item carries zero volume and zero cost are omitted;
/// rows come out ordered by ship name, then substance name.
pub fn pollutant_breakdown(operations: &[FleetOperation]) -> Vec<BreakdownRow> {
    let mut cells: BTreeMap<(String, String), (f64, f64)> = BTreeMap::new();

    for op in operations {
        for item in &op.pollutants {
            if item.volume > 0.0 || item.cost > 0.0 {
                let cell = cells
                    .entry((op.ship.clone(), item.name.clone()))
                    .or_insert((0.0, 0.0));
                cell.0 += item.volume;
                cell.1 += item.cost;
            }
        }
    }

    cells
        .into_iter()
        .map(|((ship, pollutant), (volume, cost))| BreakdownRow {
            ship,
            pollutant,
            volume,
            cost,
        })
        .collect()
}

// ============================================================================
// Fleet Service
// ============================================================================

const OPERATION_SELECT: &str = "SELECT record::id(id) AS id, ship.name AS ship, \
    port.name AS port, contractor.name AS contractor, date, has_documents, \
    (SELECT record::id(pollutant) AS pollutant_id, pollutant.name AS name, volume, cost \
     FROM line_item WHERE operation = $parent.id ORDER BY name ASC) AS pollutants \
    FROM operation";

const FLEET_SELECT: &str = "SELECT record::id(id) AS id, record::id(ship) AS ship_id, \
    ship.name AS ship, date, \
    (SELECT record::id(pollutant) AS pollutant_id, pollutant.name AS name, volume, cost \
     FROM line_item WHERE operation = $parent.id ORDER BY name ASC) AS pollutants \
    FROM operation WHERE date <= $cutoff";

/// Store-facing service shared by the HTTP handlers. Holds the explicitly
/// constructed store handle; one logical unit of work per request.
pub struct FleetService {
    db: DbConn,
}

impl FleetService {
    pub fn new(db: DbConn) -> Self {
        Self { db }
    }

    pub async fn ships(&self) -> Result<Vec<NamedRef>> {
        self.lookup("ship").await
    }

    pub async fn ports(&self) -> Result<Vec<NamedRef>> {
        self.lookup("port").await
    }

    pub async fn contractors(&self) -> Result<Vec<NamedRef>> {
        self.lookup("contractor").await
    }

    pub async fn pollutants(&self) -> Result<Vec<NamedRef>> {
        self.lookup("pollutant").await
    }

    async fn lookup(&self, table: &'static str) -> Result<Vec<NamedRef>> {
        let rows: Vec<NamedRef> = self
            .db
            .query("SELECT record::id(id) AS id, name FROM type::table($table) ORDER BY name ASC")
            .bind(("table", table))
            .await?
            .take(0)?;
        Ok(rows)
    }

    /// Filtered, sorted operation list with per-operation rolled-up cost
    pub async fn list_operations(&self, filter: &OperationFilter) -> Result<Vec<OperationSummary>> {
        let mut conditions: Vec<&str> = Vec::new();
        if filter.ship_ids.is_some() {
            conditions.push("record::id(ship) IN $ship_ids");
        }
        if filter.start_date.is_some() {
            conditions.push("date >= $start_date");
        }
        if filter.end_date.is_some() {
            conditions.push("date <= $end_date");
        }
        if filter.port_id.is_some() {
            conditions.push("record::id(port) = $port_id");
        }

        let mut sql = String::from(OPERATION_SELECT);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(match filter.order {
            SortOrder::Asc => " ORDER BY date ASC",
            SortOrder::Desc => " ORDER BY date DESC",
        });

        let mut query = self.db.query(sql);
        if let Some(ids) = &filter.ship_ids {
            query = query.bind(("ship_ids", ids.clone()));
        }
        if let Some(date) = filter.start_date {
            query = query.bind(("start_date", date));
        }
        if let Some(date) = filter.end_date {
            query = query.bind(("end_date", date));
        }
        if let Some(port_id) = filter.port_id {
            query = query.bind(("port_id", port_id));
        }

        let rows: Vec<OperationRecord> = query.await?.take(0)?;
        Ok(rows.into_iter().map(OperationSummary::from).collect())
    }

    pub async fn operation_detail(&self, id: i64) -> Result<Option<OperationDetail>> {
        let row: Option<OperationRecord> = self
            .db
            .query(format!(
                "{} WHERE id = type::thing('operation', $id)",
                OPERATION_SELECT
            ))
            .bind(("id", id))
            .await?
            .take(0)?;
        Ok(row.map(OperationDetail::from))
    }

    /// Persist a new operation and its line items in one transaction.
    /// Returns the new operation id.
    pub async fn create_operation(&self, input: &OperationInput) -> Result<i64> {
        self.ensure_reference_rows(input).await?;
        let id = self.next_operation_id().await?;

        let mut sql = String::from(
            "BEGIN TRANSACTION;\n\
             CREATE type::thing('operation', $id) SET \
             ship = type::thing('ship', $ship_id), \
             port = type::thing('port', $port_id), \
             contractor = type::thing('contractor', $contractor_id), \
             date = $date, \
             has_documents = $has_documents;\n",
        );
        push_line_item_statements(&mut sql, input.items.len());
        sql.push_str("COMMIT TRANSACTION;");

        let query = self.bind_operation(self.db.query(sql), id, input);
        query.await?.check()?;
        Ok(id)
    }

    /// Overwrite an operation's main fields and replace its full line-item
    /// set in one transaction. Returns false when the id is unknown.
    pub async fn update_operation(&self, id: i64, input: &OperationInput) -> Result<bool> {
        if !self.operation_exists(id).await? {
            return Ok(false);
        }
        self.ensure_reference_rows(input).await?;

        let mut sql = String::from(
            "BEGIN TRANSACTION;\n\
             UPDATE type::thing('operation', $id) SET \
             ship = type::thing('ship', $ship_id), \
             port = type::thing('port', $port_id), \
             contractor = type::thing('contractor', $contractor_id), \
             date = $date, \
             has_documents = $has_documents;\n\
             DELETE line_item WHERE operation = type::thing('operation', $id);\n",
        );
        push_line_item_statements(&mut sql, input.items.len());
        sql.push_str("COMMIT TRANSACTION;");

        let query = self.bind_operation(self.db.query(sql), id, input);
        query.await?.check()?;
        Ok(true)
    }

    /// Delete an operation and all its line items in one transaction.
    /// Returns false when the id is unknown.
    pub async fn delete_operation(&self, id: i64) -> Result<bool> {
        if !self.operation_exists(id).await? {
            return Ok(false);
        }

        self.db
            .query(
                "BEGIN TRANSACTION;\n\
                 DELETE line_item WHERE operation = type::thing('operation', $id);\n\
                 DELETE type::thing('operation', $id);\n\
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id))
            .await?
            .check()?;
        Ok(true)
    }

    /// Fleet-wide aggregation as of the cutoff date. Summary and breakdown
    /// are computed from the same fetched operation set, so their totals stay
    /// mutually consistent.
    pub async fn analytics(&self, cutoff: NaiveDate) -> Result<AnalyticsReport> {
        let ships = self.ships().await?;
        let operations: Vec<FleetOperation> = self
            .db
            .query(FLEET_SELECT)
            .bind(("cutoff", cutoff))
            .await?
            .take(0)?;

        let summary = summarize_ships(&ships, &operations);
        let breakdown = pollutant_breakdown(&operations);

        Ok(AnalyticsReport {
            cutoff,
            summary,
            breakdown,
        })
    }

    async fn operation_exists(&self, id: i64) -> Result<bool> {
        let row: Option<i64> = self
            .db
            .query("SELECT VALUE record::id(id) FROM type::thing('operation', $id)")
            .bind(("id", id))
            .await?
            .take(0)?;
        Ok(row.is_some())
    }

    async fn next_operation_id(&self) -> Result<i64> {
        let max_id: Option<i64> = self
            .db
            .query("SELECT VALUE math::max(record::id(id)) FROM operation GROUP ALL")
            .await?
            .take(0)?;
        Ok(max_id.unwrap_or(0) + 1)
    }

    /// Probe every referenced lookup row before opening the write
    /// transaction; a missing reference fails the whole write.
    async fn ensure_reference_rows(&self, input: &OperationInput) -> Result<()> {
        self.ensure_reference_row("ship", input.ship_id).await?;
        self.ensure_reference_row("port", input.port_id).await?;
        self.ensure_reference_row("contractor", input.contractor_id)
            .await?;
        for item in &input.items {
            self.ensure_reference_row("pollutant", item.pollutant_id)
                .await?;
        }
        Ok(())
    }

    async fn ensure_reference_row(&self, table: &'static str, id: i64) -> Result<()> {
        let row: Option<i64> = self
            .db
            .query("SELECT VALUE record::id(id) FROM type::thing($table, $id)")
            .bind(("table", table))
            .bind(("id", id))
            .await?
            .take(0)?;
        if row.is_none() {
            anyhow::bail!("unknown {} id {}", table, id);
        }
        Ok(())
    }

    fn bind_operation<'a>(
        &self,
        query: surrealdb::method::Query<'a, surrealdb::engine::local::Db>,
        id: i64,
        input: &OperationInput,
    ) -> surrealdb::method::Query<'a, surrealdb::engine::local::Db> {
        let mut query = query
            .bind(("id", id))
            .bind(("ship_id", input.ship_id))
            .bind(("port_id", input.port_id))
            .bind(("contractor_id", input.contractor_id))
            .bind(("date", input.date))
            .bind(("has_documents", input.has_documents));
        for (i, item) in input.items.iter().enumerate() {
            query = query
                .bind((format!("pollutant_{}", i), item.pollutant_id))
                .bind((format!("volume_{}", i), item.volume))
                .bind((format!("cost_{}", i), item.cost));
        }
        query
    }
}

fn push_line_item_statements(sql: &mut String, count: usize) {
    for i in 0..count {
        sql.push_str(&format!(
            "CREATE line_item SET operation = type::thing('operation', $id), \
             pollutant = type::thing('pollutant', $pollutant_{i}), \
             volume = $volume_{i}, cost = $cost_{i};\n"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(
        ship_ids: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        port_id: Option<&str>,
        sort_order: Option<&str>,
    ) -> FilterParams {
        FilterParams {
            ship_ids: ship_ids.map(String::from),
            start_date: start_date.map(String::from),
            end_date: end_date.map(String::from),
            port_id: port_id.map(String::from),
            sort_order: sort_order.map(String::from),
        }
    }

    fn line(name: &str, volume: f64, cost: f64) -> PollutantLine {
        PollutantLine {
            pollutant_id: 0,
            name: name.to_string(),
            volume,
            cost,
        }
    }

    fn op(ship_id: i64, ship: &str, date: &str, pollutants: Vec<PollutantLine>) -> FleetOperation {
        FleetOperation {
            id: 0,
            ship_id,
            ship: ship.to_string(),
            date: date.parse().unwrap(),
            pollutants,
        }
    }

    fn ship(id: i64, name: &str) -> NamedRef {
        NamedRef {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_ship_filter_parses_clean_list() {
        let filter = OperationFilter::from_params(&params(Some(" 1, 2,3 "), None, None, None, None));
        assert_eq!(filter.ship_ids, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_malformed_ship_token_drops_whole_filter() {
        let filter = OperationFilter::from_params(&params(Some("1,x,3"), None, None, None, None));
        assert_eq!(filter.ship_ids, None);

        let empty = OperationFilter::from_params(&params(Some(""), None, None, None, None));
        assert_eq!(empty.ship_ids, None);
    }

    #[test]
    fn test_date_bounds_parse_independently() {
        let filter =
            OperationFilter::from_params(&params(None, Some("bad"), Some("2025-01-01"), None, None));
        assert_eq!(filter.start_date, None);
        assert_eq!(
            filter.end_date,
            Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_port_filter_requires_nonzero_id() {
        let zero = OperationFilter::from_params(&params(None, None, None, Some("0"), None));
        assert_eq!(zero.port_id, None);

        let junk = OperationFilter::from_params(&params(None, None, None, Some("harbor"), None));
        assert_eq!(junk.port_id, None);

        let valid = OperationFilter::from_params(&params(None, None, None, Some("2"), None));
        assert_eq!(valid.port_id, Some(2));
    }

    #[test]
    fn test_sort_order_defaults_to_descending() {
        let asc = OperationFilter::from_params(&params(None, None, None, None, Some("ASC")));
        assert_eq!(asc.order, SortOrder::Asc);

        let desc = OperationFilter::from_params(&params(None, None, None, None, Some("newest")));
        assert_eq!(desc.order, SortOrder::Desc);

        let none = OperationFilter::from_params(&FilterParams::default());
        assert_eq!(none.order, SortOrder::Desc);
    }

    #[test]
    fn test_total_cost_of_empty_operation_is_zero() {
        assert_eq!(total_cost(&[]), 0.0);
    }

    #[test]
    fn test_total_cost_sums_line_items() {
        let items = vec![line("Fresh water", 40.0, 800.0), line("Sludge", 2.0, 150.5)];
        assert_eq!(total_cost(&items), 950.5);
    }

    #[test]
    fn test_summary_includes_every_ship_once() {
        let ships = vec![ship(1, "MV Ladoga"), ship(2, "MV Neva"), ship(3, "MV Onega")];
        let ops = vec![op(2, "MV Neva", "2025-03-10", vec![line("Sewage", 5.0, 90.0)])];

        let summary = summarize_ships(&ships, &ops);
        assert_eq!(summary.len(), 3);

        let idle = &summary[0];
        assert_eq!(idle.operation_count, 0);
        assert_eq!(idle.total_volume, 0.0);
        assert_eq!(idle.total_cost, 0.0);
        assert!(idle.pollutants.is_empty());
        assert_eq!(idle.first_date, None);
        assert_eq!(idle.last_date, None);

        let active = &summary[1];
        assert_eq!(active.operation_count, 1);
        assert_eq!(active.total_volume, 5.0);
        assert_eq!(active.total_cost, 90.0);
    }

    #[test]
    fn test_summary_dates_and_distinct_pollutants() {
        let ships = vec![ship(1, "MV Neva")];
        let ops = vec![
            op(
                1,
                "MV Neva",
                "2025-05-01",
                vec![line("Sewage", 5.0, 90.0), line("Garbage", 1.0, 40.0)],
            ),
            op(1, "MV Neva", "2025-02-14", vec![line("Sewage", 3.0, 60.0)]),
        ];

        let summary = summarize_ships(&ships, &ops);
        let s = &summary[0];
        assert_eq!(s.operation_count, 2);
        assert_eq!(s.pollutants, vec!["Garbage".to_string(), "Sewage".to_string()]);
        assert_eq!(s.first_date, Some(NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()));
        assert_eq!(s.last_date, Some(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()));
    }

    #[test]
    fn test_breakdown_omits_zero_valued_pairs() {
        let ops = vec![op(
            1,
            "MV Neva",
            "2025-03-10",
            vec![line("Sewage", 5.0, 90.0), line("Sludge", 0.0, 0.0)],
        )];

        let breakdown = pollutant_breakdown(&ops);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].pollutant, "Sewage");
    }

    #[test]
    fn test_breakdown_ordered_by_ship_then_substance() {
        let ops = vec![
            op(2, "MV Onega", "2025-03-10", vec![line("Garbage", 1.0, 40.0)]),
            op(
                1,
                "MV Neva",
                "2025-03-11",
                vec![line("Sludge", 2.0, 150.0), line("Fresh water", 40.0, 800.0)],
            ),
        ];

        let breakdown = pollutant_breakdown(&ops);
        let keys: Vec<(&str, &str)> = breakdown
            .iter()
            .map(|row| (row.ship.as_str(), row.pollutant.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("MV Neva", "Fresh water"),
                ("MV Neva", "Sludge"),
                ("MV Onega", "Garbage"),
            ]
        );
    }

    #[test]
    fn test_breakdown_accumulates_across_operations() {
        let ops = vec![
            op(1, "MV Neva", "2025-03-10", vec![line("Sewage", 5.0, 90.0)]),
            op(1, "MV Neva", "2025-04-02", vec![line("Sewage", 7.0, 110.0)]),
        ];

        let breakdown = pollutant_breakdown(&ops);
        assert_eq!(breakdown.len(), 1);
        assert_eq!(breakdown[0].volume, 12.0);
        assert_eq!(breakdown[0].cost, 200.0);
    }

    #[test]
    fn test_breakdown_cost_matches_summary_total() {
        let ships = vec![ship(1, "MV Neva"), ship(2, "MV Onega")];
        let ops = vec![
            op(
                1,
                "MV Neva",
                "2025-03-10",
                vec![line("Sewage", 5.0, 90.0), line("Fresh water", 40.0, 800.0)],
            ),
            op(1, "MV Neva", "2025-04-02", vec![line("Sewage", 7.0, 110.0)]),
            op(2, "MV Onega", "2025-04-05", vec![line("Garbage", 1.0, 40.0)]),
        ];

        let summary = summarize_ships(&ships, &ops);
        let breakdown = pollutant_breakdown(&ops);

        for s in &summary {
            let breakdown_cost: f64 = breakdown
                .iter()
                .filter(|row| row.ship == s.ship)
                .map(|row| row.cost)
                .sum();
            assert_eq!(breakdown_cost, s.total_cost);
        }
    }
}
