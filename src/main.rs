use anyhow::Result;
use fleet_servicing::db;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .init();

    let db_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "data/fleet.db".to_string());
    let db = db::connect(&db_path).await?;

    info!("Connected to SurrealDB");

    info!("=== Database Statistics ===");

    for table in ["ship", "port", "contractor", "pollutant", "operation", "line_item"] {
        let total: Option<i64> = db
            .query("SELECT count() FROM type::table($table) GROUP ALL")
            .bind(("table", table))
            .await?
            .take("count")?;
        info!("  {}: {:?}", table, total);
    }

    // Operations per ship
    let by_ship: Vec<serde_json::Value> = db
        .query("SELECT ship.name AS ship, count() AS cnt FROM operation GROUP BY ship ORDER BY cnt DESC")
        .await?
        .take(0)?;
    info!("Operations by ship: {:?}", by_ship);

    // Operations per port
    let by_port: Vec<serde_json::Value> = db
        .query("SELECT port.name AS port, count() AS cnt FROM operation GROUP BY port ORDER BY cnt DESC")
        .await?
        .take(0)?;
    info!("Operations by port: {:?}", by_port);

    // Cost per substance across the whole store
    let by_pollutant: Vec<serde_json::Value> = db
        .query(
            r#"
            SELECT
                pollutant.name AS pollutant,
                math::sum(volume) AS total_volume,
                math::sum(cost) AS total_cost
            FROM line_item
            GROUP BY pollutant
            "#,
        )
        .await?
        .take(0)?;
    info!("Totals by substance: {:?}", by_pollutant);

    Ok(())
}
