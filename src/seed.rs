//! Seed-on-empty bootstrap for the lookup tables
//!
//! Run explicitly before serving traffic; every table is filled only when it
//! has no rows yet, so repeated startups leave existing data untouched.

use anyhow::Result;
use tracing::info;

use crate::db::DbConn;

const SHIPS: [&str; 12] = [
    "MV Neva",
    "MV Ladoga",
    "MV Onega",
    "MV Svir",
    "MV Volkhov",
    "MV Vuoksa",
    "MV Okhta",
    "MV Izhora",
    "MV Tosna",
    "MV Mga",
    "MV Oredezh",
    "MV Luga",
];

const PORTS: [&str; 3] = ["Port of Hamburg", "Port of Rotterdam", "Port of Antwerp"];

const CONTRACTORS: [&str; 3] = [
    "HarborClean GmbH",
    "Baltic Marine Services",
    "EcoPort Solutions",
];

const POLLUTANTS: [&str; 4] = ["Fresh water", "Sewage", "Sludge", "Garbage"];

/// Populate the four lookup tables with the fixed fleet inventory if they are
/// still empty.
pub async fn seed_reference_data(db: &DbConn) -> Result<()> {
    seed_table(db, "ship", &SHIPS).await?;
    seed_table(db, "port", &PORTS).await?;
    seed_table(db, "contractor", &CONTRACTORS).await?;
    seed_table(db, "pollutant", &POLLUTANTS).await?;
    Ok(())
}

async fn seed_table(db: &DbConn, table: &'static str, names: &[&'static str]) -> Result<()> {
    let count: Option<i64> = db
        .query("SELECT count() FROM type::table($table) GROUP ALL")
        .bind(("table", table))
        .await?
        .take("count")?;
    if count.unwrap_or(0) > 0 {
        return Ok(());
    }

    info!("Seeding {} {} rows", names.len(), table);
    for (i, name) in names.iter().enumerate() {
        db.query("CREATE type::thing($table, $id) SET name = $name")
            .bind(("table", table))
            .bind(("id", (i + 1) as i64))
            .bind(("name", *name))
            .await?
            .check()?;
    }
    Ok(())
}
