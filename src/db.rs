use anyhow::Result;
use surrealdb::engine::local::{Db, Mem, RocksDb};
use surrealdb::Surreal;

pub type DbConn = Surreal<Db>;

/// Initialize database connection with RocksDB backend
pub async fn connect(path: &str) -> Result<DbConn> {
    let db = Surreal::new::<RocksDb>(path).await?;
    db.use_ns("fleet").use_db("portcalls").await?;
    Ok(db)
}

/// Initialize an in-memory database (integration tests, throwaway tooling)
pub async fn connect_memory() -> Result<DbConn> {
    let db = Surreal::new::<Mem>(()).await?;
    db.use_ns("fleet").use_db("portcalls").await?;
    Ok(db)
}

/// Initialize database schema
pub async fn init_schema(db: &DbConn) -> Result<()> {
    // Calendar dates are stored as ISO YYYY-MM-DD strings; lexicographic
    // comparison matches date order.
    db.query(
        r#"
        -- Lookup tables
        DEFINE TABLE ship SCHEMAFULL;
        DEFINE FIELD name ON ship TYPE string;
        DEFINE INDEX idx_ship_name ON ship FIELDS name UNIQUE;

        DEFINE TABLE port SCHEMAFULL;
        DEFINE FIELD name ON port TYPE string;
        DEFINE INDEX idx_port_name ON port FIELDS name UNIQUE;

        DEFINE TABLE contractor SCHEMAFULL;
        DEFINE FIELD name ON contractor TYPE string;
        DEFINE INDEX idx_contractor_name ON contractor FIELDS name UNIQUE;

        DEFINE TABLE pollutant SCHEMAFULL;
        DEFINE FIELD name ON pollutant TYPE string;
        DEFINE INDEX idx_pollutant_name ON pollutant FIELDS name UNIQUE;

        -- One port-call servicing event
        DEFINE TABLE operation SCHEMAFULL;
        DEFINE FIELD ship ON operation TYPE record<ship>;
        DEFINE FIELD port ON operation TYPE record<port>;
        DEFINE FIELD contractor ON operation TYPE record<contractor>;
        DEFINE FIELD date ON operation TYPE string;
        DEFINE FIELD has_documents ON operation TYPE bool DEFAULT false;
        DEFINE INDEX idx_operation_date ON operation FIELDS date;

        -- Per-substance volume/cost rows owned by an operation
        DEFINE TABLE line_item SCHEMAFULL;
        DEFINE FIELD operation ON line_item TYPE record<operation>;
        DEFINE FIELD pollutant ON line_item TYPE record<pollutant>;
        DEFINE FIELD volume ON line_item TYPE float DEFAULT 0.0;
        DEFINE FIELD cost ON line_item TYPE float DEFAULT 0.0;
        DEFINE INDEX idx_line_item_operation ON line_item FIELDS operation;
        "#,
    )
    .await?;

    Ok(())
}
