use crate::error::Result;
use crate::pool::CatalogPool;

/// DDL for the catalog's own tables (spec §3). Idempotent: run on every
/// worker boot.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bunny_peers (
    name        TEXT PRIMARY KEY,
    host        TEXT NOT NULL,
    port        INTEGER NOT NULL,
    "user"      TEXT NOT NULL,
    password    TEXT NOT NULL,
    database    TEXT NOT NULL,
    ssl_mode    TEXT NOT NULL DEFAULT 'prefer'
);

CREATE TABLE IF NOT EXISTS bunny_mirrors (
    name                  TEXT PRIMARY KEY,
    source_peer           TEXT NOT NULL REFERENCES bunny_peers(name),
    destination_peer      TEXT NOT NULL REFERENCES bunny_peers(name),
    status                TEXT NOT NULL,
    slot_name             TEXT NOT NULL,
    publication_name      TEXT NOT NULL,
    last_applied_lsn      BIGINT NOT NULL DEFAULT 0,
    last_sync_batch_id    BIGINT NOT NULL DEFAULT 0,
    last_error            TEXT,
    error_count           INTEGER NOT NULL DEFAULT 0,
    do_initial_snapshot   BOOLEAN NOT NULL DEFAULT TRUE,
    created_at            TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at            TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS bunny_table_mappings (
    mirror                TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    source_schema         TEXT NOT NULL,
    source_table          TEXT NOT NULL,
    destination_schema    TEXT NOT NULL,
    destination_table     TEXT NOT NULL,
    partition_column      TEXT,
    partition_kind        TEXT,
    excluded_columns      TEXT[] NOT NULL DEFAULT '{}',
    PRIMARY KEY (mirror, source_schema, source_table)
);

CREATE TABLE IF NOT EXISTS bunny_table_sync_status (
    mirror                      TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    destination_table           TEXT NOT NULL,
    status                      TEXT NOT NULL,
    rows_synced                 BIGINT NOT NULL DEFAULT 0,
    last_synced_at              TIMESTAMPTZ,
    last_resync_requested_at    TIMESTAMPTZ,
    last_error                  TEXT,
    PRIMARY KEY (mirror, destination_table)
);

CREATE TABLE IF NOT EXISTS bunny_index_definitions (
    mirror                TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    destination_table     TEXT NOT NULL,
    index_name            TEXT NOT NULL,
    method                TEXT NOT NULL,
    is_unique             BOOLEAN NOT NULL,
    is_primary            BOOLEAN NOT NULL,
    definition            TEXT NOT NULL,
    replicated            BOOLEAN NOT NULL DEFAULT FALSE,
    PRIMARY KEY (mirror, destination_table, index_name)
);

CREATE TABLE IF NOT EXISTS bunny_foreign_keys (
    mirror                TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    constraint_name       TEXT NOT NULL,
    source_table          TEXT NOT NULL,
    target_table          TEXT NOT NULL,
    definition            TEXT NOT NULL,
    on_delete             TEXT NOT NULL,
    on_update             TEXT NOT NULL,
    dropped_at            TIMESTAMPTZ,
    recreated_at          TIMESTAMPTZ,
    PRIMARY KEY (mirror, constraint_name)
);

CREATE TABLE IF NOT EXISTS bunny_cdc_batches (
    mirror        TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    batch_id      BIGINT NOT NULL,
    row_count     BIGINT NOT NULL,
    start_lsn     BIGINT NOT NULL,
    end_lsn       BIGINT NOT NULL,
    start_time    TIMESTAMPTZ NOT NULL,
    end_time      TIMESTAMPTZ NOT NULL,
    PRIMARY KEY (mirror, batch_id)
);

CREATE TABLE IF NOT EXISTS bunny_schema_deltas (
    id                    BIGSERIAL PRIMARY KEY,
    mirror                TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    destination_table     TEXT NOT NULL,
    kind                  TEXT NOT NULL,
    payload               TEXT NOT NULL,
    applied_at            TIMESTAMPTZ
);

CREATE TABLE IF NOT EXISTS bunny_operator_events (
    id            BIGSERIAL PRIMARY KEY,
    mirror        TEXT NOT NULL REFERENCES bunny_mirrors(name) ON DELETE CASCADE,
    level         TEXT NOT NULL,
    category      TEXT NOT NULL,
    message       TEXT NOT NULL,
    batch_id      BIGINT,
    lsn           BIGINT,
    recorded_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS bunny_operator_events_mirror_idx
    ON bunny_operator_events (mirror, recorded_at DESC);
"#;

/// Creates every catalog table if it does not already exist. Safe to call on
/// every process start; `CREATE TABLE IF NOT EXISTS` makes it idempotent.
pub async fn ensure_schema(pool: &CatalogPool) -> Result<()> {
    let client = pool.client().await?;
    client.batch_execute(SCHEMA_SQL).await?;
    Ok(())
}
