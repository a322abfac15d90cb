use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, Row};
use tracing::{debug, info, warn};

/// One row of the Anki `notes` table. `fields` is still packed with `\x1f`.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: i64,
    pub model_id: i64,
    pub fields: String,
    pub tags: String,
}

/// Ordered field names of one note type. `None` marks an entry whose name
/// could not be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    pub names: Vec<Option<String>>,
}

/// A note row that could not be decoded.
#[derive(Debug, Clone)]
pub struct FailedRow {
    pub note_id: Option<i64>,
    pub reason: String,
}

pub struct NoteRows {
    pub notes: Vec<Note>,
    pub failed: Vec<FailedRow>,
}

/// Open an Anki collection read-only. The connection closes on drop.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open collection {:?}", path))?;
    Ok(conn)
}

pub fn fetch_all_notes(conn: &Connection) -> Result<NoteRows> {
    let mut stmt = conn
        .prepare("SELECT id, mid, flds, tags FROM notes ORDER BY id")
        .context("Collection has no readable notes table")?;
    let mut rows = stmt.query([])?;

    let mut notes = Vec::new();
    let mut failed = Vec::new();
    while let Some(row) = rows.next()? {
        match note_from_row(row) {
            Ok(note) => notes.push(note),
            Err(e) => {
                let note_id = row.get::<_, i64>(0).ok();
                warn!(?note_id, error = %e, "Skipping unreadable note row");
                failed.push(FailedRow {
                    note_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    info!("Loaded {} notes ({} unreadable)", notes.len(), failed.len());
    Ok(NoteRows { notes, failed })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        model_id: row.get(1)?,
        fields: row.get(2)?,
        tags: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
    })
}

/// Field schemas keyed by model id. Newer collections keep them in the
/// `fields` table, older ones as JSON in `col.models`.
pub fn fetch_field_schemas(conn: &Connection) -> Result<HashMap<i64, FieldSchema>> {
    if table_exists(conn, "fields")? {
        let schemas = schemas_from_fields_table(conn)?;
        if !schemas.is_empty() {
            debug!("Read {} note types from fields table", schemas.len());
            return Ok(schemas);
        }
    }

    if !table_exists(conn, "col")? {
        return Ok(HashMap::new());
    }
    let models: Option<String> = conn
        .query_row("SELECT models FROM col LIMIT 1", [], |row| row.get(0))
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    match models.as_deref().map(str::trim) {
        Some(json) if !json.is_empty() => Ok(schemas_from_models_json(json)),
        _ => Ok(HashMap::new()),
    }
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(n > 0)
}

fn schemas_from_fields_table(conn: &Connection) -> Result<HashMap<i64, FieldSchema>> {
    let mut stmt = conn.prepare("SELECT ntid, ord, name FROM fields ORDER BY ntid, ord")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2).ok().flatten(),
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut schemas: HashMap<i64, FieldSchema> = HashMap::new();
    for (ntid, ord, name) in rows {
        let Ok(ord) = usize::try_from(ord) else {
            warn!(ntid, ord, "Ignoring field with negative ordinal");
            continue;
        };
        place(schemas.entry(ntid).or_default(), ord, name);
    }
    Ok(schemas)
}

/// Parse the legacy `col.models` JSON: `{"<mid>": {"flds": [{"name", "ord"}]}}`.
pub fn schemas_from_models_json(json: &str) -> HashMap<i64, FieldSchema> {
    let root: serde_json::Value = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Could not parse col.models: {}", e);
            return HashMap::new();
        }
    };
    let Some(models) = root.as_object() else {
        warn!("col.models is not a JSON object");
        return HashMap::new();
    };

    let mut schemas = HashMap::new();
    for (key, model) in models {
        let model_id = model
            .get("id")
            .and_then(|v| v.as_i64())
            .or_else(|| key.parse().ok());
        let Some(model_id) = model_id else {
            warn!(key = %key, "Skipping model without a numeric id");
            continue;
        };
        let Some(flds) = model.get("flds").and_then(|f| f.as_array()) else {
            continue;
        };

        let mut schema = FieldSchema::default();
        for (pos, fld) in flds.iter().enumerate() {
            let ord = fld
                .get("ord")
                .and_then(|o| o.as_u64())
                .map(|o| o as usize)
                .unwrap_or(pos);
            let name = fld.get("name").and_then(|n| n.as_str()).map(str::to_string);
            place(&mut schema, ord, name);
        }
        schemas.insert(model_id, schema);
    }
    schemas
}

fn place(schema: &mut FieldSchema, ord: usize, name: Option<String>) {
    if schema.names.len() <= ord {
        schema.names.resize(ord + 1, None);
    }
    schema.names[ord] = name.filter(|n| !n.trim().is_empty());
}
