//! SQLite property handlers

use anyhow::{anyhow, Result};
use rusqlite::types::Value;

use super::{quote_ident, SharedConn};
use crate::entitydef::{EntityDef, PropertyDef, PropertyType};
use crate::router::{
    ColumnDef, DbId, PropertyHandler, PropertyUid, RecordBuilder, RecordStream, StreamError,
};

/// Declared SQLite type of a property column
pub fn sql_type(kind: PropertyType) -> &'static str {
    match kind {
        PropertyType::Int8
        | PropertyType::Uint8
        | PropertyType::Int16
        | PropertyType::Uint16
        | PropertyType::Int32
        | PropertyType::Uint32
        | PropertyType::Int64
        | PropertyType::Uint64
        | PropertyType::Bool => "INTEGER",
        PropertyType::Float | PropertyType::Double => "REAL",
        PropertyType::String => "TEXT",
        PropertyType::Blob => "BLOB",
    }
}

/// Column clause used by CREATE TABLE and ADD COLUMN
pub fn column_clause(column: &ColumnDef) -> Result<String> {
    let default = match sql_type(column.kind) {
        "INTEGER" => "0",
        "REAL" => "0.0",
        "TEXT" => "''",
        _ => "x''",
    };
    Ok(format!(
        "{} {} NOT NULL DEFAULT {}",
        quote_ident(&column.name)?,
        sql_type(column.kind),
        default
    ))
}

/// Decode one value of `kind` off the stream
///
/// Consumes exactly the bytes of that value.
pub fn decode_value(kind: PropertyType, stream: &mut RecordStream<'_>) -> Result<Value, StreamError> {
    let value = match kind {
        PropertyType::Int8 => Value::Integer(stream.read_i8()? as i64),
        PropertyType::Uint8 => Value::Integer(stream.read_u8()? as i64),
        PropertyType::Int16 => Value::Integer(stream.read_i16()? as i64),
        PropertyType::Uint16 => Value::Integer(stream.read_u16()? as i64),
        PropertyType::Int32 => Value::Integer(stream.read_i32()? as i64),
        PropertyType::Uint32 => Value::Integer(stream.read_u32()? as i64),
        PropertyType::Int64 => Value::Integer(stream.read_i64()?),
        // stored bit-for-bit; SQLite integers are signed
        PropertyType::Uint64 => Value::Integer(stream.read_u64()? as i64),
        PropertyType::Float => Value::Real(stream.read_f32()? as f64),
        PropertyType::Double => Value::Real(stream.read_f64()?),
        PropertyType::Bool => Value::Integer((stream.read_u8()? != 0) as i64),
        PropertyType::String => Value::Text(stream.read_string()?.to_string()),
        PropertyType::Blob => Value::Blob(stream.read_blob()?.to_vec()),
    };
    Ok(value)
}

/// Encode a textual value as `kind` onto the builder
///
/// Inverse of [`decode_value`] for command-line input. Booleans accept
/// `true`/`false`/`1`/`0`; blobs are hex strings.
pub fn encode_text_value(kind: PropertyType, text: &str, builder: &mut RecordBuilder) -> Result<()> {
    let invalid = || anyhow!("Invalid {} value '{}'", kind, text);
    match kind {
        PropertyType::Int8 => builder.put_i8(text.parse().map_err(|_| invalid())?),
        PropertyType::Uint8 => builder.put_u8(text.parse().map_err(|_| invalid())?),
        PropertyType::Int16 => builder.put_i16(text.parse().map_err(|_| invalid())?),
        PropertyType::Uint16 => builder.put_u16(text.parse().map_err(|_| invalid())?),
        PropertyType::Int32 => builder.put_i32(text.parse().map_err(|_| invalid())?),
        PropertyType::Uint32 => builder.put_u32(text.parse().map_err(|_| invalid())?),
        PropertyType::Int64 => builder.put_i64(text.parse().map_err(|_| invalid())?),
        PropertyType::Uint64 => builder.put_u64(text.parse().map_err(|_| invalid())?),
        PropertyType::Float => builder.put_f32(text.parse().map_err(|_| invalid())?),
        PropertyType::Double => builder.put_f64(text.parse().map_err(|_| invalid())?),
        PropertyType::Bool => match text {
            "true" | "1" => builder.put_u8(1),
            "false" | "0" => builder.put_u8(0),
            _ => return Err(invalid()),
        },
        PropertyType::String => builder.put_string(text),
        PropertyType::Blob => {
            if text.len() % 2 != 0 {
                return Err(invalid());
            }
            let bytes = (0..text.len())
                .step_by(2)
                .map(|i| {
                    text.get(i..i + 2)
                        .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                        .ok_or_else(invalid)
                })
                .collect::<Result<Vec<u8>>>()?;
            builder.put_blob(&bytes)
        }
    };
    Ok(())
}

/// Persists one property into its `sm_<name>` column
pub struct SqlitePropertyHandler {
    uid: PropertyUid,
    name: String,
    kind: PropertyType,
    column: ColumnDef,
    upsert_sql: String,
    conn: SharedConn,
}

impl SqlitePropertyHandler {
    pub fn new(table: &str, property: &PropertyDef, conn: SharedConn) -> Result<Self> {
        let column = ColumnDef::for_property(&property.name, property.kind);
        let table_ident = quote_ident(table)?;
        let column_ident = quote_ident(&column.name)?;
        let upsert_sql = format!(
            "INSERT INTO {t} (id, {c}) VALUES (?1, ?2) ON CONFLICT(id) DO UPDATE SET {c} = excluded.{c}",
            t = table_ident,
            c = column_ident
        );

        Ok(Self {
            uid: property.uid,
            name: property.name.clone(),
            kind: property.kind,
            column,
            upsert_sql,
            conn,
        })
    }
}

impl PropertyHandler for SqlitePropertyHandler {
    fn uid(&self) -> PropertyUid {
        self.uid
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn column(&self) -> ColumnDef {
        self.column.clone()
    }

    fn update(&self, entity_id: DbId, stream: &mut RecordStream<'_>, _def: &EntityDef) -> Result<()> {
        let value = decode_value(self.kind, stream)?;
        let id = i64::try_from(entity_id)
            .map_err(|_| anyhow!("Entity id {} exceeds the SQLite integer range", entity_id))?;

        let db = self
            .conn
            .lock()
            .map_err(|_| anyhow!("Database connection lock poisoned"))?;
        let mut stmt = db
            .conn
            .prepare_cached(&self.upsert_sql)
            .map_err(|e| anyhow!("Failed to prepare statement: {}", e))?;
        stmt.execute(rusqlite::params![id, value])
            .map_err(|e| anyhow!("Failed to write column '{}': {}", self.column.name, e))?;
        Ok(())
    }
}
