//! Stateful decoding of a `pgoutput` message stream into row-level change
//! events, resolving relation and type metadata as it is announced.

use crate::error::{ConnectorError, Result};
use crate::postgres::{PgConnector, coercion};
use crate::replication::pgoutput::{Message, Relation, Tuple, TupleValue};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use model::core::{data_type::DataType, value::Value};
use model::lsn::Lsn;
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

/// A fully decoded row, keyed by column name. Columns whose pgoutput tuple
/// entry was `Unchanged` (an un-updated TOASTed value) are omitted rather
/// than guessed at; callers treat a missing key as "leave destination value
/// as-is" for that column.
pub type DecodedRow = HashMap<String, Value>;

#[derive(Clone, Debug)]
pub enum ChangeEvent {
    Begin {
        xid: i32,
        final_lsn: Lsn,
        commit_ts: DateTime<Utc>,
    },
    Relation {
        relation_id: i32,
        schema: String,
        table: String,
    },
    Insert {
        relation_id: i32,
        schema: String,
        table: String,
        new: DecodedRow,
    },
    Update {
        relation_id: i32,
        schema: String,
        table: String,
        old: Option<DecodedRow>,
        new: DecodedRow,
    },
    Delete {
        relation_id: i32,
        schema: String,
        table: String,
        old: DecodedRow,
    },
    Truncate {
        tables: Vec<(String, String)>,
    },
    Commit {
        commit_lsn: Lsn,
        end_lsn: Lsn,
        commit_ts: DateTime<Utc>,
    },
}

/// Resolves Postgres type OIDs to `DataType`, trusting a small built-in table
/// for the common scalar types and falling back to a `pg_type` lookup
/// (cached for the lifetime of the stream) for enums, domains, composites
/// and array types.
struct TypeOidCache {
    connector: PgConnector,
    cache: HashMap<i32, DataType>,
}

impl TypeOidCache {
    fn new(connector: PgConnector) -> Self {
        Self {
            connector,
            cache: HashMap::new(),
        }
    }

    async fn resolve(&mut self, oid: i32) -> Result<DataType> {
        if let Some(dt) = builtin_data_type(oid) {
            return Ok(dt);
        }
        if let Some(dt) = self.cache.get(&oid) {
            return Ok(dt.clone());
        }

        let rows = self
            .connector
            .query(&format!("SELECT typname FROM pg_type WHERE oid = {oid}"), Vec::new())
            .await?;
        let data_type = match rows.first().and_then(|row| row.get("typname")) {
            Some(Value::String(name)) => {
                DataType::from_postgres_type(name).unwrap_or_else(|_| DataType::Custom(name.clone()))
            }
            _ => DataType::Custom(format!("oid:{oid}")),
        };
        self.cache.insert(oid, data_type.clone());
        Ok(data_type)
    }
}

fn builtin_data_type(oid: i32) -> Option<DataType> {
    use DataType::*;
    Some(match oid {
        16 => Boolean,
        17 => Bytea,
        18 | 19 | 25 | 142 => String,
        20 => Long,
        21 => Short,
        23 => Int,
        114 | 3802 => Json,
        700 => Float,
        701 => Double,
        1043 => VarChar,
        1082 => Date,
        1114 | 1184 => Timestamp,
        1700 => Decimal,
        2950 => Custom("uuid".to_string()),
        1000 => Array(Some("BOOL[]".to_string())),
        1001 => Array(Some("BYTEA[]".to_string())),
        1007 => Array(Some("INT4[]".to_string())),
        1009 => Array(Some("TEXT[]".to_string())),
        1015 => Array(Some("VARCHAR[]".to_string())),
        1016 => Array(Some("INT8[]".to_string())),
        1022 => Array(Some("FLOAT8[]".to_string())),
        1182 => Array(Some("DATE[]".to_string())),
        1115 => Array(Some("TIMESTAMP[]".to_string())),
        1231 => Array(Some("NUMERIC[]".to_string())),
        2951 => Array(Some("UUID[]".to_string())),
        3807 => Array(Some("JSONB[]".to_string())),
        _ => return None,
    })
}

pub struct Decoder {
    relations: HashMap<i32, Relation>,
    types: TypeOidCache,
}

impl Decoder {
    pub fn new(connector: PgConnector) -> Self {
        Self {
            relations: HashMap::new(),
            types: TypeOidCache::new(connector),
        }
    }

    pub async fn decode(&mut self, message: Message) -> Result<Option<ChangeEvent>> {
        match message {
            Message::Begin { final_lsn, commit_ts, xid } => {
                Ok(Some(ChangeEvent::Begin { xid, final_lsn, commit_ts }))
            }
            Message::Commit { commit_lsn, end_lsn, commit_ts, .. } => {
                Ok(Some(ChangeEvent::Commit { commit_lsn, end_lsn, commit_ts }))
            }
            Message::Origin { .. } | Message::Type { .. } => Ok(None),
            Message::Relation(relation) => {
                let (relation_id, schema, table) =
                    (relation.relation_id, relation.namespace.clone(), relation.name.clone());
                self.relations.insert(relation_id, relation);
                Ok(Some(ChangeEvent::Relation { relation_id, schema, table }))
            }
            Message::Insert { relation_id, tuple } => {
                let relation = self.relation(relation_id)?.clone();
                let new = self.decode_tuple(&relation, tuple).await?;
                Ok(Some(ChangeEvent::Insert {
                    relation_id,
                    schema: relation.namespace,
                    table: relation.name,
                    new,
                }))
            }
            Message::Update { relation_id, old_tuple, new_tuple, .. } => {
                let relation = self.relation(relation_id)?.clone();
                let old = match old_tuple {
                    Some(tuple) => Some(self.decode_tuple(&relation, tuple).await?),
                    None => None,
                };
                let new = self.decode_tuple(&relation, new_tuple).await?;
                Ok(Some(ChangeEvent::Update {
                    relation_id,
                    schema: relation.namespace,
                    table: relation.name,
                    old,
                    new,
                }))
            }
            Message::Delete { relation_id, old_tuple, key_tuple } => {
                let relation = self.relation(relation_id)?.clone();
                let identity = old_tuple.or(key_tuple).ok_or_else(|| {
                    ConnectorError::Protocol(format!(
                        "delete on relation {relation_id} carries no identity tuple; REPLICA IDENTITY is NOTHING"
                    ))
                })?;
                let old = self.decode_tuple(&relation, identity).await?;
                Ok(Some(ChangeEvent::Delete {
                    relation_id,
                    schema: relation.namespace,
                    table: relation.name,
                    old,
                }))
            }
            Message::Truncate { relation_ids, .. } => {
                let tables = relation_ids
                    .iter()
                    .filter_map(|id| self.relations.get(id).map(|r| (r.namespace.clone(), r.name.clone())))
                    .collect();
                Ok(Some(ChangeEvent::Truncate { tables }))
            }
        }
    }

    fn relation(&self, relation_id: i32) -> Result<&Relation> {
        self.relations.get(&relation_id).ok_or_else(|| {
            ConnectorError::Protocol(format!(
                "change event for relation {relation_id} arrived before its Relation message"
            ))
        })
    }

    async fn decode_tuple(&mut self, relation: &Relation, tuple: Tuple) -> Result<DecodedRow> {
        let mut row = DecodedRow::with_capacity(tuple.0.len());
        for (column, value) in relation.columns.iter().zip(tuple.0.into_iter()) {
            let decoded = match value {
                TupleValue::Null => Value::Null,
                TupleValue::Unchanged => continue,
                TupleValue::Text(text) => {
                    let data_type = self.types.resolve(column.type_oid).await?;
                    decode_text_value(&text, &data_type)
                }
            };
            row.insert(column.name.clone(), decoded);
        }
        Ok(row)
    }
}

fn decode_text_value(text: &str, data_type: &DataType) -> Value {
    match data_type {
        DataType::Short | DataType::ShortUnsigned => text
            .parse::<i16>()
            .map(Value::SmallInt)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Int | DataType::Int4 | DataType::IntUnsigned | DataType::Year => text
            .parse::<i32>()
            .map(Value::Int32)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Long | DataType::LongLong => text
            .parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Float | DataType::Double => text
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Decimal | DataType::NewDecimal => bigdecimal::BigDecimal::from_str(text)
            .map(Value::Decimal)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Boolean => Value::Boolean(text == "t" || text == "true"),
        DataType::Json => serde_json::from_str(text)
            .map(Value::Json)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Date => NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        DataType::Timestamp => parse_pg_timestamp(text),
        DataType::Bytea => decode_bytea_hex(text)
            .map(Value::Bytes)
            .unwrap_or_else(|| Value::String(text.to_string())),
        DataType::Array(_) | DataType::Set => Value::StringArray(coercion::parse_array_string(text)),
        DataType::Custom(name) if name.eq_ignore_ascii_case("uuid") => Uuid::parse_str(text)
            .map(Value::Uuid)
            .unwrap_or_else(|_| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

fn parse_pg_timestamp(text: &str) -> Value {
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Value::Timestamp(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Value::Timestamp(Utc.from_utc_datetime(&naive));
    }
    Value::String(text.to_string())
}

fn decode_bytea_hex(text: &str) -> Option<Vec<u8>> {
    let hex = text.strip_prefix("\\x")?;
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_builtin_oids() {
        assert_eq!(builtin_data_type(23), Some(DataType::Int));
        assert_eq!(builtin_data_type(1700), Some(DataType::Decimal));
        assert!(builtin_data_type(999999).is_none());
    }

    #[test]
    fn decodes_bytea_hex_literal() {
        assert_eq!(decode_bytea_hex("\\x68656c6c6f"), Some(b"hello".to_vec()));
        assert_eq!(decode_bytea_hex("not-hex"), None);
    }

    #[test]
    fn decodes_timestamp_with_and_without_offset() {
        match decode_text_value("2024-01-02 03:04:05.5", &DataType::Timestamp) {
            Value::Timestamp(_) => {}
            other => panic!("expected timestamp, got {other:?}"),
        }
        match decode_text_value("2024-01-02 03:04:05+00", &DataType::Timestamp) {
            Value::Timestamp(_) => {}
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn decodes_integer_and_boolean_text() {
        assert_eq!(decode_text_value("42", &DataType::Int), Value::Int32(42));
        assert_eq!(decode_text_value("t", &DataType::Boolean), Value::Boolean(true));
        assert_eq!(decode_text_value("f", &DataType::Boolean), Value::Boolean(false));
    }
}
