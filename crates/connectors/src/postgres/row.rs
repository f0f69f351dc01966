use model::core::{data_type::DataType, value::Value};
use tokio_postgres::Row as PgRow;

/// A decoded row, column order preserved as returned by the server.
#[derive(Debug, Clone, Default)]
pub struct Row {
    columns: Vec<(String, Option<Value>)>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn columns(&self) -> &[(String, Option<Value>)] {
        &self.columns
    }

    pub fn from_pg_row(row: &PgRow) -> Self {
        let columns = row
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let data_type = DataType::from_postgres_type(col.type_().name())
                    .unwrap_or_else(|_| DataType::Custom(col.type_().name().to_string()));
                let value = decode_column(row, idx, &data_type);
                (col.name().to_string(), value)
            })
            .collect();
        Row { columns }
    }
}

fn decode_column(row: &PgRow, idx: usize, data_type: &DataType) -> Option<Value> {
    match data_type {
        DataType::Short | DataType::ShortUnsigned => {
            row.try_get::<_, Option<i16>>(idx).ok().flatten().map(Value::SmallInt)
        }
        DataType::Int | DataType::Int4 | DataType::IntUnsigned | DataType::Year => {
            row.try_get::<_, Option<i32>>(idx).ok().flatten().map(Value::Int32)
        }
        DataType::Long | DataType::LongLong => {
            row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Value::Int)
        }
        DataType::Float | DataType::Double | DataType::Decimal | DataType::NewDecimal => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float),
        DataType::Boolean => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Value::Boolean),
        DataType::Json => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json),
        DataType::Timestamp => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::Timestamp),
        DataType::Date => row.try_get::<_, Option<chrono::NaiveDate>>(idx).ok().flatten().map(Value::Date),
        DataType::Bytea | DataType::Geometry | DataType::Blob | DataType::TinyBlob
        | DataType::MediumBlob | DataType::LongBlob | DataType::Binary | DataType::VarBinary => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes),
        DataType::Array(_) | DataType::Set => row
            .try_get::<_, Option<Vec<String>>>(idx)
            .ok()
            .flatten()
            .map(Value::StringArray),
        DataType::Custom(name) if name.eq_ignore_ascii_case("uuid") => {
            row.try_get::<_, Option<uuid::Uuid>>(idx).ok().flatten().map(Value::Uuid)
        }
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().map(Value::String),
    }
}
