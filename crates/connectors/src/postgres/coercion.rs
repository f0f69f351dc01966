use crate::postgres::ColumnInfo;
use model::core::{data_type::DataType, value::Value};

fn is_array_column(col: &ColumnInfo) -> bool {
    matches!(col.data_type, DataType::Array(_) | DataType::Set)
}

fn is_text_column(col: &ColumnInfo) -> bool {
    matches!(col.data_type, DataType::String | DataType::VarChar | DataType::Char)
}

/// Coerces a decoded source `Value` into the shape the destination column's
/// COPY encoding expects — e.g. a scalar string landing in an array column
/// after a schema drift, or raw bytes landing in a text column.
pub fn prepare_value(col: &ColumnInfo, value: Option<&Value>) -> Option<Value> {
    let value = value?.clone();
    if matches!(value, Value::Null) {
        return Some(value);
    }

    if is_array_column(col) {
        return Some(coerce_array_value(value));
    }

    let value = if is_text_column(col) {
        coerce_text_value(value)
    } else {
        value
    };

    Some(value)
}

fn coerce_text_value(value: Value) -> Value {
    match value {
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Value::String(text),
            Err(err) => Value::String(String::from_utf8_lossy(&err.into_bytes()).to_string()),
        },
        other => other,
    }
}

fn coerce_array_value(value: Value) -> Value {
    match value {
        Value::StringArray(_) => value,
        Value::String(s) => Value::StringArray(parse_array_string(&s)),
        Value::Json(json) => match json.as_array() {
            Some(items) => Value::StringArray(items.iter().map(json_value_to_string).collect()),
            None => Value::StringArray(vec![json.to_string()]),
        },
        Value::Enum(_, v) => Value::StringArray(vec![v]),
        other => other,
    }
}

fn json_value_to_string(value: &serde_json::Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())
}

pub(crate) fn parse_array_string(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(json_vec) = serde_json::from_str::<Vec<String>>(trimmed) {
        return json_vec;
    }

    if trimmed.starts_with('{') && trimmed.ends_with('}') && trimmed.len() > 2 {
        let inner = &trimmed[1..trimmed.len() - 1];
        return inner
            .split(',')
            .map(|item| unescape_array_item(item.trim()))
            .filter(|item| !item.is_empty())
            .collect();
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| item.trim_matches('"').trim_matches('\'').to_string())
        .collect()
}

fn unescape_array_item(raw: &str) -> String {
    let unquoted = raw.trim_matches('"');
    let mut result = String::new();
    let mut chars = unquoted.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(data_type: DataType) -> ColumnInfo {
        ColumnInfo {
            name: "c".to_string(),
            data_type,
            nullable: true,
            max_length: None,
        }
    }

    #[test]
    fn test_bytes_coerced_to_text_column() {
        let result = prepare_value(&col(DataType::String), Some(&Value::Bytes(b"hi".to_vec())));
        assert_eq!(result, Some(Value::String("hi".to_string())));
    }

    #[test]
    fn test_scalar_string_coerced_to_array_column() {
        let result = prepare_value(&col(DataType::Array(None)), Some(&Value::String("{a,b}".to_string())));
        assert_eq!(result, Some(Value::StringArray(vec!["a".to_string(), "b".to_string()])));
    }
}
