use chrono::SecondsFormat;
use model::core::{
    utils::{encode_bytea, escape_csv_string},
    value::Value,
};

/// Encodes `Value`s into the CSV format accepted by `COPY ... FROM STDIN
/// WITH (FORMAT csv)`.
pub struct PgCopyValueEncoder;

impl PgCopyValueEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_optional(&self, value: Option<&Value>) -> String {
        match value {
            Some(v) => self.encode_value(v),
            None => self.encode_null(),
        }
    }

    pub fn encode_null(&self) -> String {
        String::new()
    }

    pub fn encode_value(&self, value: &Value) -> String {
        match value {
            Value::Null => self.encode_null(),
            Value::String(s) => escape_csv_string(s),
            Value::Json(v) => escape_csv_string(&v.to_string()),
            Value::Enum(_, v) => escape_csv_string(v),
            Value::StringArray(values) => escape_csv_string(&self.encode_array_literal(values)),
            Value::Bytes(bytes) => escape_csv_string(&encode_bytea(bytes)),
            Value::Boolean(v) => v.to_string(),
            Value::SmallInt(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int(v) => v.to_string(),
            Value::Uint(v) => v.to_string(),
            Value::Usize(v) => v.to_string(),
            Value::Float(v) => ryu::Buffer::new().format(*v).to_string(),
            Value::Decimal(v) => v.to_string(),
            Value::Uuid(v) => v.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
            Value::TimestampNaive(ts) => ts.to_string(),
        }
    }

    fn encode_array_literal(&self, values: &[String]) -> String {
        let mut literal = String::from('{');
        for (idx, value) in values.iter().enumerate() {
            if idx > 0 {
                literal.push(',');
            }
            literal.push_str(&Self::quote_array_item(value));
        }
        literal.push('}');
        literal
    }

    fn quote_array_item(value: &str) -> String {
        let mut quoted = String::from('"');
        for ch in value.chars() {
            match ch {
                '"' => quoted.push_str("\\\""),
                '\\' => quoted.push_str("\\\\"),
                _ => quoted.push(ch),
            }
        }
        quoted.push('"');
        quoted
    }
}

impl Default for PgCopyValueEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_null_and_string() {
        let enc = PgCopyValueEncoder::new();
        assert_eq!(enc.encode_null(), "");
        assert_eq!(enc.encode_value(&Value::String("a,b".into())), "\"a,b\"");
    }

    #[test]
    fn test_encode_array_literal_roundtrips_quoting() {
        let enc = PgCopyValueEncoder::new();
        let encoded = enc.encode_value(&Value::StringArray(vec!["a".into(), "b".into()]));
        // outer CSV quoting, inner Postgres array braces and per-item quoting
        assert_eq!(encoded, "\"{\"\"a\"\",\"\"b\"\"}\"");
    }
}
