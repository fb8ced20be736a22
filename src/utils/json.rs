use bson::{Bson, Document as BsonDocument, Regex};
use serde_json::{Map, Value};
use std::io;

/// Convert a JSON value to BSON without extended-JSON interpretation, so that
/// query operators such as `{"$regex": ..., "$options": ...}` reach the compiler
/// untouched. The single-key object `{"$regularExpression": {"pattern", "options"}}`
/// is the one exception and becomes a regex literal.
#[must_use]
pub fn json_to_bson(val: &Value) -> Bson {
    match val {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Bson::Int64(i), Bson::Int32)
            } else {
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(obj) => regex_literal(obj).unwrap_or_else(|| Bson::Document(object_to_document(obj))),
    }
}

fn regex_literal(obj: &Map<String, Value>) -> Option<Bson> {
    if obj.len() != 1 {
        return None;
    }
    let inner = obj.get("$regularExpression")?.as_object()?;
    let pattern = inner.get("pattern")?.as_str()?.to_string();
    let options = inner.get("options").and_then(Value::as_str).unwrap_or("").to_string();
    Some(Bson::RegularExpression(Regex { pattern, options }))
}

fn object_to_document(obj: &Map<String, Value>) -> BsonDocument {
    obj.iter().map(|(k, v)| (k.clone(), json_to_bson(v))).collect()
}

/// Convert a serde_json::Value that must be an object into a bson::Document.
/// Returns io::Error with InvalidData on malformed input.
pub fn json_value_to_bson_document(val: &Value) -> io::Result<BsonDocument> {
    let obj = val
        .as_object()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "expected JSON object"))?;
    Ok(object_to_document(obj))
}

/// Parse a JSON string into a bson::Document. The JSON must be a top-level object.
pub fn parse_json_to_bson_document(json: &str) -> io::Result<BsonDocument> {
    let val: Value =
        serde_json::from_str(json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    json_value_to_bson_document(&val)
}

/// Read newline-delimited JSON objects. Blank lines are skipped; a malformed line
/// fails with its 1-based line number.
pub fn read_ndjson<R: io::BufRead>(reader: R) -> io::Result<Vec<BsonDocument>> {
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc = parse_json_to_bson_document(&line).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("line {}: {e}", n + 1))
        })?;
        docs.push(doc);
    }
    Ok(docs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_skips_blank_lines_and_reports_bad_line() {
        let docs = read_ndjson("{\"i\":\"a\"}\n\n{\"i\":\"b\"}\n".as_bytes()).unwrap();
        assert_eq!(docs.len(), 2);
        let e = read_ndjson("{\"i\":1}\n[2]\n".as_bytes()).unwrap_err();
        assert!(e.to_string().contains("line 2"));
    }

    #[test]
    fn json_to_bson_success() {
        let d = parse_json_to_bson_document("{\"a\":1,\"b\":\"x\",\"c\":5000000000,\"d\":1.5}").unwrap();
        assert_eq!(d.get_i32("a").unwrap(), 1);
        assert_eq!(d.get_str("b").unwrap(), "x");
        assert_eq!(d.get_i64("c").unwrap(), 5_000_000_000);
        assert_eq!(d.get_f64("d").unwrap(), 1.5);
    }

    #[test]
    fn json_to_bson_rejects_array() {
        let e = parse_json_to_bson_document("[1,2,3]").unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn regex_operators_are_not_coerced() {
        let d = parse_json_to_bson_document(r#"{"i":{"$regex":"a","$options":"i"}}"#).unwrap();
        let inner = d.get_document("i").unwrap();
        assert_eq!(inner.get_str("$regex").unwrap(), "a");
    }

    #[test]
    fn regular_expression_literal() {
        let d = parse_json_to_bson_document(
            r#"{"i":{"$not":{"$regularExpression":{"pattern":"^a","options":"i"}}}}"#,
        )
        .unwrap();
        let not = d.get_document("i").unwrap().get("$not").unwrap();
        assert_eq!(
            not,
            &Bson::RegularExpression(Regex { pattern: "^a".into(), options: "i".into() })
        );
    }
}
