//! JSON Lines import.
//!
//! Reads a `JSON_LINES` export back through the gateway and recreates its
//! elements via a [`GraphWriter`]. Exported ids are remapped onto the ids
//! the writer assigns; relationships must follow the nodes they reference.

use crate::compression::CompressedReader;
use crate::gateway::FileGateway;
use crate::progress::{CountingReader, ProgressCounter};
use crate::reporter::{Reporter, Summary};
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{ElementId, ImportConfig, Labels, PropertyMap, SerializationFormat, Value};
use portico_source::GraphWriter;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct JsonImporter {
    gateway: FileGateway,
    cancel: CancellationToken,
}

impl JsonImporter {
    pub fn new(gateway: FileGateway) -> Self {
        Self {
            gateway,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn import_json_lines(
        &self,
        writer: &mut dyn GraphWriter,
        file: &str,
        config: &ImportConfig,
    ) -> GatewayResult<Summary> {
        config.validate()?;
        let (resolved, handle, len) = self.gateway.open_read(file)?;
        let target = resolved.path.display().to_string();

        let counting = CountingReader::new(handle, i64::try_from(len).unwrap_or(i64::MAX));
        let mut reader = BufReader::new(CompressedReader::new(counting, config.compression));
        let mut reporter = Reporter::new(
            Some(target.clone()),
            "file",
            SerializationFormat::JsonLines,
            config.batch_size,
        );

        let mut ids: HashMap<String, ElementId> = HashMap::new();
        let mut line = String::new();
        let mut line_no = 0u64;
        let mut in_batch = 0usize;
        loop {
            if self.cancel.is_cancelled() {
                tracing::warn!(file = %target, line = line_no, "import cancelled");
                return Err(GatewayError::Cancelled {
                    written: reporter.processed(),
                });
            }
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let entry: Json = serde_json::from_str(trimmed).map_err(|e| {
                GatewayError::serialization(format!("line {line_no}: invalid JSON: {e}"))
            })?;
            import_entry(writer, &entry, &mut ids, &mut reporter)
                .map_err(|e| match e {
                    GatewayError::Serialization(msg) => {
                        GatewayError::serialization(format!("line {line_no}: {msg}"))
                    }
                    other => other,
                })?;

            in_batch += 1;
            if in_batch >= config.batch_size {
                in_batch = 0;
                reporter.next_batch();
                tracing::debug!(
                    file = %target,
                    lines = line_no,
                    percent = reader.get_ref().get_ref().percent(),
                    "import progress"
                );
            }
        }
        if in_batch > 0 {
            reporter.next_batch();
        }

        let bytes = reader.get_ref().get_ref().count();
        reporter.done(Some(bytes));
        let summary = reporter.total();
        tracing::info!(
            file = %target,
            nodes = summary.nodes,
            relationships = summary.relationships,
            properties = summary.properties,
            elapsed_ms = summary.elapsed_ms,
            "import complete"
        );
        Ok(summary)
    }
}

fn import_entry(
    writer: &mut dyn GraphWriter,
    entry: &Json,
    ids: &mut HashMap<String, ElementId>,
    reporter: &mut Reporter,
) -> GatewayResult<()> {
    let object = entry
        .as_object()
        .ok_or_else(|| GatewayError::serialization("expected a JSON object"))?;

    let properties = match object.get("properties") {
        Some(Json::Object(map)) => map
            .iter()
            .map(|(k, v)| Ok((k.clone(), property_value(k, v)?)))
            .collect::<GatewayResult<PropertyMap>>()?,
        Some(_) => return Err(GatewayError::serialization("'properties' must be an object")),
        None => PropertyMap::new(),
    };
    let prop_count = properties.len() as u64;

    let is_relationship = match object.get("type").and_then(Json::as_str) {
        Some("node") => false,
        Some("relationship") => true,
        Some(other) => {
            return Err(GatewayError::serialization(format!(
                "unknown element type '{other}'"
            )))
        }
        None => object.contains_key("start") && object.contains_key("end"),
    };

    let exported_id = element_id(object.get("id"))?;
    if is_relationship {
        let start = endpoint(object.get("start"), ids)?;
        let end = endpoint(object.get("end"), ids)?;
        let rel_type = object
            .get("label")
            .and_then(Json::as_str)
            .ok_or_else(|| GatewayError::serialization("relationship without a label"))?;
        writer.create_relationship(start, end, rel_type, properties)?;
        reporter.update(0, 1, prop_count);
    } else {
        let labels: Labels = match object.get("labels") {
            Some(Json::Array(items)) => items
                .iter()
                .map(|l| {
                    l.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| GatewayError::serialization("labels must be strings"))
                })
                .collect::<GatewayResult<_>>()?,
            Some(_) => return Err(GatewayError::serialization("'labels' must be an array")),
            None => Labels::new(),
        };
        let new_id = writer.create_node(labels, properties)?;
        ids.insert(exported_id, new_id);
        reporter.update(1, 0, prop_count);
    }
    Ok(())
}

/// Exported ids are strings; plain numbers are accepted too.
fn element_id(value: Option<&Json>) -> GatewayResult<String> {
    match value {
        Some(Json::String(s)) => Ok(s.clone()),
        Some(Json::Number(n)) => Ok(n.to_string()),
        _ => Err(GatewayError::serialization("element without an id")),
    }
}

fn endpoint(value: Option<&Json>, ids: &HashMap<String, ElementId>) -> GatewayResult<ElementId> {
    let exported = element_id(value.and_then(|v| v.get("id")))?;
    ids.get(&exported).copied().ok_or_else(|| {
        GatewayError::Source(format!(
            "relationship references node {exported} that was not imported"
        ))
    })
}

/// Scalars and lists of scalars, the property values an export can write.
fn property_value(key: &str, value: &Json) -> GatewayResult<Value> {
    match value {
        Json::Array(items) => Ok(Value::List(
            items
                .iter()
                .map(|item| scalar(key, item))
                .collect::<GatewayResult<_>>()?,
        )),
        other => scalar(key, other),
    }
}

fn scalar(key: &str, value: &Json) -> GatewayResult<Value> {
    Ok(match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().ok_or_else(|| {
                GatewayError::serialization(format!("number {n} is out of range"))
            })?),
        },
        Json::String(s) => Value::String(s.clone()),
        Json::Array(_) | Json::Object(_) => {
            return Err(GatewayError::serialization(format!(
                "property '{key}' holds a nested value; only scalars and lists of scalars are supported"
            )))
        }
    })
}
