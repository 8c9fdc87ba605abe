//! Value encoding.
//!
//! One writer per [`Value`] variant. Graph elements update the reporter as
//! they are written (+1 node or relationship, plus its property count);
//! scalars reached through rows, maps or lists count as one property each.

use crate::generator::JsonGenerator;
use crate::reporter::Reporter;
use portico_core::error::{GatewayError, GatewayResult};
use portico_core::{NodeRef, NodeView, PathView, PropertyMap, RelationshipView, Value};
use std::io::Write;

#[derive(Debug, Clone, Copy)]
pub struct ValueCodec {
    use_types: bool,
}

impl ValueCodec {
    pub fn new(use_types: bool) -> Self {
        Self { use_types }
    }

    /// Writes `value`, preceded by `key` when inside an object.
    pub fn write_value<W: Write>(
        &self,
        gen: &mut JsonGenerator<W>,
        key: Option<&str>,
        value: &Value,
        reporter: &mut Reporter,
    ) -> GatewayResult<()> {
        if let Some(key) = key {
            gen.field_name(key)?;
        }
        match value {
            Value::Node(node) => self.write_node(gen, node, reporter),
            Value::Relationship(rel) => self.write_relationship(gen, rel, reporter),
            Value::Path(path) => self.write_path(gen, path, reporter),
            Value::Map(map) => {
                gen.begin_object()?;
                for (k, v) in map {
                    self.write_value(gen, Some(k), v, reporter)?;
                }
                gen.end_object()
            }
            Value::List(items) => {
                gen.begin_array()?;
                for item in items {
                    self.write_value(gen, None, item, reporter)?;
                }
                gen.end_array()
            }
            scalar => {
                write_scalar(gen, scalar)?;
                reporter.update(0, 0, 1);
                Ok(())
            }
        }
    }

    pub fn write_node<W: Write>(
        &self,
        gen: &mut JsonGenerator<W>,
        node: &NodeView,
        reporter: &mut Reporter,
    ) -> GatewayResult<()> {
        gen.begin_object()?;
        if self.use_types {
            gen.field_name("type")?;
            gen.write_str("node")?;
        }
        gen.field_name("id")?;
        gen.write_str(&node.id.to_string())?;
        write_labels(gen, &node.labels)?;
        write_properties(gen, &node.properties)?;
        gen.end_object()?;
        reporter.update(1, 0, node.properties.len() as u64);
        Ok(())
    }

    pub fn write_relationship<W: Write>(
        &self,
        gen: &mut JsonGenerator<W>,
        rel: &RelationshipView,
        reporter: &mut Reporter,
    ) -> GatewayResult<()> {
        gen.begin_object()?;
        if self.use_types {
            gen.field_name("type")?;
            gen.write_str("relationship")?;
        }
        gen.field_name("id")?;
        gen.write_str(&rel.id.to_string())?;
        gen.field_name("label")?;
        gen.write_str(&rel.rel_type)?;
        write_properties(gen, &rel.properties)?;
        gen.field_name("start")?;
        write_endpoint(gen, &rel.start)?;
        gen.field_name("end")?;
        write_endpoint(gen, &rel.end)?;
        gen.end_object()?;
        reporter.update(0, 1, rel.properties.len() as u64);
        Ok(())
    }

    /// `{"length": n, "rels": [...], "nodes": [...]}`
    pub fn write_path<W: Write>(
        &self,
        gen: &mut JsonGenerator<W>,
        path: &PathView,
        reporter: &mut Reporter,
    ) -> GatewayResult<()> {
        gen.begin_object()?;
        gen.field_name("length")?;
        gen.write_i64(path.length() as i64)?;
        gen.field_name("rels")?;
        gen.begin_array()?;
        for rel in &path.relationships {
            self.write_relationship(gen, rel, reporter)?;
        }
        gen.end_array()?;
        gen.field_name("nodes")?;
        gen.begin_array()?;
        for node in &path.nodes {
            self.write_node(gen, node, reporter)?;
        }
        gen.end_array()?;
        gen.end_object()
    }
}

fn write_labels<W: Write>(gen: &mut JsonGenerator<W>, labels: &[String]) -> GatewayResult<()> {
    if labels.is_empty() {
        return Ok(());
    }
    gen.field_name("labels")?;
    gen.begin_array()?;
    for label in labels {
        gen.write_str(label)?;
    }
    gen.end_array()
}

fn write_endpoint<W: Write>(gen: &mut JsonGenerator<W>, node: &NodeRef) -> GatewayResult<()> {
    gen.begin_object()?;
    gen.field_name("id")?;
    gen.write_str(&node.id.to_string())?;
    write_labels(gen, &node.labels)?;
    gen.end_object()
}

/// Property maps hold scalars and lists of scalars only.
fn write_properties<W: Write>(
    gen: &mut JsonGenerator<W>,
    properties: &PropertyMap,
) -> GatewayResult<()> {
    if properties.is_empty() {
        return Ok(());
    }
    gen.field_name("properties")?;
    gen.begin_object()?;
    for (key, value) in properties {
        gen.field_name(key)?;
        match value {
            Value::List(items) => {
                gen.begin_array()?;
                for item in items {
                    if !item.is_scalar() {
                        return Err(unsupported_property(key, item));
                    }
                    write_scalar(gen, item)?;
                }
                gen.end_array()?;
            }
            v if v.is_scalar() => write_scalar(gen, v)?,
            other => return Err(unsupported_property(key, other)),
        }
    }
    gen.end_object()
}

fn unsupported_property(key: &str, value: &Value) -> GatewayError {
    GatewayError::serialization(format!(
        "property '{key}' has unsupported type {}",
        value.kind()
    ))
}

fn write_scalar<W: Write>(gen: &mut JsonGenerator<W>, value: &Value) -> GatewayResult<()> {
    match value {
        Value::Null => gen.write_null(),
        Value::Bool(b) => gen.write_bool(*b),
        Value::Int(i) => gen.write_i64(*i),
        Value::Float(f) => gen.write_f64(*f),
        Value::String(s) => gen.write_str(s),
        other => Err(GatewayError::serialization(format!(
            "expected a scalar, found {}",
            other.kind()
        ))),
    }
}
