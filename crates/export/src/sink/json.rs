//! JSON family serializer.
//!
//! | format            | graph framing                                   | rows          |
//! |-------------------|-------------------------------------------------|---------------|
//! | `JSON_LINES`      | one element per line                            | one per line  |
//! | `ARRAY_JSON`      | `[node, ..., rel, ...]`                         | `[row, ...]`  |
//! | `JSON`            | `{"nodes":[...],"rels":[...]}`                  | one per line  |
//! | `JSON_ID_AS_KEYS` | `{"nodes":{"<id>":{...}},"rels":{"<id>":{...}}}` | one per line  |

use super::{Serializer, WriteContext};
use crate::codec::ValueCodec;
use crate::generator::JsonGenerator;
use portico_core::error::GatewayResult;
use portico_core::{ExportConfig, NodeView, RelationshipView, SerializationFormat};
use portico_source::{ElementIter, ResultRows};
use std::io::Write;

pub struct JsonSerializer<W: Write> {
    gen: JsonGenerator<W>,
    codec: ValueCodec,
    format: SerializationFormat,
}

impl<W: Write> JsonSerializer<W> {
    pub fn new(writer: W, config: &ExportConfig) -> Self {
        Self {
            gen: JsonGenerator::new(writer),
            codec: ValueCodec::new(config.use_types),
            format: config.format,
        }
    }

    /// Flushes and returns the writer.
    pub fn into_inner(self) -> GatewayResult<W> {
        self.gen.into_inner()
    }

    fn keyed_by_id(&self) -> bool {
        self.format == SerializationFormat::JsonIdAsKeys
    }

    fn open_section(&mut self, name: &str) -> GatewayResult<()> {
        match self.format {
            SerializationFormat::Json => {
                self.gen.field_name(name)?;
                self.gen.begin_array()
            }
            SerializationFormat::JsonIdAsKeys => {
                self.gen.field_name(name)?;
                self.gen.begin_object()
            }
            _ => Ok(()),
        }
    }

    fn close_section(&mut self) -> GatewayResult<()> {
        match self.format {
            SerializationFormat::Json => self.gen.end_array(),
            SerializationFormat::JsonIdAsKeys => self.gen.end_object(),
            _ => Ok(()),
        }
    }

    fn after_element(&mut self, ctx: &mut WriteContext) -> GatewayResult<()> {
        if ctx.element_written() {
            self.gen.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> Serializer for JsonSerializer<W> {
    fn format(&self) -> SerializationFormat {
        self.format
    }

    fn begin_graph(&mut self) -> GatewayResult<()> {
        match self.format {
            SerializationFormat::ArrayJson => self.gen.begin_array(),
            SerializationFormat::Json | SerializationFormat::JsonIdAsKeys => {
                self.gen.begin_object()
            }
            SerializationFormat::JsonLines => Ok(()),
        }
    }

    fn write_nodes(
        &mut self,
        mut nodes: ElementIter<'_, NodeView>,
        ctx: &mut WriteContext,
    ) -> GatewayResult<()> {
        self.open_section("nodes")?;
        loop {
            ctx.checkpoint()?;
            let Some(node) = nodes.next() else { break };
            let node = node?;
            if self.keyed_by_id() {
                self.gen.field_name(&node.id.to_string())?;
            }
            self.codec.write_node(&mut self.gen, &node, ctx.reporter())?;
            self.after_element(ctx)?;
        }
        self.close_section()
    }

    fn write_relationships(
        &mut self,
        mut rels: ElementIter<'_, RelationshipView>,
        ctx: &mut WriteContext,
    ) -> GatewayResult<()> {
        self.open_section("rels")?;
        loop {
            ctx.checkpoint()?;
            let Some(rel) = rels.next() else { break };
            let rel = rel?;
            if self.keyed_by_id() {
                self.gen.field_name(&rel.id.to_string())?;
            }
            self.codec
                .write_relationship(&mut self.gen, &rel, ctx.reporter())?;
            self.after_element(ctx)?;
        }
        self.close_section()
    }

    fn end_graph(&mut self) -> GatewayResult<()> {
        match self.format {
            SerializationFormat::ArrayJson => self.gen.end_array(),
            SerializationFormat::Json | SerializationFormat::JsonIdAsKeys => {
                self.gen.end_object()
            }
            SerializationFormat::JsonLines => Ok(()),
        }
    }

    fn write_rows(&mut self, mut rows: ResultRows<'_>, ctx: &mut WriteContext) -> GatewayResult<()> {
        let columns = rows.columns().to_vec();
        let wrap = self.format == SerializationFormat::ArrayJson;
        if wrap {
            self.gen.begin_array()?;
        }
        loop {
            ctx.checkpoint()?;
            let Some(row) = rows.next() else { break };
            let row = row?;
            self.gen.begin_object()?;
            for (column, value) in columns.iter().zip(&row) {
                self.codec
                    .write_value(&mut self.gen, Some(column), value, ctx.reporter())?;
            }
            self.gen.end_object()?;
            ctx.reporter().next_row();
            self.after_element(ctx)?;
        }
        if wrap {
            self.gen.end_array()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> GatewayResult<()> {
        self.gen.flush()
    }
}
