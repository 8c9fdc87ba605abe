//! Incremental JSON writer.
//!
//! Emits tokens straight to the underlying writer and tracks nesting so
//! separators land in the right places. Every top-level value is followed by
//! a newline, which makes a run of top-level values valid JSON Lines.

use portico_core::error::{GatewayError, GatewayResult};
use std::io::Write;

#[derive(Debug, Clone, Copy)]
enum Frame {
    Array { first: bool },
    Object { first: bool, awaiting_value: bool },
}

pub struct JsonGenerator<W: Write> {
    writer: W,
    stack: Vec<Frame>,
}

fn json_err(e: serde_json::Error) -> GatewayError {
    if e.is_io() {
        GatewayError::Io(e.into())
    } else {
        GatewayError::serialization(e.to_string())
    }
}

impl<W: Write> JsonGenerator<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stack: Vec::with_capacity(8),
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn begin_array(&mut self) -> GatewayResult<()> {
        self.before_value()?;
        self.writer.write_all(b"[")?;
        self.stack.push(Frame::Array { first: true });
        Ok(())
    }

    pub fn end_array(&mut self) -> GatewayResult<()> {
        match self.stack.pop() {
            Some(Frame::Array { .. }) => {}
            _ => return Err(GatewayError::serialization("end_array outside an array")),
        }
        self.writer.write_all(b"]")?;
        self.after_value()
    }

    pub fn begin_object(&mut self) -> GatewayResult<()> {
        self.before_value()?;
        self.writer.write_all(b"{")?;
        self.stack.push(Frame::Object {
            first: true,
            awaiting_value: false,
        });
        Ok(())
    }

    pub fn end_object(&mut self) -> GatewayResult<()> {
        match self.stack.pop() {
            Some(Frame::Object {
                awaiting_value: false,
                ..
            }) => {}
            Some(Frame::Object { .. }) => {
                return Err(GatewayError::serialization("field name without a value"))
            }
            _ => return Err(GatewayError::serialization("end_object outside an object")),
        }
        self.writer.write_all(b"}")?;
        self.after_value()
    }

    pub fn field_name(&mut self, name: &str) -> GatewayResult<()> {
        match self.stack.last_mut() {
            Some(Frame::Object { first, awaiting_value }) => {
                if *awaiting_value {
                    return Err(GatewayError::serialization(
                        "two field names without a value",
                    ));
                }
                let separate = !*first;
                *first = false;
                *awaiting_value = true;
                if separate {
                    self.writer.write_all(b",")?;
                }
            }
            _ => return Err(GatewayError::serialization("field name outside an object")),
        }
        serde_json::to_writer(&mut self.writer, name).map_err(json_err)?;
        self.writer.write_all(b":")?;
        Ok(())
    }

    pub fn write_null(&mut self) -> GatewayResult<()> {
        self.raw_value(b"null")
    }

    pub fn write_bool(&mut self, v: bool) -> GatewayResult<()> {
        self.raw_value(if v { b"true" } else { b"false" })
    }

    pub fn write_i64(&mut self, v: i64) -> GatewayResult<()> {
        self.before_value()?;
        serde_json::to_writer(&mut self.writer, &v).map_err(json_err)?;
        self.after_value()
    }

    pub fn write_f64(&mut self, v: f64) -> GatewayResult<()> {
        if !v.is_finite() {
            return Err(GatewayError::serialization(format!(
                "non-finite float {v} cannot be written as JSON"
            )));
        }
        self.before_value()?;
        serde_json::to_writer(&mut self.writer, &v).map_err(json_err)?;
        self.after_value()
    }

    pub fn write_str(&mut self, v: &str) -> GatewayResult<()> {
        self.before_value()?;
        serde_json::to_writer(&mut self.writer, v).map_err(json_err)?;
        self.after_value()
    }

    pub fn flush(&mut self) -> GatewayResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the writer. Fails if containers are still open.
    pub fn into_inner(mut self) -> GatewayResult<W> {
        if !self.stack.is_empty() {
            return Err(GatewayError::serialization(format!(
                "{} JSON container(s) left open",
                self.stack.len()
            )));
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn raw_value(&mut self, token: &[u8]) -> GatewayResult<()> {
        self.before_value()?;
        self.writer.write_all(token)?;
        self.after_value()
    }

    fn before_value(&mut self) -> GatewayResult<()> {
        match self.stack.last_mut() {
            None => Ok(()),
            Some(Frame::Array { first }) => {
                if !*first {
                    self.writer.write_all(b",")?;
                }
                *first = false;
                Ok(())
            }
            Some(Frame::Object { awaiting_value, .. }) => {
                if !*awaiting_value {
                    return Err(GatewayError::serialization(
                        "object value written without a field name",
                    ));
                }
                *awaiting_value = false;
                Ok(())
            }
        }
    }

    fn after_value(&mut self) -> GatewayResult<()> {
        if self.stack.is_empty() {
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }
}
