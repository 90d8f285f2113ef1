//! The emitter seam.
//!
//! Rendering a [`GeneratedDispatcher`] to target-language source is an
//! external concern; this crate only defines the contract and ships a JSON
//! emitter that serializes the abstract description as-is (used by the CLI
//! and convenient for golden tests downstream).

use std::io::Write;

use thiserror::Error;

use crate::codegen::GeneratedDispatcher;

/// Accepts dispatcher descriptions and writes them to storage in whatever
/// form the target toolchain needs.
pub trait CodeEmitter {
    type Error;

    fn emit(&mut self, dispatcher: &GeneratedDispatcher) -> Result<(), Self::Error>;
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Serializes each dispatcher as one JSON document.
pub struct JsonEmitter<W: Write> {
    writer: W,
    pretty: bool,
}

impl<W: Write> JsonEmitter<W> {
    pub fn new(writer: W) -> Self {
        JsonEmitter {
            writer,
            pretty: false,
        }
    }

    pub fn pretty(writer: W) -> Self {
        JsonEmitter {
            writer,
            pretty: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CodeEmitter for JsonEmitter<W> {
    type Error = EmitError;

    fn emit(&mut self, dispatcher: &GeneratedDispatcher) -> Result<(), EmitError> {
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.writer, dispatcher)?;
        } else {
            serde_json::to_writer(&mut self.writer, dispatcher)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}
