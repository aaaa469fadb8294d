//! Per-message encode and decode state.
//!
//! A state is created for one message, handed to each parameter in turn and
//! dropped afterwards. States are never shared between concurrent calls.

use std::{collections::BTreeMap, fmt};

use crate::{errors::EncodeError, value::Value};

/// How a decoder treats a constant field carrying an unexpected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Report a [`DecodeDiagnostic`] and keep decoding with the actual value.
    #[default]
    Lenient,
    /// Fail the decode with [`crate::errors::DecodeError::ConstantMismatch`].
    Strict,
}

/// Mutable context of one in-flight message encode.
#[derive(Debug, Clone, Default)]
pub struct EncodeState {
    /// Bytes written so far.
    pub coded_message: Vec<u8>,
    parameter_values: BTreeMap<String, Value>,
    /// Position used by parameters without an explicit byte position.
    pub cursor_byte_position: usize,
    /// Byte positions of parameters are relative to this origin.
    pub origin_byte_position: usize,
}

impl EncodeState {
    pub fn new(parameter_values: BTreeMap<String, Value>) -> Self {
        Self {
            parameter_values,
            ..Default::default()
        }
    }

    /// Caller-supplied values, keyed by parameter short name.
    pub fn parameter_values(&self) -> &BTreeMap<String, Value> {
        &self.parameter_values
    }

    pub fn parameter_value(&self, short_name: &str) -> Option<&Value> {
        self.parameter_values.get(short_name)
    }

    /// ORs `bytes` into the message at `byte_position`, growing it as needed,
    /// and moves the cursor past them.
    pub fn emplace_bytes(&mut self, byte_position: usize, bytes: &[u8]) -> Result<(), EncodeError> {
        let out_of_bounds = || EncodeError::OutOfBounds {
            byte_position,
            byte_length: bytes.len(),
        };

        let end = byte_position.checked_add(bytes.len()).ok_or_else(out_of_bounds)?;
        if self.coded_message.len() < end {
            self.coded_message
                .try_reserve(end - self.coded_message.len())
                .map_err(|_| out_of_bounds())?;
            self.coded_message.resize(end, 0);
        }

        for (dst, src) in self.coded_message[byte_position..end].iter_mut().zip(bytes) {
            *dst |= *src;
        }

        self.cursor_byte_position = self.cursor_byte_position.max(end);

        Ok(())
    }

    pub fn into_coded_message(self) -> Vec<u8> {
        self.coded_message
    }
}

/// Mutable context of one in-flight message decode.
#[derive(Debug, Clone)]
pub struct DecodeState<'a> {
    coded_message: &'a [u8],
    cursor_byte_position: usize,
    /// Byte positions of parameters are relative to this origin.
    pub origin_byte_position: usize,
    pub mode: DecodeMode,
    diagnostics: Vec<DecodeDiagnostic>,
}

impl<'a> DecodeState<'a> {
    pub fn new(coded_message: &'a [u8]) -> Self {
        Self::with_mode(coded_message, DecodeMode::default())
    }

    pub fn with_mode(coded_message: &'a [u8], mode: DecodeMode) -> Self {
        Self {
            coded_message,
            cursor_byte_position: 0,
            origin_byte_position: 0,
            mode,
            diagnostics: Vec::new(),
        }
    }

    pub fn coded_message(&self) -> &'a [u8] {
        self.coded_message
    }

    /// Position used by parameters without an explicit byte position.
    pub fn cursor_byte_position(&self) -> usize {
        self.cursor_byte_position
    }

    /// Moves the cursor forward to `byte_position`. The cursor never moves back.
    pub fn advance_to(&mut self, byte_position: usize) {
        self.cursor_byte_position = self.cursor_byte_position.max(byte_position);
    }

    pub fn report(&mut self, diagnostic: DecodeDiagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Diagnostics collected so far.
    pub fn diagnostics(&self) -> &[DecodeDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<DecodeDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// A constant field decoded to something other than its schema value.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeDiagnostic {
    pub parameter: String,
    pub expected: Value,
    pub actual: Value,
    /// Byte position the field starts at.
    pub byte_position: usize,
    /// The whole message the field was decoded from.
    pub coded_message: Vec<u8>,
}

impl fmt::Display for DecodeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "constant parameter '{}' expected physical value {} but got {} at byte position {} in coded message {}",
            self.parameter,
            self.expected,
            self.actual,
            self.byte_position,
            hex::encode(&self.coded_message)
        )
    }
}
