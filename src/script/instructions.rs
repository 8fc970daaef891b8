//! Script bytes, push-operation parsing and construction

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::crypto::CompressedPubKey;

pub mod opcodes {
    pub const OP_0: u8 = 0x00;
    pub const OP_PUSHDATA1: u8 = 0x4c;
    pub const OP_PUSHDATA2: u8 = 0x4d;
    pub const OP_PUSHDATA4: u8 = 0x4e;
    pub const OP_1NEGATE: u8 = 0x4f;
    pub const OP_1: u8 = 0x51;
    pub const OP_TRUE: u8 = OP_1;
    pub const OP_16: u8 = 0x60;
    pub const OP_RETURN: u8 = 0x6a;
    pub const OP_CHECKSIG: u8 = 0xac;
    pub const OP_CHECKMULTISIG: u8 = 0xae;
}

use opcodes::*;

/// Script parsing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    #[error("push of {expected} bytes at offset {offset} runs past end of script")]
    TruncatedPush { offset: usize, expected: usize },
    #[error("truncated push length at offset {0}")]
    TruncatedLength(usize),
}

/// A single parsed script element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// Data push, including the empty push of `OP_0`
    PushBytes(&'a [u8]),
    /// Any non-push opcode
    Op(u8),
}

impl Instruction<'_> {
    /// Value of `OP_0`, `OP_1` .. `OP_16`
    pub fn small_int(&self) -> Option<u8> {
        match *self {
            Instruction::PushBytes(data) if data.is_empty() => Some(0),
            Instruction::Op(op) if (OP_1..=OP_16).contains(&op) => Some(op - OP_1 + 1),
            _ => None,
        }
    }
}

/// Raw script
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new() -> Self {
        Script(Vec::new())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        hex::decode(s).map(Script)
    }

    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::default()
    }

    /// `m <key>... n OP_CHECKMULTISIG`
    pub fn new_multisig(required: u8, keys: &[CompressedPubKey]) -> Self {
        let mut builder = Script::builder().push_int(required as i64);
        for key in keys {
            builder = builder.push_slice(key.as_bytes());
        }
        builder
            .push_int(keys.len() as i64)
            .push_opcode(OP_CHECKMULTISIG)
            .into_script()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Iterate over the script's operations. Iteration ends after the first
    /// malformed push, which is yielded as an error.
    pub fn instructions(&self) -> Instructions<'_> {
        Instructions {
            data: &self.0,
            pos: 0,
            done: false,
        }
    }

    /// Whether the script consists only of data pushes and small integers
    pub fn is_push_only(&self) -> bool {
        self.instructions().all(|ins| match ins {
            Ok(Instruction::PushBytes(_)) => true,
            Ok(Instruction::Op(op)) => op == OP_1NEGATE || (OP_1..=OP_16).contains(&op),
            Err(_) => false,
        })
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl Serialize for Script {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Script {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Iterator over script operations
pub struct Instructions<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Instructions<'a> {
    fn read_len(&mut self, width: usize) -> Result<usize, ScriptError> {
        let start = self.pos;
        if self.data.len() - start < width {
            return Err(ScriptError::TruncatedLength(start));
        }
        let mut buf = [0u8; 4];
        buf[..width].copy_from_slice(&self.data[start..start + width]);
        self.pos += width;
        Ok(u32::from_le_bytes(buf) as usize)
    }

    fn next_instruction(&mut self) -> Result<Instruction<'a>, ScriptError> {
        let offset = self.pos;
        let opcode = self.data[offset];
        self.pos += 1;

        let len = match opcode {
            0x00..=0x4b => opcode as usize,
            OP_PUSHDATA1 => self.read_len(1)?,
            OP_PUSHDATA2 => self.read_len(2)?,
            OP_PUSHDATA4 => self.read_len(4)?,
            _ => return Ok(Instruction::Op(opcode)),
        };

        if self.data.len() - self.pos < len {
            return Err(ScriptError::TruncatedPush {
                offset,
                expected: len,
            });
        }
        let data = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(Instruction::PushBytes(data))
    }
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<Instruction<'a>, ScriptError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.data.len() {
            return None;
        }
        let result = self.next_instruction();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

/// Incremental script construction with minimal push encoding
#[derive(Default)]
pub struct ScriptBuilder(Vec<u8>);

impl ScriptBuilder {
    pub fn push_opcode(mut self, opcode: u8) -> Self {
        self.0.push(opcode);
        self
    }

    pub fn push_slice(mut self, data: &[u8]) -> Self {
        match data.len() {
            0 => self.0.push(OP_0),
            n if n < OP_PUSHDATA1 as usize => self.0.push(n as u8),
            n if n <= 0xff => {
                self.0.push(OP_PUSHDATA1);
                self.0.push(n as u8);
            }
            n if n <= 0xffff => {
                self.0.push(OP_PUSHDATA2);
                self.0.extend_from_slice(&(n as u16).to_le_bytes());
            }
            n => {
                self.0.push(OP_PUSHDATA4);
                self.0.extend_from_slice(&(n as u32).to_le_bytes());
            }
        }
        self.0.extend_from_slice(data);
        self
    }

    /// Push a number, using `OP_0`/`OP_1NEGATE`/`OP_1`..`OP_16` where possible
    pub fn push_int(self, n: i64) -> Self {
        match n {
            0 => self.push_opcode(OP_0),
            -1 => self.push_opcode(OP_1NEGATE),
            1..=16 => self.push_opcode(OP_1 + (n as u8) - 1),
            _ => self.push_slice(&encode_script_num(n)),
        }
    }

    pub fn into_script(self) -> Script {
        Script(self.0)
    }
}

/// Minimal little-endian sign-magnitude encoding of a script number
pub fn encode_script_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    let last = out.len() - 1;
    if out[last] & 0x80 != 0 {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        out[last] |= 0x80;
    }
    out
}
