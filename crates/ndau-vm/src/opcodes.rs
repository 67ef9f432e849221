// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CHAINCODE OPCODES
//
// Byte-level instruction set and a decoder shared by the interpreter and
// the disassembler. Decoding is total: every script either decodes into a
// flat instruction list or yields a VmError naming the offending offset.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::VmError;
use std::fmt;

pub const OP_NOP: u8 = 0x00;
pub const OP_DROP: u8 = 0x01;
pub const OP_DROP2: u8 = 0x02;
pub const OP_DUP: u8 = 0x05;
pub const OP_SWAP: u8 = 0x09;
pub const OP_OVER: u8 = 0x0c;
pub const OP_ONE: u8 = 0x1a;
pub const OP_NEG1: u8 = 0x1b;
pub const OP_MAXNUM: u8 = 0x1c;
pub const OP_MINNUM: u8 = 0x1d;
pub const OP_ZERO: u8 = 0x20;
pub const OP_PUSH1: u8 = 0x21;
pub const OP_PUSH8: u8 = 0x28;
pub const OP_ADD: u8 = 0x40;
pub const OP_SUB: u8 = 0x41;
pub const OP_MUL: u8 = 0x42;
pub const OP_DIV: u8 = 0x43;
pub const OP_MOD: u8 = 0x44;
pub const OP_MIN: u8 = 0x48;
pub const OP_MAX: u8 = 0x49;
pub const OP_NOT: u8 = 0x50;
pub const OP_EQ: u8 = 0x51;
pub const OP_LT: u8 = 0x52;
pub const OP_GT: u8 = 0x53;
pub const OP_IF: u8 = 0x80;
pub const OP_ELSE: u8 = 0x81;
pub const OP_ENDIF: u8 = 0x82;
pub const OP_ENDDEF: u8 = 0x88;
pub const OP_DEF: u8 = 0xa0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Nop,
    Drop,
    Drop2,
    Dup,
    Swap,
    Over,
    Push(i64),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Min,
    Max,
    Not,
    Eq,
    Lt,
    Gt,
    If,
    Else,
    EndIf,
    Def(u8),
    EndDef,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Nop => write!(f, "nop"),
            Instruction::Drop => write!(f, "drop"),
            Instruction::Drop2 => write!(f, "drop2"),
            Instruction::Dup => write!(f, "dup"),
            Instruction::Swap => write!(f, "swap"),
            Instruction::Over => write!(f, "over"),
            Instruction::Push(0) => write!(f, "zero"),
            Instruction::Push(1) => write!(f, "one"),
            Instruction::Push(-1) => write!(f, "neg1"),
            Instruction::Push(i64::MAX) => write!(f, "maxnum"),
            Instruction::Push(i64::MIN) => write!(f, "minnum"),
            Instruction::Push(n) => write!(f, "push {}", n),
            Instruction::Add => write!(f, "add"),
            Instruction::Sub => write!(f, "sub"),
            Instruction::Mul => write!(f, "mul"),
            Instruction::Div => write!(f, "div"),
            Instruction::Mod => write!(f, "mod"),
            Instruction::Min => write!(f, "min"),
            Instruction::Max => write!(f, "max"),
            Instruction::Not => write!(f, "not"),
            Instruction::Eq => write!(f, "eq"),
            Instruction::Lt => write!(f, "lt"),
            Instruction::Gt => write!(f, "gt"),
            Instruction::If => write!(f, "if"),
            Instruction::Else => write!(f, "else"),
            Instruction::EndIf => write!(f, "endif"),
            Instruction::Def(id) => write!(f, "def {}", id),
            Instruction::EndDef => write!(f, "enddef"),
        }
    }
}

/// Decode a script into `(offset, instruction)` pairs.
pub fn decode(script: &[u8]) -> Result<Vec<(usize, Instruction)>, VmError> {
    let mut out = Vec::new();
    let mut pc = 0usize;
    while pc < script.len() {
        let op = script[pc];
        let start = pc;
        pc += 1;
        let ins = match op {
            OP_NOP => Instruction::Nop,
            OP_DROP => Instruction::Drop,
            OP_DROP2 => Instruction::Drop2,
            OP_DUP => Instruction::Dup,
            OP_SWAP => Instruction::Swap,
            OP_OVER => Instruction::Over,
            OP_ONE => Instruction::Push(1),
            OP_NEG1 => Instruction::Push(-1),
            OP_MAXNUM => Instruction::Push(i64::MAX),
            OP_MINNUM => Instruction::Push(i64::MIN),
            OP_ZERO => Instruction::Push(0),
            OP_PUSH1..=OP_PUSH8 => {
                let n = (op - OP_PUSH1 + 1) as usize;
                let bytes = script
                    .get(pc..pc + n)
                    .ok_or(VmError::Truncated { offset: start })?;
                pc += n;
                Instruction::Push(sign_extend(bytes))
            }
            OP_ADD => Instruction::Add,
            OP_SUB => Instruction::Sub,
            OP_MUL => Instruction::Mul,
            OP_DIV => Instruction::Div,
            OP_MOD => Instruction::Mod,
            OP_MIN => Instruction::Min,
            OP_MAX => Instruction::Max,
            OP_NOT => Instruction::Not,
            OP_EQ => Instruction::Eq,
            OP_LT => Instruction::Lt,
            OP_GT => Instruction::Gt,
            OP_IF => Instruction::If,
            OP_ELSE => Instruction::Else,
            OP_ENDIF => Instruction::EndIf,
            OP_ENDDEF => Instruction::EndDef,
            OP_DEF => {
                let id = *script
                    .get(pc)
                    .ok_or(VmError::Truncated { offset: start })?;
                pc += 1;
                Instruction::Def(id)
            }
            other => {
                return Err(VmError::UnknownOpcode {
                    opcode: other,
                    offset: start,
                })
            }
        };
        out.push((start, ins));
    }
    Ok(out)
}

/// Little-endian, sign-extended from the top bit of the last byte.
fn sign_extend(bytes: &[u8]) -> i64 {
    let mut buf = if bytes.last().map_or(false, |b| b & 0x80 != 0) {
        [0xffu8; 8]
    } else {
        [0u8; 8]
    };
    buf[..bytes.len()].copy_from_slice(bytes);
    i64::from_le_bytes(buf)
}

/// Smallest push encoding of `n`; the inverse of the decoder.
pub fn encode_push(n: i64) -> Vec<u8> {
    match n {
        0 => vec![OP_ZERO],
        1 => vec![OP_ONE],
        -1 => vec![OP_NEG1],
        i64::MAX => vec![OP_MAXNUM],
        i64::MIN => vec![OP_MINNUM],
        _ => {
            let le = n.to_le_bytes();
            let mut len = 8;
            while len > 1 {
                let candidate = sign_extend(&le[..len - 1]);
                if candidate != n {
                    break;
                }
                len -= 1;
            }
            let mut out = vec![OP_PUSH1 + (len as u8 - 1)];
            out.extend_from_slice(&le[..len]);
            out
        }
    }
}

/// Human-readable listing, one instruction per line with its byte offset.
pub fn disassemble(script: &[u8]) -> Result<String, VmError> {
    let mut depth = 0usize;
    let mut lines = Vec::new();
    for (offset, ins) in decode(script)? {
        if matches!(ins, Instruction::Else | Instruction::EndIf | Instruction::EndDef) {
            depth = depth.saturating_sub(1);
        }
        lines.push(format!("{:04x}  {}{}", offset, "  ".repeat(depth), ins));
        if matches!(ins, Instruction::If | Instruction::Else | Instruction::Def(_)) {
            depth += 1;
        }
    }
    Ok(lines.join("\n"))
}
