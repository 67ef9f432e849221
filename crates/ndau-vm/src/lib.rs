// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// NDAU - CHAINCODE VIRTUAL MACHINE
//
// Small deterministic stack machine used for every opaque script the ledger
// stores: transaction fee scripts, account validation scripts and node
// distribution scripts.
// - i64 stack, checked arithmetic (overflow is an error, never a wrap)
// - Handlers selected by `def <id> ... enddef`, falling back to handler 0
// - Instruction budget (MAX_STEPS) instead of wall-clock timeouts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::BTreeMap;

pub mod opcodes;

pub use opcodes::{disassemble, encode_push, Instruction};

/// Upper bound on executed instructions per run.
pub const MAX_STEPS: usize = 10_000;
/// Upper bound on stack depth.
pub const MAX_STACK: usize = 256;
/// Largest script accepted (bytes).
pub const MAX_SCRIPT_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("unknown opcode 0x{opcode:02x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("script truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("script too large: {0} bytes")]
    TooLarge(usize),
    #[error("malformed script structure: {0}")]
    Structure(String),
    #[error("no handler {0} and no default handler")]
    NoHandler(u8),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("arithmetic overflow")]
    Overflow,
    #[error("division by zero")]
    DivideByZero,
    #[error("instruction budget of {0} steps exhausted")]
    OutOfSteps(usize),
    #[error("handler left an empty stack")]
    NoResult,
    #[error("invalid base64 script")]
    InvalidBase64,
}

/// A parsed script: instructions plus handler entry points and jump targets.
#[derive(Debug, Clone)]
pub struct Chaincode {
    code: Vec<Instruction>,
    /// handler id → (first instruction, index of enddef)
    handlers: BTreeMap<u8, (usize, usize)>,
    /// if/else index → index to continue at when the branch is not taken
    jumps: BTreeMap<usize, usize>,
}

impl Chaincode {
    /// Parse and structurally validate a script.
    pub fn parse(script: &[u8]) -> Result<Self, VmError> {
        if script.len() > MAX_SCRIPT_SIZE {
            return Err(VmError::TooLarge(script.len()));
        }
        let code: Vec<Instruction> = opcodes::decode(script)?
            .into_iter()
            .map(|(_, ins)| ins)
            .collect();

        let mut handlers = BTreeMap::new();
        let mut jumps = BTreeMap::new();
        let mut current: Option<(u8, usize)> = None;
        // open if/else frames: (index of if, index of else if seen)
        let mut frames: Vec<(usize, Option<usize>)> = Vec::new();

        for (i, ins) in code.iter().enumerate() {
            let structural = matches!(ins, Instruction::Def(_) | Instruction::EndDef);
            if !structural && current.is_none() {
                return Err(VmError::Structure("instruction outside handler".into()));
            }
            match *ins {
                Instruction::Def(id) => {
                    if current.is_some() {
                        return Err(VmError::Structure("nested def".into()));
                    }
                    if handlers.contains_key(&id) {
                        return Err(VmError::Structure(format!("duplicate handler {}", id)));
                    }
                    current = Some((id, i + 1));
                }
                Instruction::EndDef => {
                    let (id, start) = current
                        .take()
                        .ok_or_else(|| VmError::Structure("enddef without def".into()))?;
                    if !frames.is_empty() {
                        return Err(VmError::Structure("unterminated if".into()));
                    }
                    handlers.insert(id, (start, i));
                }
                Instruction::If => frames.push((i, None)),
                Instruction::Else => {
                    let frame = frames
                        .last_mut()
                        .ok_or_else(|| VmError::Structure("else without if".into()))?;
                    if frame.1.is_some() {
                        return Err(VmError::Structure("double else".into()));
                    }
                    frame.1 = Some(i);
                }
                Instruction::EndIf => {
                    let (if_at, else_at) = frames
                        .pop()
                        .ok_or_else(|| VmError::Structure("endif without if".into()))?;
                    match else_at {
                        Some(e) => {
                            jumps.insert(if_at, e + 1);
                            jumps.insert(e, i + 1);
                        }
                        None => {
                            jumps.insert(if_at, i + 1);
                        }
                    }
                }
                _ => {}
            }
        }
        if current.is_some() {
            return Err(VmError::Structure("missing enddef".into()));
        }
        if handlers.is_empty() {
            return Err(VmError::Structure("no handlers".into()));
        }
        Ok(Chaincode {
            code,
            handlers,
            jumps,
        })
    }

    /// Parse a base64 (standard alphabet) script.
    pub fn from_base64(encoded: &str) -> Result<Self, VmError> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|_| VmError::InvalidBase64)?;
        Self::parse(&bytes)
    }

    pub fn has_handler(&self, id: u8) -> bool {
        self.handlers.contains_key(&id)
    }

    /// Run handler `id` (or handler 0 when `id` is not defined) with `inputs`
    /// pushed in order, returning the value left on top of the stack.
    pub fn run(&self, id: u8, inputs: &[i64]) -> Result<i64, VmError> {
        let &(start, end) = self
            .handlers
            .get(&id)
            .or_else(|| self.handlers.get(&0))
            .ok_or(VmError::NoHandler(id))?;

        let mut stack = Stack::with_inputs(inputs)?;
        let mut pc = start;
        let mut steps = 0usize;

        while pc < end {
            steps += 1;
            if steps > MAX_STEPS {
                return Err(VmError::OutOfSteps(MAX_STEPS));
            }
            match self.code[pc] {
                Instruction::Nop | Instruction::EndIf => {}
                Instruction::Drop => {
                    stack.pop()?;
                }
                Instruction::Drop2 => {
                    stack.pop()?;
                    stack.pop()?;
                }
                Instruction::Dup => {
                    let v = stack.peek(0)?;
                    stack.push(v)?;
                }
                Instruction::Swap => {
                    let a = stack.pop()?;
                    let b = stack.pop()?;
                    stack.push(a)?;
                    stack.push(b)?;
                }
                Instruction::Over => {
                    let v = stack.peek(1)?;
                    stack.push(v)?;
                }
                Instruction::Push(n) => stack.push(n)?,
                Instruction::Add => stack.binary(|a, b| a.checked_add(b).ok_or(VmError::Overflow))?,
                Instruction::Sub => stack.binary(|a, b| a.checked_sub(b).ok_or(VmError::Overflow))?,
                Instruction::Mul => stack.binary(|a, b| a.checked_mul(b).ok_or(VmError::Overflow))?,
                Instruction::Div => stack.binary(|a, b| {
                    if b == 0 {
                        return Err(VmError::DivideByZero);
                    }
                    a.checked_div(b).ok_or(VmError::Overflow)
                })?,
                Instruction::Mod => stack.binary(|a, b| {
                    if b == 0 {
                        return Err(VmError::DivideByZero);
                    }
                    a.checked_rem(b).ok_or(VmError::Overflow)
                })?,
                Instruction::Min => stack.binary(|a, b| Ok(a.min(b)))?,
                Instruction::Max => stack.binary(|a, b| Ok(a.max(b)))?,
                Instruction::Not => {
                    let v = stack.pop()?;
                    stack.push(if v == 0 { 1 } else { 0 })?;
                }
                Instruction::Eq => stack.binary(|a, b| Ok((a == b) as i64))?,
                Instruction::Lt => stack.binary(|a, b| Ok((a < b) as i64))?,
                Instruction::Gt => stack.binary(|a, b| Ok((a > b) as i64))?,
                Instruction::If => {
                    if stack.pop()? == 0 {
                        pc = self.jump_target(pc)?;
                        continue;
                    }
                }
                Instruction::Else => {
                    // reached by falling out of the taken branch
                    pc = self.jump_target(pc)?;
                    continue;
                }
                Instruction::Def(_) | Instruction::EndDef => {
                    return Err(VmError::Structure("def inside handler body".into()))
                }
            }
            pc += 1;
        }

        stack.pop().map_err(|_| VmError::NoResult)
    }

    fn jump_target(&self, pc: usize) -> Result<usize, VmError> {
        self.jumps
            .get(&pc)
            .copied()
            .ok_or_else(|| VmError::Structure(format!("no jump target for {}", pc)))
    }
}

struct Stack(Vec<i64>);

impl Stack {
    fn with_inputs(inputs: &[i64]) -> Result<Self, VmError> {
        if inputs.len() > MAX_STACK {
            return Err(VmError::StackOverflow);
        }
        Ok(Stack(inputs.to_vec()))
    }

    fn push(&mut self, v: i64) -> Result<(), VmError> {
        if self.0.len() >= MAX_STACK {
            return Err(VmError::StackOverflow);
        }
        self.0.push(v);
        Ok(())
    }

    fn pop(&mut self) -> Result<i64, VmError> {
        self.0.pop().ok_or(VmError::StackUnderflow)
    }

    fn peek(&self, depth: usize) -> Result<i64, VmError> {
        self.0
            .len()
            .checked_sub(depth + 1)
            .map(|i| self.0[i])
            .ok_or(VmError::StackUnderflow)
    }

    /// Pops b then a, pushes f(a, b).
    fn binary<F>(&mut self, f: F) -> Result<(), VmError>
    where
        F: FnOnce(i64, i64) -> Result<i64, VmError>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b)?)
    }
}

/// One-shot helper: parse `script` and run `handler` with `inputs`.
pub fn execute(script: &[u8], handler: u8, inputs: &[i64]) -> Result<i64, VmError> {
    Chaincode::parse(script)?.run(handler, inputs)
}

// ─────────────────────────────────────────────────────────────────
// SCRIPT BUILDERS (genesis, tests, CLI)
// ─────────────────────────────────────────────────────────────────

/// Script whose default handler returns the constant `n`.
pub fn constant_script(n: i64) -> Vec<u8> {
    let mut s = vec![opcodes::OP_DEF, 0x00];
    s.extend(encode_push(n));
    s.push(opcodes::OP_ENDDEF);
    s
}

/// Validation script accepting only when validation key 0 signed
/// (bit 0 of the signature bitmap).
pub fn require_first_key_script() -> Vec<u8> {
    // bitmap % 2 == 1
    vec![
        opcodes::OP_DEF,
        0x00,
        opcodes::OP_PUSH1,
        0x02,
        opcodes::OP_MOD,
        opcodes::OP_ONE,
        opcodes::OP_EQ,
        opcodes::OP_ENDDEF,
    ]
}
