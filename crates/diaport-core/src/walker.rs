//! # Stack Walker
//!
//! Reconstructs the physical call stack of a stopped thread.
//!
//! The walker knows nothing about the target process. Everything it needs
//! comes through a [`StackWalkHelper`]: register values, memory reads and a
//! function table that describes each function's frame layout.
//!
//! ## Unwinding a frame
//!
//! Each step tries, in order:
//!
//! 1. the function's frame layout, when the function table has one
//!    ([`FrameType::FrameData`] if the function keeps a frame pointer,
//!    [`FrameType::Fpo`] otherwise);
//! 2. the frame-pointer chain (`[fp]` is the caller's frame pointer,
//!    `[fp + ptr]` the return address);
//! 3. on machines with a link register, the link register, for the innermost
//!    frame only.
//!
//! The walk stops at a zero return address, when the stack pointer stops
//! moving up, or after [`StackWalker::max_frames`] frames. A helper failure
//! partway through ends the walk at the current frame, which is marked
//! [`FrameStatus::Truncated`].

use tracing::{debug, warn};

use crate::enumerator::Enumerator;
use crate::error::{DiaError, Result};
use crate::session::Session;
use crate::types::{FrameLayout, FrameRegister, FrameStatus, FrameType, MachineType, StackFrame, SymTag, Va};

/// Default frame limit.
pub const DEFAULT_MAX_FRAMES: usize = 256;

/// A function-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionEntry
{
    pub start: Va,
    pub length: u64,
    pub layout: Option<FrameLayout>,
}

impl FunctionEntry
{
    fn contains(&self, pc: Va) -> bool
    {
        pc.value()
            .checked_sub(self.start.value())
            .is_some_and(|delta| delta < self.length.max(1))
    }
}

/// Target access used by the stack walker.
pub trait StackWalkHelper
{
    fn register_value(&mut self, register: FrameRegister) -> Result<u64>;

    /// Fill `buffer` from target memory at `address`.
    fn read_memory(&mut self, address: Va, buffer: &mut [u8]) -> Result<()>;

    /// The function containing `pc`, if the function table knows it.
    fn function_entry(&mut self, pc: Va) -> Result<Option<FunctionEntry>>;

    /// Name of the function containing `pc`.
    fn symbol_for_va(&mut self, _pc: Va) -> Option<String>
    {
        None
    }
}

/// Register state for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor
{
    pc: u64,
    sp: u64,
    fp: u64,
    lr: Option<u64>,
}

/// Outcome of unwinding one frame.
#[derive(Debug, Clone, Copy)]
struct UnwindStep
{
    next: Cursor,
    base: u64,
    frame_type: FrameType,
    status: FrameStatus,
}

/// Stack walker configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackWalker
{
    max_frames: usize,
}

impl Default for StackWalker
{
    fn default() -> Self
    {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
        }
    }
}

impl StackWalker
{
    pub fn new(max_frames: usize) -> Self
    {
        Self { max_frames }
    }

    pub fn max_frames(&self) -> usize
    {
        self.max_frames
    }

    /// Walk the stack of the thread `helper` describes.
    ///
    /// Fails only when the initial register context cannot be read or the
    /// machine has no known pointer size.
    pub fn walk(&self, machine: MachineType, helper: &mut dyn StackWalkHelper) -> Result<Enumerator<StackFrame>>
    {
        let machine = machine.resolve_host();
        let pointer_size = machine
            .pointer_size()
            .ok_or(DiaError::UnsupportedMachine(machine))?;

        let mut cursor = Cursor {
            pc: helper.register_value(FrameRegister::InstructionPointer)?,
            sp: helper.register_value(FrameRegister::StackPointer)?,
            fp: helper.register_value(FrameRegister::FramePointer)?,
            lr: if machine.has_link_register() {
                Some(helper.register_value(FrameRegister::ReturnAddress)?)
            } else {
                None
            },
        };
        debug!(%machine, pc = cursor.pc, sp = cursor.sp, "Starting stack walk");

        let unwinder = Unwinder {
            helper,
            pointer_size: u64::from(pointer_size),
        };
        let frames = unwinder.run(&mut cursor, self.max_frames);
        debug!(frames = frames.len(), "Stack walk finished");
        Ok(Enumerator::from_vec(frames))
    }
}

struct Unwinder<'h>
{
    helper: &'h mut dyn StackWalkHelper,
    pointer_size: u64,
}

impl Unwinder<'_>
{
    fn run(mut self, cursor: &mut Cursor, max_frames: usize) -> Vec<StackFrame>
    {
        let mut frames: Vec<StackFrame> = Vec::new();

        while frames.len() < max_frames && cursor.pc != 0 {
            let index = frames.len();
            let pc = Va::new(cursor.pc);

            let entry = match self.helper.function_entry(pc) {
                Ok(entry) => entry.filter(|entry| entry.contains(pc)),
                Err(err) => {
                    warn!(index, pc = cursor.pc, error = %err, "Function table lookup failed, truncating walk");
                    frames.push(self.frame(index, cursor, None, None, FrameType::Unknown, FrameStatus::Truncated));
                    break;
                }
            };

            let outcome = self.layout_step(cursor, entry.as_ref()).and_then(|step| match step {
                Some(step) => Ok(Some(step)),
                None => self.frame_pointer_step(cursor),
            });
            let outcome = match outcome {
                Ok(step) => step.or_else(|| self.link_register_step(cursor, index)),
                Err(err) => {
                    warn!(index, pc = cursor.pc, error = %err, "Unwind helper failed, truncating walk");
                    let frame_type = entry
                        .and_then(|entry| entry.layout)
                        .map_or(FrameType::Unknown, layout_frame_type);
                    frames.push(self.frame(index, cursor, entry.as_ref(), None, frame_type, FrameStatus::Truncated));
                    break;
                }
            };

            let Some(step) = outcome else {
                let status = if entry.is_some() {
                    FrameStatus::Complete
                } else {
                    FrameStatus::Heuristic
                };
                frames.push(self.frame(index, cursor, entry.as_ref(), None, FrameType::Unknown, status));
                break;
            };

            let mut frame = self.frame(index, cursor, entry.as_ref(), Some(&step), step.frame_type, step.status);
            frame.return_address = Some(Va::new(step.next.pc));
            frames.push(frame);

            // The link-register step leaves the stack pointer in place.
            let moved = step.next.sp > cursor.sp || (step.status == FrameStatus::Heuristic && index == 0);
            if step.next.pc == 0 || !moved {
                break;
            }
            *cursor = step.next;
        }

        frames
    }

    fn frame(
        &mut self,
        index: usize,
        cursor: &Cursor,
        entry: Option<&FunctionEntry>,
        step: Option<&UnwindStep>,
        frame_type: FrameType,
        status: FrameStatus,
    ) -> StackFrame
    {
        StackFrame {
            index,
            frame_type,
            pc: Va::new(cursor.pc),
            sp: Va::new(cursor.sp),
            base: Va::new(step.map_or(cursor.fp, |step| step.base)),
            return_address: None,
            function_start: entry.map(|entry| entry.start),
            size: step.map_or(0, |step| step.next.sp.saturating_sub(cursor.sp)),
            layout: entry.and_then(|entry| entry.layout),
            function_name: self.helper.symbol_for_va(Va::new(cursor.pc)),
            status,
        }
    }

    fn read_pointer(&mut self, address: u64) -> Result<u64>
    {
        let mut bytes = [0u8; 8];
        let width = if self.pointer_size == 8 { 8 } else { 4 };
        self.helper.read_memory(Va::new(address), &mut bytes[..width])?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Unwind with the function's recorded frame layout.
    fn layout_step(&mut self, cursor: &Cursor, entry: Option<&FunctionEntry>) -> Result<Option<UnwindStep>>
    {
        let Some(entry) = entry else {
            return Ok(None);
        };
        let Some(layout) = entry.layout else {
            return Ok(None);
        };

        if layout.uses_frame_pointer && cursor.fp != 0 {
            return self
                .chain_step(cursor)
                .map(|step| step.map(|step| with_kind(step, FrameType::FrameData, FrameStatus::Complete)));
        }

        let offset = cursor.pc.saturating_sub(entry.start.value());
        let base = if offset < u64::from(layout.prolog) {
            cursor.sp
        } else {
            cursor.sp + u64::from(layout.locals) + u64::from(layout.saved_registers)
        };
        let return_address = self.read_pointer(base)?;
        if return_address == 0 {
            return Ok(None);
        }
        Ok(Some(UnwindStep {
            next: Cursor {
                pc: return_address,
                sp: base + self.pointer_size,
                fp: cursor.fp,
                lr: None,
            },
            base,
            frame_type: FrameType::Fpo,
            status: FrameStatus::Complete,
        }))
    }

    /// Follow the frame-pointer chain.
    fn frame_pointer_step(&mut self, cursor: &Cursor) -> Result<Option<UnwindStep>>
    {
        self.chain_step(cursor)
    }

    fn chain_step(&mut self, cursor: &Cursor) -> Result<Option<UnwindStep>>
    {
        if cursor.fp == 0 || cursor.fp < cursor.sp {
            return Ok(None);
        }
        let saved_fp = self.read_pointer(cursor.fp)?;
        let return_address = self.read_pointer(cursor.fp + self.pointer_size)?;
        if return_address == 0 {
            return Ok(None);
        }
        Ok(Some(UnwindStep {
            next: Cursor {
                pc: return_address,
                sp: cursor.fp + 2 * self.pointer_size,
                fp: saved_fp,
                lr: None,
            },
            base: cursor.fp,
            frame_type: FrameType::Standard,
            status: FrameStatus::FramePointerFallback,
        }))
    }

    /// Leaf frames on link-register machines may not have spilled the return
    /// address yet.
    fn link_register_step(&self, cursor: &Cursor, index: usize) -> Option<UnwindStep>
    {
        if index != 0 {
            return None;
        }
        let lr = cursor.lr.filter(|lr| *lr != 0 && *lr != cursor.pc)?;
        Some(UnwindStep {
            next: Cursor {
                pc: lr,
                sp: cursor.sp,
                fp: cursor.fp,
                lr: None,
            },
            base: cursor.sp,
            frame_type: FrameType::Unknown,
            status: FrameStatus::Heuristic,
        })
    }
}

fn with_kind(step: UnwindStep, frame_type: FrameType, status: FrameStatus) -> UnwindStep
{
    UnwindStep {
        frame_type,
        status,
        ..step
    }
}

fn layout_frame_type(layout: FrameLayout) -> FrameType
{
    if layout.uses_frame_pointer {
        FrameType::FrameData
    } else {
        FrameType::Fpo
    }
}

/// Registers and memory of a stopped thread.
pub trait ThreadContext
{
    fn register_value(&mut self, register: FrameRegister) -> Result<u64>;

    fn read_memory(&mut self, address: Va, buffer: &mut [u8]) -> Result<()>;
}

/// A [`StackWalkHelper`] whose function table is a session's function
/// symbols.
#[derive(Debug)]
pub struct SessionWalkHelper<'s, C>
{
    session: &'s Session,
    context: C,
}

impl<'s, C: ThreadContext> SessionWalkHelper<'s, C>
{
    pub fn new(session: &'s Session, context: C) -> Self
    {
        Self { session, context }
    }

    pub fn into_context(self) -> C
    {
        self.context
    }
}

impl<C: ThreadContext> StackWalkHelper for SessionWalkHelper<'_, C>
{
    fn register_value(&mut self, register: FrameRegister) -> Result<u64>
    {
        self.context.register_value(register)
    }

    fn read_memory(&mut self, address: Va, buffer: &mut [u8]) -> Result<()>
    {
        self.context.read_memory(address, buffer)
    }

    fn function_entry(&mut self, pc: Va) -> Result<Option<FunctionEntry>>
    {
        let Some(function) = self.session.find_symbol_by_va(pc, SymTag::Function)? else {
            return Ok(None);
        };
        Ok(function.va().map(|start| FunctionEntry {
            start,
            length: function.length(),
            layout: function.frame_layout(),
        }))
    }

    fn symbol_for_va(&mut self, pc: Va) -> Option<String>
    {
        if let Ok(Some(function)) = self.session.find_symbol_by_va(pc, SymTag::Function) {
            return function.name().map(str::to_string);
        }
        self.session
            .find_symbol_by_va_ex(pc, SymTag::PublicSymbol)
            .ok()
            .flatten()
            .and_then(|found| found.symbol.name().map(str::to_string))
    }
}
