//! Stack walks over the fixture store's function table

mod common;

use std::collections::HashMap;

use diaport_core::error::{DiaError, Result};
use diaport_core::types::{FrameRegister, FrameStatus, FrameType, MachineType, Va};
use diaport_core::walker::{SessionWalkHelper, StackWalker, ThreadContext};

const LOAD_ADDRESS: u64 = 0x1_4000_0000;

/// A stopped thread: registers plus pointer-sized memory cells.
struct Thread
{
    registers: HashMap<FrameRegister, u64>,
    memory: HashMap<u64, u64>,
    reads: usize,
}

impl Thread
{
    fn new(pc: u64, sp: u64, fp: u64) -> Self
    {
        Self {
            registers: HashMap::from([
                (FrameRegister::InstructionPointer, pc),
                (FrameRegister::StackPointer, sp),
                (FrameRegister::FramePointer, fp),
            ]),
            memory: HashMap::new(),
            reads: 0,
        }
    }

    fn with_cell(mut self, address: u64, value: u64) -> Self
    {
        self.memory.insert(address, value);
        self
    }
}

impl ThreadContext for Thread
{
    fn register_value(&mut self, register: FrameRegister) -> Result<u64>
    {
        self.registers
            .get(&register)
            .copied()
            .ok_or_else(|| DiaError::HelperFailed(format!("no {register:?}")))
    }

    fn read_memory(&mut self, address: Va, buffer: &mut [u8]) -> Result<()>
    {
        self.reads += 1;
        let value = self
            .memory
            .get(&address.value())
            .ok_or_else(|| DiaError::HelperFailed(format!("unreadable {address}")))?;
        buffer.copy_from_slice(&value.to_le_bytes()[..buffer.len()]);
        Ok(())
    }
}

#[test]
fn test_frame_data_unwinds_frame_pointer_omitted_function()
{
    let (_file, _source, session) = common::open_fixture();
    session.set_load_address(LOAD_ADDRESS);

    // main keeps 0x20 bytes of locals and 8 of saved registers below the return address
    let thread = Thread::new(LOAD_ADDRESS + 0x1010, 0x9000, 0).with_cell(0x9028, LOAD_ADDRESS + 0x1210);
    let mut helper = SessionWalkHelper::new(&session, thread);
    let frames: Vec<_> = StackWalker::default()
        .walk(session.machine().unwrap(), &mut helper)
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(frames.len(), 2);
    let main = &frames[0];
    assert_eq!(main.frame_type, FrameType::Fpo);
    assert_eq!(main.status, FrameStatus::Complete);
    assert_eq!(main.function_name.as_deref(), Some("main"));
    assert_eq!(main.function_start, Some(Va::new(LOAD_ADDRESS + 0x1000)));
    assert_eq!(main.return_address, Some(Va::new(LOAD_ADDRESS + 0x1210)));
    assert_eq!(main.base, Va::new(0x9028));
    assert_eq!(main.size, 0x30);
    assert_eq!(main.locals_length(), Some(0x20));

    let caller = &frames[1];
    assert_eq!(caller.index, 1);
    assert_eq!(caller.sp, Va::new(0x9030));
    assert_eq!(caller.function_start, Some(Va::new(LOAD_ADDRESS + 0x1200)));
    assert!(caller.return_address.is_none());
    assert!(!caller.is_truncated());

    assert_eq!(helper.into_context().reads, 1);
}

#[test]
fn test_frame_pointer_fallback_then_truncation()
{
    let (_file, _source, session) = common::open_fixture();
    session.set_load_address(LOAD_ADDRESS);

    // Not inside any function: only the public symbol before it is known
    let thread = Thread::new(LOAD_ADDRESS + 0x1310, 0x9000, 0x9010)
        .with_cell(0x9010, 0x9100)
        .with_cell(0x9018, LOAD_ADDRESS + 0x1004);
    let mut helper = SessionWalkHelper::new(&session, thread);
    let frames: Vec<_> = StackWalker::default()
        .walk(MachineType::Amd64, &mut helper)
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].status, FrameStatus::FramePointerFallback);
    assert_eq!(frames[0].frame_type, FrameType::Standard);
    assert_eq!(frames[0].function_name.as_deref(), Some("_tail_stub"));
    assert!(frames[0].function_start.is_none());

    // main's saved return address is not readable
    assert_eq!(frames[1].function_name.as_deref(), Some("main"));
    assert_eq!(frames[1].frame_type, FrameType::Fpo);
    assert!(frames[1].is_truncated());
}

#[test]
fn test_frame_limit()
{
    let (_file, _source, session) = common::open_fixture();
    let thread = Thread::new(0x1010, 0x9000, 0).with_cell(0x9028, 0x1210);
    let mut helper = SessionWalkHelper::new(&session, thread);
    let frames = StackWalker::new(1).walk(MachineType::Amd64, &mut helper).unwrap();
    assert_eq!(frames.count(), 1);
}

#[test]
fn test_unknown_machine_is_rejected()
{
    let (_file, _source, session) = common::open_fixture();
    let mut helper = SessionWalkHelper::new(&session, Thread::new(0x1010, 0x9000, 0));
    let err = StackWalker::default().walk(MachineType::Unknown, &mut helper).unwrap_err();
    assert!(matches!(err, DiaError::UnsupportedMachine(MachineType::Unknown)));
}
