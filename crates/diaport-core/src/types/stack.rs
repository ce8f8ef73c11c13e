//! Stack frame types.

use super::address::Va;
use super::symbols::FrameLayout;

/// Registers the stack walker asks its helper for.
///
/// The helper maps these onto the target's native register file
/// (`rip`/`rsp`/`rbp` on x64, `pc`/`sp`/`fp`/`lr` on ARM64, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRegister
{
    InstructionPointer,
    StackPointer,
    FramePointer,
    /// Link register on machines that have one.
    ReturnAddress,
}

/// How a frame's layout was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType
{
    /// Frame-pointer-omitted frame described by the function's frame data.
    Fpo,
    TrapFrame,
    Tss,
    /// Classic frame-pointer chained frame.
    Standard,
    /// Frame described by frame data that still establishes a frame pointer.
    FrameData,
    Unknown,
}

/// Indicates how reliable a frame's unwind data is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus
{
    /// The function table described the frame.
    Complete,
    /// No function entry; the frame-pointer chain was followed.
    FramePointerFallback,
    /// Best-effort reconstruction (link register or stack scan).
    Heuristic,
    /// A helper callback failed while unwinding past this frame; it is the last one.
    Truncated,
}

/// One physical frame produced by a stack walk.
#[derive(Debug, Clone)]
pub struct StackFrame
{
    /// Position in the walk, 0 = innermost.
    pub index: usize,
    pub frame_type: FrameType,
    /// Program counter for this frame.
    pub pc: Va,
    /// Stack pointer on entry to the frame body.
    pub sp: Va,
    /// Frame base.
    pub base: Va,
    /// Where execution resumes in the caller, if known.
    pub return_address: Option<Va>,
    /// Start of the containing function, if the function table knew it.
    pub function_start: Option<Va>,
    /// Bytes of stack between this frame's `sp` and the caller's.
    pub size: u64,
    /// Frame layout reported by the function table.
    pub layout: Option<FrameLayout>,
    /// Name of the containing function, when the helper could resolve one.
    pub function_name: Option<String>,
    pub status: FrameStatus,
}

impl StackFrame
{
    /// Length of the function's local variable area, when known.
    pub fn locals_length(&self) -> Option<u32>
    {
        self.layout.map(|layout| layout.locals)
    }

    /// Length of the parameter area, when known.
    pub fn params_length(&self) -> Option<u32>
    {
        self.layout.map(|layout| layout.params)
    }

    /// Whether the walk ended at this frame because of a helper failure.
    pub fn is_truncated(&self) -> bool
    {
        self.status == FrameStatus::Truncated
    }
}
