//! # Unwinding
//!
//! Turns a thread's register set into a stream of frames.
//!
//! Each step looks up the CFI row for the current frame in `.eh_frame`, then
//! `.debug_frame`, of the module owning it. When neither has an entry the
//! frame-pointer chain is followed instead (`[fp]` is the caller's frame
//! pointer, `[fp + 8]` the return address).
//!
//! The first frame is the activation frame: its program counter is exact.
//! Every later frame holds a return address, so CFI is looked up at `pc - 1`.
//! Frames interrupted by a signal are exact again; they follow a frame whose
//! CIE is marked as a signal trampoline.
//!
//! The stream ends when the return address is undefined or zero, or when a
//! step makes no progress. A memory read failure ends it with an error, after
//! the frame that needed the read has been produced.

use gimli::{
    BaseAddresses, CfaRule, DebugFrame, EhFrame, EndianSlice, Register, RegisterRule, RunTimeEndian, UnwindContext,
    UnwindSection, UnwindTableRow,
};
use tracing::trace;

use crate::error::{map_dwarf_error, Result, StackError};
use crate::symbols::{BinaryImage, ModuleMap};
use crate::types::{Address, Architecture, Frame, Registers};

/// Reads target memory for the unwinder.
pub trait MemoryAccess
{
    /// Read one little- or big-endian (target order) 64-bit word.
    ///
    /// ## Errors
    ///
    /// Returns `MemoryRead` if the address is not readable.
    fn read_u64(&self, address: Address) -> Result<u64>;
}

impl<M: MemoryAccess + ?Sized> MemoryAccess for &M
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        (**self).read_u64(address)
    }
}

type Section<'a> = EndianSlice<'a, RunTimeEndian>;

enum Step
{
    Continue
    {
        registers: Registers,
        activation: bool,
    },
    End,
}

/// Iterator over the frames of one thread.
pub struct FrameWalker<'a, M>
{
    modules: &'a ModuleMap,
    memory: M,
    registers: Option<Registers>,
    is_activation: bool,
    pending: Option<StackError>,
    context: Box<UnwindContext<usize>>,
}

impl<'a, M: MemoryAccess> FrameWalker<'a, M>
{
    /// Start at the thread's current registers.
    #[must_use]
    pub fn new(modules: &'a ModuleMap, memory: M, registers: Registers) -> Self
    {
        Self {
            modules,
            memory,
            registers: Some(registers),
            is_activation: true,
            pending: None,
            context: Box::new(UnwindContext::new()),
        }
    }

    fn step(&mut self, registers: &Registers, frame: Frame) -> Result<Step>
    {
        let lookup = frame.lookup_pc().value();
        let modules = self.modules;
        let step = match modules.image_at(lookup) {
            Some((image, bias)) => match self.cfi_step(image, bias, registers, lookup)? {
                Some(step) => step,
                None => self.frame_pointer_step(registers)?,
            },
            None => self.frame_pointer_step(registers)?,
        };
        Ok(check_progress(registers, step))
    }

    fn cfi_step(&mut self, image: &BinaryImage, bias: u64, registers: &Registers, lookup: u64) -> Result<Option<Step>>
    {
        let address = lookup.wrapping_sub(bias);

        if let Some(blob) = image.eh_frame() {
            let mut section = EhFrame::new(&blob.data[..], image.endian());
            section.set_address_size(registers.architecture().pointer_size());
            let mut bases = BaseAddresses::default()
                .set_eh_frame(blob.address)
                .set_text(image.text_address());
            if let Some(got) = image.got_address() {
                bases = bases.set_got(got);
            }
            if let Some(header) = image.eh_frame_hdr() {
                bases = bases.set_eh_frame_hdr(header.address);
            }
            if let Some((row, trampoline)) = unwind_row(&section, &bases, &mut self.context, address)? {
                trace!(pc = %Address::new(lookup), "eh_frame row");
                return self.apply_row(registers, &row, trampoline).map(Some);
            }
        }

        if let Some(blob) = image.debug_frame() {
            let mut section = DebugFrame::new(&blob.data[..], image.endian());
            section.set_address_size(registers.architecture().pointer_size());
            let bases = BaseAddresses::default();
            if let Some((row, trampoline)) = unwind_row(&section, &bases, &mut self.context, address)? {
                trace!(pc = %Address::new(lookup), "debug_frame row");
                return self.apply_row(registers, &row, trampoline).map(Some);
            }
        }

        Ok(None)
    }

    fn apply_row(&self, registers: &Registers, row: &UnwindTableRow<usize>, trampoline: bool) -> Result<Step>
    {
        let architecture = registers.architecture();
        let cfa = match row.cfa() {
            CfaRule::RegisterAndOffset { register, offset } => registers
                .get(*register)
                .ok_or_else(|| StackError::Unwind(format!("CFA register {} has no value", register.0)))?
                .wrapping_add_signed(*offset),
            _ => return Err(StackError::Unsupported("DWARF expression for CFA".to_string())),
        };

        let mut next = Registers::new(architecture);
        for &number in architecture.callee_saved() {
            next.set(Register(number), registers.get(Register(number)));
        }

        let return_register = architecture.return_address_register();
        let mut return_rule = None;
        for (register, rule) in row.registers() {
            let value = self.evaluate(rule, registers, *register, cfa)?;
            if *register == return_register {
                return_rule = Some(value);
            }
            next.set(*register, value);
        }

        let return_address = match return_rule {
            Some(value) => value,
            // AArch64 leaf functions leave the link register untouched.
            None if architecture == Architecture::Arm64 => registers.get(return_register),
            None => None,
        };
        let Some(return_address) = return_address.filter(|address| *address != 0) else {
            return Ok(Step::End);
        };

        next.set(architecture.stack_pointer_register(), Some(cfa));
        next.set_pc(Address::new(return_address));
        Ok(Step::Continue {
            registers: next,
            activation: trampoline,
        })
    }

    fn evaluate(&self, rule: &RegisterRule<usize>, registers: &Registers, register: Register, cfa: u64) -> Result<Option<u64>>
    {
        Ok(match rule {
            RegisterRule::Undefined => None,
            RegisterRule::SameValue => registers.get(register),
            RegisterRule::Offset(offset) => Some(self.memory.read_u64(Address::new(cfa).offset_by(*offset))?),
            RegisterRule::ValOffset(offset) => Some(cfa.wrapping_add_signed(*offset)),
            RegisterRule::Register(other) => registers.get(*other),
            _ => {
                trace!(register = register.0, "unsupported register rule");
                None
            }
        })
    }

    fn frame_pointer_step(&self, registers: &Registers) -> Result<Step>
    {
        let Some(fp) = registers.fp().filter(|fp| *fp != 0) else {
            return Ok(Step::End);
        };
        let saved_fp = self.memory.read_u64(Address::new(fp))?;
        let return_address = self.memory.read_u64(Address::new(fp.wrapping_add(8)))?;
        if return_address == 0 {
            return Ok(Step::End);
        }

        let architecture = registers.architecture();
        let mut next = Registers::new(architecture);
        for &number in architecture.callee_saved() {
            next.set(Register(number), registers.get(Register(number)));
        }
        // Frame pointers only ever move towards the stack base.
        next.set(architecture.frame_pointer_register(), Some(saved_fp).filter(|saved| *saved > fp));
        next.set(architecture.stack_pointer_register(), Some(fp.wrapping_add(16)));
        next.set_pc(Address::new(return_address));

        trace!(fp = %Address::new(fp), ra = %Address::new(return_address), "frame pointer step");
        Ok(Step::Continue {
            registers: next,
            activation: false,
        })
    }
}

impl<M: MemoryAccess> Iterator for FrameWalker<'_, M>
{
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item>
    {
        if let Some(err) = self.pending.take() {
            return Some(Err(err));
        }

        let registers = self.registers.take()?;
        if registers.pc() == Address::ZERO {
            return None;
        }

        let frame = Frame::new(registers.pc(), self.is_activation);
        match self.step(&registers, frame) {
            Ok(Step::Continue { registers, activation }) => {
                self.registers = Some(registers);
                self.is_activation = activation;
            }
            Ok(Step::End) => {}
            Err(err) => self.pending = Some(err),
        }
        Some(Ok(frame))
    }
}

fn unwind_row<'s, S>(
    section: &S,
    bases: &BaseAddresses,
    context: &mut UnwindContext<usize>,
    address: u64,
) -> Result<Option<(UnwindTableRow<usize>, bool)>>
where
    S: UnwindSection<Section<'s>>,
{
    let fde = match section.fde_for_address(bases, address, S::cie_from_offset) {
        Ok(fde) => fde,
        Err(gimli::Error::NoUnwindInfoForAddress) => return Ok(None),
        Err(err) => {
            trace!("no FDE for 0x{address:x}: {err}");
            return Ok(None);
        }
    };
    let trampoline = fde.cie().is_signal_trampoline();
    let row = fde
        .unwind_info_for_address(section, bases, context, address)
        .map_err(|err| map_dwarf_error("evaluating CFI", err))?;
    Ok(Some((row.clone(), trampoline)))
}

/// Callers live at strictly higher stack addresses. Only the step out of a
/// signal frame may move elsewhere, since the handler can run on its own
/// stack; it must still change pc or stack pointer.
fn check_progress(current: &Registers, step: Step) -> Step
{
    if let Step::Continue { registers, activation } = &step {
        let repeated = registers.pc() == current.pc() && registers.sp() == current.sp();
        let descended = match (current.sp(), registers.sp()) {
            (Some(old), Some(new)) => !*activation && new <= old,
            _ => false,
        };
        if repeated || descended {
            trace!(pc = %registers.pc(), "unwind made no progress");
            return Step::End;
        }
    }
    step
}

#[cfg(test)]
mod tests
{
    use std::collections::HashMap;

    use super::*;
    use crate::options::DebugInfoConfig;

    struct FakeMemory(HashMap<u64, u64>);

    impl MemoryAccess for FakeMemory
    {
        fn read_u64(&self, address: Address) -> Result<u64>
        {
            self.0
                .get(&address.value())
                .copied()
                .ok_or(StackError::MemoryRead(address.value()))
        }
    }

    fn registers(pc: u64, sp: u64, fp: u64) -> Registers
    {
        let mut registers = Registers::new(Architecture::X86_64)
            .with(gimli::X86_64::RSP.0, sp)
            .with(gimli::X86_64::RBP.0, fp);
        registers.set_pc(Address::new(pc));
        registers
    }

    fn pcs(frames: &[Result<Frame>]) -> Vec<(u64, bool)>
    {
        frames
            .iter()
            .filter_map(|frame| frame.as_ref().ok())
            .map(|frame| (frame.pc.value(), frame.is_activation))
            .collect()
    }

    #[test]
    fn test_frame_pointer_chain()
    {
        let modules = ModuleMap::from_mappings(Vec::new(), DebugInfoConfig::default());
        let memory = FakeMemory(HashMap::from([
            (0x7000, 0x7100),
            (0x7008, 0x401234),
            (0x7100, 0),
            (0x7108, 0x402345),
        ]));

        let frames: Vec<_> = FrameWalker::new(&modules, memory, registers(0x400100, 0x6ff0, 0x7000)).collect();
        assert_eq!(
            pcs(&frames),
            vec![(0x400100, true), (0x401234, false), (0x402345, false)]
        );
        assert!(frames.iter().all(Result::is_ok));
    }

    #[test]
    fn test_unreadable_memory_ends_with_error()
    {
        let modules = ModuleMap::from_mappings(Vec::new(), DebugInfoConfig::default());
        let memory = FakeMemory(HashMap::new());

        let mut walker = FrameWalker::new(&modules, memory, registers(0x400100, 0x6ff0, 0x7000));
        assert!(matches!(walker.next(), Some(Ok(frame)) if frame.is_activation));
        assert!(matches!(walker.next(), Some(Err(StackError::MemoryRead(0x7000)))));
        assert!(walker.next().is_none());
    }

    #[test]
    fn test_zero_return_address_ends_stack()
    {
        let modules = ModuleMap::from_mappings(Vec::new(), DebugInfoConfig::default());
        let memory = FakeMemory(HashMap::from([(0x7000, 0x7100), (0x7008, 0)]));

        let frames: Vec<_> = FrameWalker::new(&modules, memory, registers(0x400100, 0x6ff0, 0x7000)).collect();
        assert_eq!(pcs(&frames), vec![(0x400100, true)]);
    }

    #[test]
    fn test_missing_frame_pointer_ends_stack()
    {
        let modules = ModuleMap::from_mappings(Vec::new(), DebugInfoConfig::default());
        let memory = FakeMemory(HashMap::new());

        let frames: Vec<_> = FrameWalker::new(&modules, memory, registers(0x400100, 0x6ff0, 0)).collect();
        assert_eq!(pcs(&frames), vec![(0x400100, true)]);
    }

    fn continues(step: &Step) -> bool
    {
        matches!(step, Step::Continue { .. })
    }

    fn caller(pc: u64, sp: u64, activation: bool) -> Step
    {
        Step::Continue {
            registers: registers(pc, sp, 0),
            activation,
        }
    }

    #[test]
    fn test_stack_pointer_must_grow()
    {
        let current = registers(0x401000, 0x7000, 0);
        assert!(continues(&check_progress(&current, caller(0x402000, 0x7100, false))));
        assert!(!continues(&check_progress(&current, caller(0x402000, 0x7000, false))));
        assert!(!continues(&check_progress(&current, caller(0x402000, 0x6f00, false))));
    }

    #[test]
    fn test_two_frame_cycle_stops()
    {
        // A calls B calls A, with the unwind info of B pointing back into A's frame.
        let a = registers(0x401000, 0x7000, 0);
        let step = check_progress(&a, caller(0x402000, 0x7100, false));
        let Step::Continue { registers: b, .. } = step else {
            panic!("first step should continue");
        };
        assert!(!continues(&check_progress(&b, caller(0x401000, 0x7000, false))));
    }

    #[test]
    fn test_signal_frame_may_switch_stacks()
    {
        let handler = registers(0x7fff_0000, 0x9000, 0);
        assert!(continues(&check_progress(&handler, caller(0x401000, 0x7000, true))));
        assert!(!continues(&check_progress(&handler, caller(0x7fff_0000, 0x9000, true))));
    }

    #[test]
    fn test_frame_pointer_loop_stops()
    {
        let modules = ModuleMap::from_mappings(Vec::new(), DebugInfoConfig::default());
        // The saved frame pointer points back at itself.
        let memory = FakeMemory(HashMap::from([(0x7000, 0x7000), (0x7008, 0x401234)]));

        let frames: Vec<_> = FrameWalker::new(&modules, memory, registers(0x400100, 0x6ff0, 0x7000)).collect();
        assert_eq!(pcs(&frames), vec![(0x400100, true), (0x401234, false)]);
    }
}
