//! CPU register snapshots, indexed by DWARF register number.

use gimli::Register;

use super::Address;

/// CPU architecture of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture
{
    /// x86-64 (AMD64)
    X86_64,
    /// ARM64 (AArch64)
    Arm64,
}

impl Architecture
{
    /// Architecture of the machine ferrstack runs on, if supported.
    #[must_use]
    pub const fn host() -> Option<Self>
    {
        if cfg!(target_arch = "x86_64") {
            Some(Architecture::X86_64)
        } else if cfg!(target_arch = "aarch64") {
            Some(Architecture::Arm64)
        } else {
            None
        }
    }

    /// DWARF column holding the return address.
    #[must_use]
    pub const fn return_address_register(self) -> Register
    {
        match self {
            Architecture::X86_64 => gimli::X86_64::RA,
            Architecture::Arm64 => gimli::AArch64::X30,
        }
    }

    /// DWARF number of the stack pointer.
    #[must_use]
    pub const fn stack_pointer_register(self) -> Register
    {
        match self {
            Architecture::X86_64 => gimli::X86_64::RSP,
            Architecture::Arm64 => gimli::AArch64::SP,
        }
    }

    /// DWARF number of the frame pointer.
    #[must_use]
    pub const fn frame_pointer_register(self) -> Register
    {
        match self {
            Architecture::X86_64 => gimli::X86_64::RBP,
            Architecture::Arm64 => gimli::AArch64::X29,
        }
    }

    /// Registers a callee must preserve; the unwinder carries these across frames.
    #[must_use]
    pub fn callee_saved(self) -> &'static [u16]
    {
        match self {
            // rbx, rbp, r12-r15
            Architecture::X86_64 => &[3, 6, 12, 13, 14, 15],
            // x19-x29
            Architecture::Arm64 => &[19, 20, 21, 22, 23, 24, 25, 26, 27, 28, 29],
        }
    }

    /// Width of a pointer in bytes.
    #[must_use]
    pub const fn pointer_size(self) -> u8
    {
        8
    }
}

/// Number of DWARF register slots tracked per frame.
const REGISTER_SLOTS: usize = 33;

/// Register state of one frame.
///
/// Values are indexed by DWARF register number. A `None` slot is a register
/// whose value is not known in this frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers
{
    architecture: Architecture,
    pc: Address,
    values: [Option<u64>; REGISTER_SLOTS],
}

impl Registers
{
    /// Empty register set for an architecture.
    #[must_use]
    pub fn new(architecture: Architecture) -> Self
    {
        Self {
            architecture,
            pc: Address::ZERO,
            values: [None; REGISTER_SLOTS],
        }
    }

    /// Architecture these registers belong to.
    #[must_use]
    pub const fn architecture(&self) -> Architecture
    {
        self.architecture
    }

    /// Program counter.
    #[must_use]
    pub const fn pc(&self) -> Address
    {
        self.pc
    }

    /// Set the program counter.
    pub fn set_pc(&mut self, pc: Address)
    {
        self.pc = pc;
    }

    /// Stack pointer, if known.
    #[must_use]
    pub fn sp(&self) -> Option<u64>
    {
        self.get(self.architecture.stack_pointer_register())
    }

    /// Frame pointer, if known.
    #[must_use]
    pub fn fp(&self) -> Option<u64>
    {
        self.get(self.architecture.frame_pointer_register())
    }

    /// Value of a DWARF register.
    #[must_use]
    pub fn get(&self, register: Register) -> Option<u64>
    {
        self.values.get(usize::from(register.0)).copied().flatten()
    }

    /// Set (or clear) a DWARF register. Out of range numbers are ignored.
    pub fn set(&mut self, register: Register, value: Option<u64>)
    {
        if let Some(slot) = self.values.get_mut(usize::from(register.0)) {
            *slot = value;
        }
    }

    /// Builder-style setter used when loading thread state.
    #[must_use]
    pub fn with(mut self, register: u16, value: u64) -> Self
    {
        self.set(Register(register), Some(value));
        self
    }
}
