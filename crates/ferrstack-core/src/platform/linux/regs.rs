//! Kernel register layouts mapped to DWARF register numbers.

use crate::types::{Address, Architecture, Registers};

/// DWARF number of each `user_regs_struct` slot on x86_64, `None` for slots
/// the unwinder never needs.
const X86_64_USER_REGS: [Option<u16>; 20] = [
    Some(15), // r15
    Some(14), // r14
    Some(13), // r13
    Some(12), // r12
    Some(6),  // rbp
    Some(3),  // rbx
    Some(11), // r11
    Some(10), // r10
    Some(9),  // r9
    Some(8),  // r8
    Some(0),  // rax
    Some(2),  // rcx
    Some(1),  // rdx
    Some(4),  // rsi
    Some(5),  // rdi
    None,     // orig_rax
    None,     // rip
    None,     // cs
    None,     // eflags
    Some(7),  // rsp
];

const X86_64_RIP_SLOT: usize = 16;

/// `x0`..`x30`, `sp`, then `pc`.
const AARCH64_PC_SLOT: usize = 32;

/// Registers from the words of an x86_64 `user_regs_struct`.
pub(crate) fn x86_64_registers(words: &[u64]) -> Option<Registers>
{
    if words.len() <= X86_64_USER_REGS.len() {
        return None;
    }
    let mut registers = Registers::new(Architecture::X86_64);
    for (slot, number) in X86_64_USER_REGS.iter().enumerate() {
        if let Some(number) = number {
            registers = registers.with(*number, words[slot]);
        }
    }
    registers.set_pc(Address::new(words[X86_64_RIP_SLOT]));
    Some(registers)
}

/// Registers from the words of an aarch64 `user_pt_regs`.
pub(crate) fn aarch64_registers(words: &[u64]) -> Option<Registers>
{
    if words.len() <= AARCH64_PC_SLOT {
        return None;
    }
    let mut registers = Registers::new(Architecture::Arm64);
    for (number, value) in (0u16..=31).zip(words) {
        registers = registers.with(number, *value);
    }
    registers.set_pc(Address::new(words[AARCH64_PC_SLOT]));
    Some(registers)
}

/// Word count of `pr_reg` in a prstatus note.
pub(crate) const fn user_regs_words(architecture: Architecture) -> usize
{
    match architecture {
        Architecture::X86_64 => 27,
        Architecture::Arm64 => 34,
    }
}
