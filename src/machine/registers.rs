//! 寄存器文件

use std::fmt;

pub const NUM_GP_REGS: usize = 32;
pub const STACK_REG: usize = 29;
pub const RET_ADDR_REG: usize = 31;
pub const HI_REG: usize = 32;
pub const LO_REG: usize = 33;
pub const PC_REG: usize = 34;
pub const NEXT_PC_REG: usize = 35;
pub const PREV_PC_REG: usize = 36;
pub const LOAD_REG: usize = 37;
pub const LOAD_VALUE_REG: usize = 38;
pub const BAD_VADDR_REG: usize = 39;
pub const NUM_TOTAL_REGS: usize = 40;

/// 32 个通用寄存器加上 Hi/Lo、PC 三元组、延迟加载和 BadVAddr
#[derive(Debug, Clone)]
pub struct RegisterFile {
    slots: [i32; NUM_TOTAL_REGS],
}

impl RegisterFile {
    pub fn new(boot_pc: i32) -> Self {
        let mut slots = [0; NUM_TOTAL_REGS];
        slots[PC_REG] = boot_pc;
        slots[NEXT_PC_REG] = boot_pc.wrapping_add(4);
        Self { slots }
    }

    /// 读取寄存器，`reg` 越界属于调用方逻辑错误
    #[inline(always)]
    pub fn read(&self, reg: usize) -> i32 {
        self.slots[reg]
    }

    #[inline(always)]
    pub fn write(&mut self, reg: usize, value: i32) {
        self.slots[reg] = value;
    }

    pub fn pc(&self) -> i32 {
        self.slots[PC_REG]
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new(0)
    }
}

/// MIPS 寄存器别名
fn get_register_alias(reg: usize) -> &'static str {
    match reg {
        0 => "zero",
        1 => "at",
        2 | 3 => "v",
        4..=7 => "a",
        8..=15 | 24 | 25 => "t",
        16..=23 => "s",
        26 | 27 => "k",
        28 => "gp",
        STACK_REG => "sp",
        30 => "s8/fp",
        RET_ADDR_REG => "ra",
        HI_REG => "hi",
        LO_REG => "lo",
        PC_REG => "pc",
        NEXT_PC_REG => "npc",
        PREV_PC_REG => "ppc",
        LOAD_REG => "load",
        LOAD_VALUE_REG => "loadv",
        BAD_VADDR_REG => "badva",
        _ => "unknown",
    }
}

impl fmt::Display for RegisterFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== CPU State ===")?;
        writeln!(
            f,
            "PC: 0x{:08x}  NextPC: 0x{:08x}  PrevPC: 0x{:08x}",
            self.slots[PC_REG], self.slots[NEXT_PC_REG], self.slots[PREV_PC_REG]
        )?;
        writeln!(f)?;

        writeln!(f, "Registers:")?;
        for i in 0..NUM_GP_REGS {
            writeln!(
                f,
                "  r{:2}({:>5}): 0x{:08x} ({})",
                i,
                get_register_alias(i),
                self.slots[i],
                self.slots[i]
            )?;
        }
        for i in NUM_GP_REGS..NUM_TOTAL_REGS {
            if i == PC_REG || i == NEXT_PC_REG || i == PREV_PC_REG {
                continue;
            }
            writeln!(f, "  {:>9}: 0x{:08x}", get_register_alias(i), self.slots[i])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_pc_sets_triple() {
        let regs = RegisterFile::new(0x100);
        assert_eq!(regs.pc(), 0x100);
        assert_eq!(regs.read(NEXT_PC_REG), 0x104);
        assert_eq!(regs.read(PREV_PC_REG), 0);
    }

    #[test]
    fn display_contains_aliases() {
        let mut regs = RegisterFile::default();
        regs.write(2, 12);
        let dump = regs.to_string();
        assert!(dump.contains("r 2(    v): 0x0000000c (12)"));
        assert!(dump.contains("badva"));
    }
}
