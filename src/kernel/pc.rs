use super::context::RegisterAccess;
use crate::const_values::INSTRUCTION_WIDTH;
use crate::machine::registers::{NEXT_PC_REG, PC_REG, PREV_PC_REG};

/// 推进 PC 三元组：PrevPC <- PC, PC <- NextPC, NextPC <- NextPC + 4
///
/// 只在系统调用处理完成后调用一次，否则用户程序会反复执行同一条 syscall
pub fn advance_program_counter<R: RegisterAccess + ?Sized>(regs: &mut R) {
    let pc = regs.read_register(PC_REG);
    let next_pc = regs.read_register(NEXT_PC_REG);
    regs.write_register(PREV_PC_REG, pc);
    regs.write_register(PC_REG, next_pc);
    regs.write_register(NEXT_PC_REG, next_pc.wrapping_add(INSTRUCTION_WIDTH));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::RegisterFile;

    impl RegisterAccess for RegisterFile {
        fn read_register(&self, reg: usize) -> i32 {
            self.read(reg)
        }

        fn write_register(&mut self, reg: usize, value: i32) {
            self.write(reg, value)
        }
    }

    #[test]
    fn advances_triple() {
        let mut regs = RegisterFile::new(0x200);
        advance_program_counter(&mut regs);
        assert_eq!(regs.read(PREV_PC_REG), 0x200);
        assert_eq!(regs.read(PC_REG), 0x204);
        assert_eq!(regs.read(NEXT_PC_REG), 0x208);

        advance_program_counter(&mut regs);
        assert_eq!(regs.read(PREV_PC_REG), 0x204);
        assert_eq!(regs.read(PC_REG), 0x208);
        assert_eq!(regs.read(NEXT_PC_REG), 0x20c);
    }

    #[test]
    fn follows_pending_branch_target() {
        // NextPC 已被分支指令改写
        let mut regs = RegisterFile::new(0x10);
        regs.write(NEXT_PC_REG, 0x80);
        advance_program_counter(&mut regs);
        assert_eq!(regs.read(PC_REG), 0x80);
        assert_eq!(regs.read(NEXT_PC_REG), 0x84);
    }
}
