//! 模拟机器：寄存器文件、物理内存、地址转换与中断控制
//!
//! 内核只通过 `kernel::context` 中的 trait 访问这里

mod exception;
mod memory;
pub mod registers;
mod translate;

pub use exception::{ExceptionType, ParseExceptionError};
pub use memory::{Memory, MemoryError};
pub use registers::RegisterFile;
pub use translate::{PageTable, TranslateError, TranslationEntry};

use crate::const_values::MachineConfig;
use crate::kernel::{Interrupt, RegisterAccess, UserMemory};
use registers::BAD_VADDR_REG;
use tracing::{debug, info, warn};

/// 用户内存访问产生、尚未投递的异常
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingException {
    pub kind: ExceptionType,
    pub bad_vaddr: i32,
}

/// 模拟机器
#[derive(Debug)]
pub struct SimMachine {
    registers: RegisterFile,
    memory: Memory,
    page_table: PageTable,
    pending: Option<PendingException>,
    halted: bool,
    halt_count: usize,
}

impl SimMachine {
    /// 按配置创建机器，页表为恒等映射
    pub fn new(config: &MachineConfig) -> Result<Self, MemoryError> {
        let memory = Memory::new(config.page_size, config.num_phys_pages)?;
        let page_table = PageTable::identity(config.page_size, memory.num_pages() as u32);
        info!(
            page_size = config.page_size,
            num_pages = config.num_phys_pages,
            boot_pc = config.boot_pc,
            "创建模拟机器"
        );
        Ok(Self {
            registers: RegisterFile::new(config.boot_pc),
            memory,
            page_table,
            pending: None,
            halted: false,
            halt_count: 0,
        })
    }

    #[inline(always)]
    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn page_table_mut(&mut self) -> &mut PageTable {
        &mut self.page_table
    }

    /// 把虚拟页标记为只读
    pub fn set_read_only(&mut self, vpn: u32) -> bool {
        self.page_table.set_read_only(vpn, true)
    }

    /// 装载用户数据，忽略只读标志
    pub fn load(&mut self, vaddr: i32, data: &[u8]) -> Result<(), TranslateError> {
        for (i, &byte) in data.iter().enumerate() {
            let addr = vaddr.wrapping_add(i as i32);
            let paddr = self.page_table.translate(addr, false, self.memory.size())?;
            self.memory
                .write_byte(paddr, byte)
                .map_err(|_| TranslateError::BusError { vaddr: addr, paddr })?;
        }
        debug!(vaddr, len = data.len(), "装载用户数据");
        Ok(())
    }

    /// 取出待投递的异常
    pub fn take_pending_exception(&mut self) -> Option<PendingException> {
        self.pending.take()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// 停机请求次数
    pub fn halt_count(&self) -> usize {
        self.halt_count
    }

    /// 记录转换失败，只保留第一个
    fn raise(&mut self, err: TranslateError) {
        warn!(error = %err, "用户内存访问失败");
        self.registers.write(BAD_VADDR_REG, err.vaddr());
        if self.pending.is_none() {
            self.pending = Some(PendingException {
                kind: err.exception_type(),
                bad_vaddr: err.vaddr(),
            });
        }
    }

    fn translate(&mut self, addr: i32, writing: bool) -> Option<usize> {
        match self.page_table.translate(addr, writing, self.memory.size()) {
            Ok(paddr) => Some(paddr),
            Err(err) => {
                self.raise(err);
                None
            }
        }
    }
}

impl RegisterAccess for SimMachine {
    #[inline(always)]
    fn read_register(&self, reg: usize) -> i32 {
        self.registers.read(reg)
    }

    #[inline(always)]
    fn write_register(&mut self, reg: usize, value: i32) {
        self.registers.write(reg, value)
    }
}

impl UserMemory for SimMachine {
    fn read_mem(&mut self, addr: i32) -> u8 {
        let Some(paddr) = self.translate(addr, false) else {
            return 0;
        };
        match self.memory.read_byte(paddr) {
            Ok(byte) => byte,
            Err(_) => {
                self.raise(TranslateError::BusError { vaddr: addr, paddr });
                0
            }
        }
    }

    fn write_mem(&mut self, addr: i32, value: u8) {
        let Some(paddr) = self.translate(addr, true) else {
            return;
        };
        if self.memory.write_byte(paddr, value).is_err() {
            self.raise(TranslateError::BusError { vaddr: addr, paddr });
        }
    }
}

impl Interrupt for SimMachine {
    fn halt(&mut self) {
        info!("机器停机");
        self.halted = true;
        self.halt_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::const_values::KernelConfig;

    fn machine() -> SimMachine {
        SimMachine::new(&KernelConfig::default().machine).unwrap()
    }

    #[test]
    fn load_and_read_back() {
        let mut m = machine();
        m.load(0x40, b"hi\0").unwrap();
        assert_eq!(m.read_mem(0x40), b'h');
        assert_eq!(m.read_mem(0x41), b'i');
        assert_eq!(m.read_mem(0x42), 0);
        assert!(m.take_pending_exception().is_none());
    }

    #[test]
    fn out_of_range_read_is_recorded() {
        let mut m = machine();
        assert_eq!(m.read_mem(-4), 0);
        assert_eq!(m.read_mem(1 << 20), 0);
        assert_eq!(m.read_register(BAD_VADDR_REG), 1 << 20);
        // 只保留第一个异常
        assert_eq!(
            m.take_pending_exception(),
            Some(PendingException {
                kind: ExceptionType::AddressError,
                bad_vaddr: -4
            })
        );
        assert!(m.take_pending_exception().is_none());
    }

    #[test]
    fn write_to_read_only_page_is_dropped() {
        let mut m = machine();
        m.load(0x80, b"x").unwrap();
        assert!(m.set_read_only(1));
        m.write_mem(0x80, b'y');
        assert_eq!(m.read_mem(0x80), b'x');
        assert_eq!(
            m.take_pending_exception().map(|p| p.kind),
            Some(ExceptionType::ReadOnly)
        );
    }

    #[test]
    fn unmapped_page_faults() {
        let mut m = machine();
        m.page_table_mut().unmap(0);
        m.write_mem(4, 1);
        assert_eq!(
            m.take_pending_exception().map(|p| p.kind),
            Some(ExceptionType::PageFault)
        );
    }

    #[test]
    fn halt_sets_flag() {
        let mut m = machine();
        assert!(!m.is_halted());
        m.halt();
        assert!(m.is_halted());
        assert_eq!(m.halt_count(), 1);
    }
}
