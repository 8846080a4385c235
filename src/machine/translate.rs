//! 虚拟地址转换

use super::exception::ExceptionType;
use rustc_hash::FxHashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("地址越出地址空间: {vaddr:#x}")]
    AddressError { vaddr: i32 },
    #[error("缺页: {vaddr:#x}")]
    PageFault { vaddr: i32 },
    #[error("写只读页: {vaddr:#x}")]
    ReadOnly { vaddr: i32 },
    #[error("无效的物理地址: 虚拟地址 {vaddr:#x} -> 物理地址 {paddr:#x}")]
    BusError { vaddr: i32, paddr: usize },
}

impl TranslateError {
    /// 该错误作为陷入投递时的异常类型
    pub fn exception_type(&self) -> ExceptionType {
        match self {
            Self::AddressError { .. } => ExceptionType::AddressError,
            Self::PageFault { .. } => ExceptionType::PageFault,
            Self::ReadOnly { .. } => ExceptionType::ReadOnly,
            Self::BusError { .. } => ExceptionType::BusError,
        }
    }

    pub fn vaddr(&self) -> i32 {
        match self {
            Self::AddressError { vaddr }
            | Self::PageFault { vaddr }
            | Self::ReadOnly { vaddr }
            | Self::BusError { vaddr, .. } => *vaddr,
        }
    }
}

/// 页表项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    pub virtual_page: u32,
    pub physical_page: u32,
    pub valid: bool,
    pub read_only: bool,
    /// 被访问过
    pub used: bool,
    /// 被写过
    pub dirty: bool,
}

impl TranslationEntry {
    pub fn new(virtual_page: u32, physical_page: u32) -> Self {
        Self {
            virtual_page,
            physical_page,
            valid: true,
            read_only: false,
            used: false,
            dirty: false,
        }
    }
}

/// 单地址空间页表
#[derive(Debug, Clone)]
pub struct PageTable {
    entries: FxHashMap<u32, TranslationEntry>,
    page_size: usize,
    /// 虚拟地址空间页数
    num_pages: u32,
}

impl PageTable {
    /// 创建空页表
    pub fn new(page_size: usize, num_pages: u32) -> Self {
        Self {
            entries: FxHashMap::default(),
            page_size,
            num_pages,
        }
    }

    /// 虚拟页与物理页一一对应的页表
    pub fn identity(page_size: usize, num_pages: u32) -> Self {
        let mut table = Self::new(page_size, num_pages);
        for vpn in 0..num_pages {
            table.map(TranslationEntry::new(vpn, vpn));
        }
        table
    }

    pub fn map(&mut self, entry: TranslationEntry) -> Option<TranslationEntry> {
        self.entries.insert(entry.virtual_page, entry)
    }

    pub fn unmap(&mut self, vpn: u32) -> Option<TranslationEntry> {
        self.entries.remove(&vpn)
    }

    pub fn get(&self, vpn: u32) -> Option<&TranslationEntry> {
        self.entries.get(&vpn)
    }

    /// 设置只读标志，页不存在时返回 false
    pub fn set_read_only(&mut self, vpn: u32, read_only: bool) -> bool {
        match self.entries.get_mut(&vpn) {
            Some(entry) => {
                entry.read_only = read_only;
                true
            }
            None => false,
        }
    }

    /// 转换虚拟地址，`phys_size` 为物理内存字节数
    pub fn translate(
        &mut self,
        vaddr: i32,
        writing: bool,
        phys_size: usize,
    ) -> Result<usize, TranslateError> {
        if vaddr < 0 {
            return Err(TranslateError::AddressError { vaddr });
        }
        let addr = vaddr as usize;
        let vpn = addr / self.page_size;
        let offset = addr % self.page_size;
        if vpn >= self.num_pages as usize {
            return Err(TranslateError::AddressError { vaddr });
        }

        let entry = self
            .entries
            .get_mut(&(vpn as u32))
            .filter(|entry| entry.valid)
            .ok_or(TranslateError::PageFault { vaddr })?;

        if writing && entry.read_only {
            return Err(TranslateError::ReadOnly { vaddr });
        }

        let paddr = entry.physical_page as usize * self.page_size + offset;
        if paddr >= phys_size {
            return Err(TranslateError::BusError { vaddr, paddr });
        }

        entry.used = true;
        if writing {
            entry.dirty = true;
        }
        Ok(paddr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 16;

    #[test]
    fn identity_translation() {
        let mut table = PageTable::identity(PAGE, 4);
        assert_eq!(table.translate(0x21, false, 64).unwrap(), 0x21);
        assert!(table.get(2).unwrap().used);
        assert!(!table.get(2).unwrap().dirty);
        table.translate(0x21, true, 64).unwrap();
        assert!(table.get(2).unwrap().dirty);
    }

    #[test]
    fn faults_map_to_exceptions() {
        let mut table = PageTable::identity(PAGE, 4);
        let err = table.translate(-1, false, 64).unwrap_err();
        assert_eq!(err.exception_type(), ExceptionType::AddressError);
        let err = table.translate(64, false, 64).unwrap_err();
        assert_eq!(err.exception_type(), ExceptionType::AddressError);

        table.unmap(1);
        let err = table.translate(16, false, 64).unwrap_err();
        assert_eq!(err.exception_type(), ExceptionType::PageFault);
        assert_eq!(err.vaddr(), 16);

        assert!(table.set_read_only(3, true));
        assert!(table.translate(48, false, 64).is_ok());
        let err = table.translate(48, true, 64).unwrap_err();
        assert_eq!(err.exception_type(), ExceptionType::ReadOnly);
    }

    #[test]
    fn bus_error_outside_physical_memory() {
        let mut table = PageTable::new(PAGE, 4);
        table.map(TranslationEntry::new(0, 9));
        let err = table.translate(3, false, 64).unwrap_err();
        assert_eq!(err, TranslateError::BusError { vaddr: 3, paddr: 9 * 16 + 3 });
        assert_eq!(err.exception_type(), ExceptionType::BusError);
    }
}
