//! 物理内存

use thiserror::Error;

/// 内存错误类型
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("内存访问越界: 地址 {addr:#x}, 大小 {size}")]
    OutOfBounds { addr: usize, size: usize },
    #[error("非法的内存配置: 页大小 {page_size}, 页数 {num_pages}")]
    InvalidLayout { page_size: usize, num_pages: usize },
}

/// 物理内存，按物理页帧划分
#[derive(Debug, Clone)]
pub struct Memory {
    /// 内存数据
    data: Vec<u8>,
    page_size: usize,
}

impl Memory {
    /// 创建新的内存实例
    pub fn new(page_size: usize, num_pages: usize) -> Result<Self, MemoryError> {
        let size = page_size.checked_mul(num_pages);
        match size {
            Some(size) if page_size.is_power_of_two() && size > 0 => Ok(Self {
                data: vec![0; size],
                page_size,
            }),
            _ => Err(MemoryError::InvalidLayout {
                page_size,
                num_pages,
            }),
        }
    }

    pub fn num_pages(&self) -> usize {
        self.data.len() / self.page_size
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 读取字节
    #[inline(always)]
    pub fn read_byte(&self, addr: usize) -> Result<u8, MemoryError> {
        self.data
            .get(addr)
            .copied()
            .ok_or(MemoryError::OutOfBounds { addr, size: 1 })
    }

    /// 写入字节
    #[inline(always)]
    pub fn write_byte(&mut self, addr: usize, value: u8) -> Result<(), MemoryError> {
        let slot = self
            .data
            .get_mut(addr)
            .ok_or(MemoryError::OutOfBounds { addr, size: 1 })?;
        *slot = value;
        Ok(())
    }
}
