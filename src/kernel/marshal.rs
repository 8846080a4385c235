//! 用户空间与内核缓冲区之间的数据搬运
//!
//! 所有访问都是经地址转换的单字节访问，转换失败由机器记录并在之后作为陷入投递，
//! 这里不做处理

use super::context::UserMemory;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KernelBufferError {
    #[error("内核缓冲区分配失败: {len} 字节")]
    Alloc { len: usize },
    #[error("内核缓冲区过大: {len} 字节, 上限 {max}")]
    TooLarge { len: usize, max: usize },
}

/// 内核缓冲区，由单次系统调用独占，用完即释放
#[derive(Debug)]
pub struct KernelBuffer {
    data: Vec<u8>,
}

impl KernelBuffer {
    /// 单个缓冲区的长度上限
    pub const MAX_LEN: usize = 1 << 20;

    /// 分配全零缓冲区，分配失败返回错误而不是空指针
    pub fn zeroed(len: usize) -> Result<Self, KernelBufferError> {
        if len > Self::MAX_LEN {
            return Err(KernelBufferError::TooLarge {
                len,
                max: Self::MAX_LEN,
            });
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| KernelBufferError::Alloc { len })?;
        data.resize(len, 0);
        Ok(Self { data })
    }

    /// 第一个 0 字节之前的长度
    pub fn text_len(&self) -> usize {
        self.data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len())
    }
}

impl Deref for KernelBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl DerefMut for KernelBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// 从用户空间拷贝以 0 结尾的字符串，最多 `max_len` 字节
///
/// 返回的缓冲区长度为 `max_len + 1`，总是以 0 结尾
pub fn copy_from_user<M: UserMemory + ?Sized>(
    mem: &mut M,
    addr: i32,
    max_len: usize,
) -> Result<KernelBuffer, KernelBufferError> {
    let len = max_len
        .checked_add(1)
        .ok_or(KernelBufferError::TooLarge {
            len: max_len,
            max: KernelBuffer::MAX_LEN,
        })?;
    let mut buf = KernelBuffer::zeroed(len)?;
    for i in 0..max_len {
        let byte = mem.read_mem(addr.wrapping_add(i as i32));
        buf[i] = byte;
        if byte == 0 {
            break;
        }
    }
    Ok(buf)
}

/// 把内核缓冲区写入用户空间
///
/// `len < 0` 返回 -1；`len == 0` 直接返回 0；否则逐字节写入，
/// 写满 `len` 字节或写完第一个 0 字节时停止，返回写入的字节数。
/// 超出 `buf` 末尾的部分视为 0
pub fn copy_to_user<M: UserMemory + ?Sized>(mem: &mut M, addr: i32, len: i32, buf: &[u8]) -> i32 {
    if len < 0 {
        return -1;
    }
    let mut written = 0;
    while written < len {
        let byte = buf.get(written as usize).copied().unwrap_or(0);
        mem.write_mem(addr.wrapping_add(written), byte);
        written += 1;
        if byte == 0 {
            break;
        }
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 记录访问次数的平坦内存
    struct FlatMemory {
        bytes: Vec<u8>,
        reads: usize,
        writes: usize,
    }

    impl FlatMemory {
        fn new(content: &[u8], size: usize) -> Self {
            let mut bytes = vec![0xee; size];
            bytes[..content.len()].copy_from_slice(content);
            Self {
                bytes,
                reads: 0,
                writes: 0,
            }
        }
    }

    impl UserMemory for FlatMemory {
        fn read_mem(&mut self, addr: i32) -> u8 {
            self.reads += 1;
            self.bytes[addr as usize]
        }

        fn write_mem(&mut self, addr: i32, value: u8) {
            self.writes += 1;
            self.bytes[addr as usize] = value;
        }
    }

    #[test]
    fn copy_from_user_short_string() {
        let mut mem = FlatMemory::new(b"hi\0zz", 16);
        let buf = copy_from_user(&mut mem, 0, 8).unwrap();
        assert_eq!(buf.len(), 9);
        assert_eq!(&buf[..3], b"hi\0");
        assert!(buf[3..].iter().all(|&b| b == 0));
        assert_eq!(buf.text_len(), 2);
        // 读到结束符即停止
        assert_eq!(mem.reads, 3);
    }

    #[test]
    fn copy_from_user_unterminated() {
        let mut mem = FlatMemory::new(b"abcdefgh", 16);
        let buf = copy_from_user(&mut mem, 0, 4).unwrap();
        assert_eq!(&*buf, b"abcd\0");
        assert_eq!(buf.text_len(), 4);
        assert_eq!(mem.reads, 4);
    }

    #[test]
    fn copy_from_user_zero_bound() {
        let mut mem = FlatMemory::new(b"abc", 4);
        let buf = copy_from_user(&mut mem, 0, 0).unwrap();
        assert_eq!(&*buf, b"\0");
        assert_eq!(mem.reads, 0);
    }

    #[test]
    fn copy_from_user_rejects_oversized_bound() {
        let mut mem = FlatMemory::new(b"", 1);
        let err = copy_from_user(&mut mem, 0, KernelBuffer::MAX_LEN).unwrap_err();
        assert_eq!(
            err,
            KernelBufferError::TooLarge {
                len: KernelBuffer::MAX_LEN + 1,
                max: KernelBuffer::MAX_LEN
            }
        );
    }

    #[test]
    fn copy_to_user_negative_and_zero() {
        let mut mem = FlatMemory::new(b"", 8);
        assert_eq!(copy_to_user(&mut mem, 0, -1, b"abc"), -1);
        assert_eq!(copy_to_user(&mut mem, 0, 0, b"abc"), 0);
        assert_eq!(mem.writes, 0);
    }

    #[test]
    fn copy_to_user_stops_after_terminator() {
        let mut mem = FlatMemory::new(b"", 8);
        assert_eq!(copy_to_user(&mut mem, 1, 6, b"ok\0xyz"), 3);
        assert_eq!(&mem.bytes[..5], &[0xee, b'o', b'k', 0, 0xee]);
    }

    #[test]
    fn copy_to_user_stops_at_length() {
        let mut mem = FlatMemory::new(b"", 8);
        assert_eq!(copy_to_user(&mut mem, 0, 3, b"abcdef\0"), 3);
        assert_eq!(&mem.bytes[..4], &[b'a', b'b', b'c', 0xee]);
    }

    #[test]
    fn copy_to_user_short_source_is_terminated() {
        let mut mem = FlatMemory::new(b"", 8);
        assert_eq!(copy_to_user(&mut mem, 0, 5, b"ab"), 3);
        assert_eq!(&mem.bytes[..4], &[b'a', b'b', 0, 0xee]);
    }

    #[test]
    fn zeroed_buffer() {
        let buf = KernelBuffer::zeroed(4).unwrap();
        assert_eq!(&*buf, &[0, 0, 0, 0]);
        assert!(KernelBuffer::zeroed(KernelBuffer::MAX_LEN + 1).is_err());
    }
}
