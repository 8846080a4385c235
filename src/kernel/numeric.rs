//! 十进制整数的解析与格式化

use crate::const_values::MAX_INT_LEN;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIntError {
    #[error("只有负号，没有数字")]
    LoneSign,
    #[error("第 {index} 个字符 {byte:#04x} 不是数字")]
    InvalidDigit { index: usize, byte: u8 },
}

/// 解析可选前导 '-' 加十进制数字
///
/// 超出 i32 范围时按补码回绕，不做检查。空输入解析为 0
pub fn parse_decimal(input: &[u8]) -> Result<i32, ParseIntError> {
    let (negative, digits) = match input.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, input),
    };
    if negative && digits.is_empty() {
        return Err(ParseIntError::LoneSign);
    }

    let offset = input.len() - digits.len();
    let mut result: i32 = 0;
    for (i, &byte) in digits.iter().enumerate() {
        if !byte.is_ascii_digit() {
            return Err(ParseIntError::InvalidDigit {
                index: offset + i,
                byte,
            });
        }
        result = result
            .wrapping_mul(10)
            .wrapping_add(i32::from(byte - b'0'));
    }

    Ok(if negative { result.wrapping_neg() } else { result })
}

/// 低位在前的十进制数字，负数末尾追加 '-'
#[derive(Debug, Clone, Copy)]
pub struct DecimalDigits {
    buf: [u8; MAX_INT_LEN],
    len: usize,
}

impl DecimalDigits {
    /// 按生成顺序（低位在前）
    pub fn generated(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// 按输出顺序（高位在前）
    pub fn msb_first(&self) -> impl Iterator<Item = u8> + '_ {
        self.generated().iter().rev().copied()
    }
}

pub fn format_decimal(value: i32) -> DecimalDigits {
    let mut buf = [0u8; MAX_INT_LEN];
    let mut len = 0;
    // i32::MIN 的绝对值也能放进 u32
    let mut n = value.unsigned_abs();
    loop {
        buf[len] = b'0' + (n % 10) as u8;
        len += 1;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if value < 0 {
        buf[len] = b'-';
        len += 1;
    }
    DecimalDigits { buf, len }
}
