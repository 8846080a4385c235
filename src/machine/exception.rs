//! 异常类型定义

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// CPU 陷入时携带的异常类型
///
/// 编号与课程机器的 `ExceptionType` 一致；超出范围的原始值保留为 `Unrecognized`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExceptionType {
    #[default]
    NoException,
    Syscall,
    PageFault,
    ReadOnly,
    BusError,
    AddressError,
    Overflow,
    IllegalInstr,
    /// 异常类型数量的哨兵值
    NumExceptionTypes,
    Unrecognized(i32),
}

#[derive(Debug, Error)]
#[error("无法识别的异常名称: {0}")]
pub struct ParseExceptionError(String);

impl ExceptionType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::NoException,
            1 => Self::Syscall,
            2 => Self::PageFault,
            3 => Self::ReadOnly,
            4 => Self::BusError,
            5 => Self::AddressError,
            6 => Self::Overflow,
            7 => Self::IllegalInstr,
            8 => Self::NumExceptionTypes,
            other => Self::Unrecognized(other),
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            Self::NoException => 0,
            Self::Syscall => 1,
            Self::PageFault => 2,
            Self::ReadOnly => 3,
            Self::BusError => 4,
            Self::AddressError => 5,
            Self::Overflow => 6,
            Self::IllegalInstr => 7,
            Self::NumExceptionTypes => 8,
            Self::Unrecognized(raw) => *raw,
        }
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoException => write!(f, "NoException"),
            Self::Syscall => write!(f, "SyscallException"),
            Self::PageFault => write!(f, "PageFaultException"),
            Self::ReadOnly => write!(f, "ReadOnlyException"),
            Self::BusError => write!(f, "BusErrorException"),
            Self::AddressError => write!(f, "AddressErrorException"),
            Self::Overflow => write!(f, "OverflowException"),
            Self::IllegalInstr => write!(f, "IllegalInstrException"),
            Self::NumExceptionTypes => write!(f, "NumExceptionTypes"),
            Self::Unrecognized(raw) => write!(f, "Exception({})", raw),
        }
    }
}

/// 接受 snake_case 名称或原始编号，例如 `page_fault` 或 `2`
impl FromStr for ExceptionType {
    type Err = ParseExceptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if let Ok(raw) = name.parse::<i32>() {
            return Ok(Self::from_raw(raw));
        }
        match name.to_ascii_lowercase().as_str() {
            "no_exception" | "none" => Ok(Self::NoException),
            "syscall" => Ok(Self::Syscall),
            "page_fault" => Ok(Self::PageFault),
            "read_only" => Ok(Self::ReadOnly),
            "bus_error" => Ok(Self::BusError),
            "address_error" => Ok(Self::AddressError),
            "overflow" => Ok(Self::Overflow),
            "illegal_instr" => Ok(Self::IllegalInstr),
            "num_exception_types" => Ok(Self::NumExceptionTypes),
            _ => Err(ParseExceptionError(s.to_string())),
        }
    }
}
