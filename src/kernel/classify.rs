//! 异常分类

use crate::machine::ExceptionType;
use thiserror::Error;

/// 不可恢复的 CPU 异常，每种都有独立的诊断信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FatalFault {
    #[error("PageFaultException: 找不到有效的地址转换!")]
    PageFault,
    #[error("ReadOnlyException: 试图写入标记为只读的页!")]
    ReadOnly,
    #[error("BusErrorException: 地址转换得到了无效的物理地址!")]
    BusError,
    #[error("AddressErrorException: 未对齐的访问或超出地址空间末尾!")]
    AddressError,
    #[error("OverflowException: 加减法整数溢出!")]
    Overflow,
    #[error("IllegalInstrException: 未实现或保留的指令!")]
    IllegalInstr,
    #[error("NumExceptionTypes: 出现了异常类型数量哨兵!")]
    NumExceptionTypes,
    #[error("UnknownException: 无法识别的异常类型 {0}!")]
    Unrecognized(i32),
}

/// 陷入的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapClass {
    /// 没有异常，直接返回
    Ignore,
    /// 系统调用，按 r2 分派
    Syscall,
    /// 停机
    Fatal(FatalFault),
}

pub fn classify(kind: ExceptionType) -> TrapClass {
    match kind {
        ExceptionType::NoException => TrapClass::Ignore,
        ExceptionType::Syscall => TrapClass::Syscall,
        ExceptionType::PageFault => TrapClass::Fatal(FatalFault::PageFault),
        ExceptionType::ReadOnly => TrapClass::Fatal(FatalFault::ReadOnly),
        ExceptionType::BusError => TrapClass::Fatal(FatalFault::BusError),
        ExceptionType::AddressError => TrapClass::Fatal(FatalFault::AddressError),
        ExceptionType::Overflow => TrapClass::Fatal(FatalFault::Overflow),
        ExceptionType::IllegalInstr => TrapClass::Fatal(FatalFault::IllegalInstr),
        ExceptionType::NumExceptionTypes => TrapClass::Fatal(FatalFault::NumExceptionTypes),
        ExceptionType::Unrecognized(raw) => TrapClass::Fatal(FatalFault::Unrecognized(raw)),
    }
}
