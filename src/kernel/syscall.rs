//! 系统调用号与各系统调用的处理函数
//!
//! 调用约定：r2 为调用号和返回值，r4..r7 为参数

use super::context::TrapContext;
use super::marshal::{KernelBuffer, KernelBufferError, copy_from_user, copy_to_user};
use super::numeric::{format_decimal, parse_decimal};
use crate::const_values::{ARG_REGS, MAX_INT_LEN, MAX_STRING_LEN, RESULT_REG};
use console_trait::ConsoleError;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MSG_SHUTDOWN: &str = "\n\n用户程序发起关机!\n";
pub const MSG_NOT_AN_INTEGER: &str = "\n你输入的不是整数!\n";
pub const MSG_READ_CHAR_FAILED: &str = "\n读取字符出错!\n";

/// 系统调用错误
#[derive(Debug, Error)]
pub enum SyscallError {
    #[error("内核缓冲区错误: {0}")]
    Buffer(#[from] KernelBufferError),
    #[error("控制台错误: {0}")]
    Console(#[from] ConsoleError),
    #[error("非法的长度参数: {0}")]
    InvalidLength(i32),
}

/// 系统调用号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyscallCode {
    Halt,
    ReadInt,
    PrintInt,
    ReadChar,
    PrintChar,
    ReadString,
    PrintString,
}

impl SyscallCode {
    pub const ALL: [SyscallCode; 7] = [
        Self::Halt,
        Self::ReadInt,
        Self::PrintInt,
        Self::ReadChar,
        Self::PrintChar,
        Self::ReadString,
        Self::PrintString,
    ];

    /// 精确匹配，未知调用号返回 None
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Halt),
            11 => Some(Self::ReadInt),
            12 => Some(Self::PrintInt),
            13 => Some(Self::ReadChar),
            14 => Some(Self::PrintChar),
            15 => Some(Self::ReadString),
            16 => Some(Self::PrintString),
            _ => None,
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            Self::Halt => 0,
            Self::ReadInt => 11,
            Self::PrintInt => 12,
            Self::ReadChar => 13,
            Self::PrintChar => 14,
            Self::ReadString => 15,
            Self::PrintString => 16,
        }
    }
}

impl fmt::Display for SyscallCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Halt => "Halt",
            Self::ReadInt => "ReadInt",
            Self::PrintInt => "PrintInt",
            Self::ReadChar => "ReadChar",
            Self::PrintChar => "PrintChar",
            Self::ReadString => "ReadString",
            Self::PrintString => "PrintString",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Error)]
#[error("无法识别的系统调用名称: {0}")]
pub struct ParseSyscallError(String);

/// 接受 snake_case 名称，如 `print_int`
impl FromStr for SyscallCode {
    type Err = ParseSyscallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "read_int" => Ok(Self::ReadInt),
            "print_int" => Ok(Self::PrintInt),
            "read_char" => Ok(Self::ReadChar),
            "print_char" => Ok(Self::PrintChar),
            "read_string" => Ok(Self::ReadString),
            "print_string" => Ok(Self::PrintString),
            _ => Err(ParseSyscallError(s.to_string())),
        }
    }
}

/// 处理函数结束后的去向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerFlow {
    /// 推进 PC，回到用户程序
    Return,
    /// 机器已停机，不再返回用户程序
    Halted,
}

type HandlerResult = Result<HandlerFlow, SyscallError>;

/// 执行调用号对应的处理函数
pub fn run_handler(code: SyscallCode, ctx: &mut TrapContext<'_>) -> HandlerResult {
    match code {
        SyscallCode::Halt => halt(ctx),
        SyscallCode::ReadInt => read_int(ctx),
        SyscallCode::PrintInt => print_int(ctx),
        SyscallCode::ReadChar => read_char(ctx),
        SyscallCode::PrintChar => print_char(ctx),
        SyscallCode::ReadString => read_string(ctx),
        SyscallCode::PrintString => print_string(ctx),
    }
}

fn arg(ctx: &TrapContext<'_>, n: usize) -> i32 {
    ctx.machine.read_register(ARG_REGS[n])
}

fn halt(ctx: &mut TrapContext<'_>) -> HandlerResult {
    info!("用户程序发起关机");
    ctx.print(MSG_SHUTDOWN);
    ctx.machine.halt();
    Ok(HandlerFlow::Halted)
}

fn read_int(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let mut buf = [0u8; MAX_INT_LEN];
    let len = ctx.console.read(&mut buf)?;

    // 成功和失败路径各只写一次 r2
    match parse_decimal(&buf[..len]) {
        Ok(value) => {
            debug!(value, "ReadInt");
            ctx.machine.write_register(RESULT_REG, value);
        }
        Err(e) => {
            warn!(error = %e, input = %String::from_utf8_lossy(&buf[..len]), "ReadInt 输入不是整数");
            ctx.diagnose(MSG_NOT_AN_INTEGER);
            ctx.machine.write_register(RESULT_REG, 0);
        }
    }
    Ok(HandlerFlow::Return)
}

fn print_int(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let value = arg(ctx, 0);
    let digits = format_decimal(value);
    for byte in digits.msb_first() {
        ctx.console.write(&[byte])?;
    }
    Ok(HandlerFlow::Return)
}

fn read_char(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let mut buf = [0u8; 1];
    let len = ctx.console.read(&mut buf)?;
    if len != 1 {
        // r2 保持原值
        warn!(len, "ReadChar 读取不足一个字节");
        ctx.diagnose(MSG_READ_CHAR_FAILED);
        return Ok(HandlerFlow::Return);
    }
    ctx.machine.write_register(RESULT_REG, i32::from(buf[0]));
    Ok(HandlerFlow::Return)
}

fn print_char(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let byte = arg(ctx, 0) as u8;
    ctx.console.write(&[byte])?;
    Ok(HandlerFlow::Return)
}

fn read_string(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let addr = arg(ctx, 0);
    let len = arg(ctx, 1);
    let max = usize::try_from(len).map_err(|_| SyscallError::InvalidLength(len))?;

    let mut buffer = KernelBuffer::zeroed(max + 1)?;
    let read = ctx.console.read(&mut buffer[..max])?;
    let written = copy_to_user(&mut *ctx.machine, addr, len, &buffer);
    debug!(
        addr,
        read,
        written,
        bytes = %hex::encode(&buffer[..read]),
        "ReadString"
    );
    drop(buffer);
    Ok(HandlerFlow::Return)
}

fn print_string(ctx: &mut TrapContext<'_>) -> HandlerResult {
    let addr = arg(ctx, 0);
    let buffer = copy_from_user(&mut *ctx.machine, addr, MAX_STRING_LEN)?;
    let len = buffer.text_len();
    debug!(addr, len, "PrintString");
    // 连同结束符一起输出
    ctx.console.write(&buffer[..=len])?;
    Ok(HandlerFlow::Return)
}
