//! 陷入脚本
//!
//! CPU 模拟器不在本仓库内，驱动程序通过 TOML 脚本回放一串陷入：
//!
//! ```toml
//! input = "42\n"
//! readonly_pages = [7]
//!
//! [[segment]]
//! addr = 0x100
//! text = "hi"
//!
//! [[trap]]
//! syscall = "print_string"
//! args = [0x100]
//! ```

use crate::kernel::SyscallCode;
use crate::machine::ExceptionType;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("无法识别的异常: {0}")]
    UnknownException(String),
    #[error("无法识别的系统调用: {0}")]
    UnknownSyscall(String),
    #[error("段 {addr:#x} 必须且只能指定 text 或 hex 之一")]
    SegmentContent { addr: i32 },
    #[error("十六进制数据解析失败: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("参数过多: {0} 个, 最多 4 个")]
    TooManyArgs(usize),
}

/// 预先装入用户内存的数据
#[derive(Deserialize, Debug, Clone)]
pub struct Segment {
    pub addr: i32,
    pub text: Option<String>,
    pub hex: Option<String>,
    /// 末尾追加 0
    #[serde(default = "default_true")]
    pub terminate: bool,
}

impl Segment {
    pub fn bytes(&self) -> Result<Vec<u8>, ScriptError> {
        let mut data = match (&self.text, &self.hex) {
            (Some(text), None) => text.as_bytes().to_vec(),
            (None, Some(hex)) => hex::decode(hex.trim())?,
            _ => return Err(ScriptError::SegmentContent { addr: self.addr }),
        };
        if self.terminate {
            data.push(0);
        }
        Ok(data)
    }
}

/// 一次陷入
#[derive(Deserialize, Debug, Clone)]
pub struct TrapStep {
    #[serde(default = "default_exception")]
    pub exception: String,
    /// 调用号名称或编号，只对系统调用有效
    pub syscall: Option<String>,
    #[serde(default)]
    pub args: Vec<i32>,
}

impl TrapStep {
    pub fn exception_type(&self) -> Result<ExceptionType, ScriptError> {
        self.exception
            .parse()
            .map_err(|_| ScriptError::UnknownException(self.exception.clone()))
    }

    /// 原始调用号，未知编号原样保留
    pub fn syscall_code(&self) -> Result<Option<i32>, ScriptError> {
        let Some(name) = &self.syscall else {
            return Ok(None);
        };
        if let Ok(raw) = name.trim().parse::<i32>() {
            return Ok(Some(raw));
        }
        name.parse::<SyscallCode>()
            .map(|code| Some(code.raw()))
            .map_err(|_| ScriptError::UnknownSyscall(name.clone()))
    }

    pub fn checked_args(&self) -> Result<&[i32], ScriptError> {
        if self.args.len() > 4 {
            return Err(ScriptError::TooManyArgs(self.args.len()));
        }
        Ok(&self.args)
    }
}

fn default_exception() -> String {
    "syscall".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct TrapScript {
    /// 控制台输入，缺省时使用 stdin
    pub input: Option<String>,
    #[serde(default)]
    pub readonly_pages: Vec<u32>,
    #[serde(default, rename = "segment")]
    pub segments: Vec<Segment>,
    #[serde(default, rename = "trap")]
    pub traps: Vec<TrapStep>,
}

impl TrapScript {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<TrapScript> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取陷入脚本: {:?}", &path.as_ref().as_os_str()))?;
        let script: TrapScript = toml::from_str(&toml_str)
            .with_context(|| format!("无法解析陷入脚本: {:?}", &path.as_ref().as_os_str()))?;
        anyhow::Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_script() {
        let script: TrapScript = toml::from_str(
            r#"
            input = "7\n"

            [[segment]]
            addr = 256
            text = "hi"

            [[segment]]
            addr = 512
            hex = "414243"
            terminate = false

            [[trap]]
            syscall = "print_string"
            args = [256]

            [[trap]]
            syscall = "99"

            [[trap]]
            exception = "page_fault"
            "#,
        )
        .unwrap();
        assert_eq!(script.input.as_deref(), Some("7\n"));
        assert_eq!(script.segments[0].bytes().unwrap(), b"hi\0".to_vec());
        assert_eq!(script.segments[1].bytes().unwrap(), b"ABC".to_vec());
        assert_eq!(script.traps[0].exception_type().unwrap(), ExceptionType::Syscall);
        assert_eq!(script.traps[0].syscall_code().unwrap(), Some(16));
        assert_eq!(script.traps[1].syscall_code().unwrap(), Some(99));
        assert_eq!(script.traps[2].exception_type().unwrap(), ExceptionType::PageFault);
        assert_eq!(script.traps[2].syscall_code().unwrap(), None);
    }

    #[test]
    fn invalid_entries() {
        let seg = Segment {
            addr: 0,
            text: Some("a".into()),
            hex: Some("61".into()),
            terminate: true,
        };
        assert!(matches!(seg.bytes(), Err(ScriptError::SegmentContent { addr: 0 })));

        let seg = Segment {
            addr: 0,
            text: None,
            hex: Some("zz".into()),
            terminate: true,
        };
        assert!(matches!(seg.bytes(), Err(ScriptError::Hex(_))));

        let step = TrapStep {
            exception: "syscall".into(),
            syscall: Some("fork".into()),
            args: vec![1, 2, 3, 4, 5],
        };
        assert!(matches!(step.syscall_code(), Err(ScriptError::UnknownSyscall(_))));
        assert!(matches!(step.checked_args(), Err(ScriptError::TooManyArgs(5))));
    }
}
