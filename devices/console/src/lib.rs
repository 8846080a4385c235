//! 控制台设备实现
//!
//! - `StdConsole`: 绑定宿主机的 stdin/stdout
//! - `ScriptedConsole`: 预置输入、捕获输出，用于脚本回放和测试

use console_trait::{Console, ConsoleError};
use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

const NEWLINE: u8 = b'\n';

/// 按行读取到 `buf`，最多 `buf.len()` 字节
///
/// 换行符被消耗但不写入。恰好填满 `buf` 时，紧随其后的换行符也一并消耗，
/// 否则下一次读取会得到一个空行
fn read_line_into<R: BufRead>(input: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut count = 0;
    while count < buf.len() {
        let Some(&byte) = input.fill_buf()?.first() else {
            // EOF
            return Ok(count);
        };
        input.consume(1);
        if byte == NEWLINE {
            return Ok(count);
        }
        buf[count] = byte;
        count += 1;
    }
    if count > 0 && input.fill_buf()?.first() == Some(&NEWLINE) {
        input.consume(1);
    }
    Ok(count)
}

/// 宿主机标准输入输出控制台
pub struct StdConsole {
    name: String,
}

impl StdConsole {
    /// 创建新的标准控制台
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Default for StdConsole {
    fn default() -> Self {
        Self::new("stdio".to_string())
    }
}

impl Console for StdConsole {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConsoleError> {
        let stdin = io::stdin();
        read_line_into(&mut stdin.lock(), buf).map_err(|e| ConsoleError::Read(e.to_string()))
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), ConsoleError> {
        let mut out = io::stdout().lock();
        out.write_all(buf)
            .map_err(|e| ConsoleError::Write(format!("stdout 输出错误: {}", e)))?;
        out.flush()
            .map_err(|e| ConsoleError::Write(format!("stdout 刷新错误: {}", e)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 脚本控制台：输入来自预置字节序列，输出写入内部缓冲区
#[derive(Debug, Default)]
pub struct ScriptedConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
    /// 同时把输出转发到 stdout
    echo: bool,
}

impl ScriptedConsole {
    /// 使用给定输入创建控制台
    pub fn new(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            output: Vec::new(),
            echo: false,
        }
    }

    /// 输出同时回显到 stdout
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// 已捕获的全部输出
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// 取出并清空已捕获的输出
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// 剩余未读取的输入字节数
    pub fn remaining_input(&self) -> usize {
        self.input.len()
    }
}

impl Console for ScriptedConsole {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConsoleError> {
        read_line_into(&mut self.input, buf).map_err(|e| ConsoleError::Read(e.to_string()))
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), ConsoleError> {
        self.output.extend_from_slice(buf);
        if self.echo {
            let mut out = io::stdout().lock();
            out.write_all(buf)
                .and_then(|_| out.flush())
                .map_err(|e| ConsoleError::Write(e.to_string()))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
