//! 陷入上下文：内核访问机器和控制台的显式依赖

use console_trait::Console;
use tracing::warn;

/// 寄存器读写
pub trait RegisterAccess {
    fn read_register(&self, reg: usize) -> i32;
    fn write_register(&mut self, reg: usize, value: i32);
}

/// 经地址转换的用户空间单字节访问
///
/// 转换失败不会在这里返回，而是由机器记录下来，之后作为新的陷入投递
pub trait UserMemory {
    fn read_mem(&mut self, addr: i32) -> u8;
    fn write_mem(&mut self, addr: i32, value: u8);
}

/// 中断控制器
pub trait Interrupt {
    /// 无条件停机
    fn halt(&mut self);
}

/// 内核所需的全部机器服务
pub trait Machine: RegisterAccess + UserMemory + Interrupt {}

impl<T: RegisterAccess + UserMemory + Interrupt + ?Sized> Machine for T {}

/// 一次陷入处理期间内核持有的依赖集合
pub struct TrapContext<'a> {
    pub machine: &'a mut dyn Machine,
    pub console: &'a mut dyn Console,
    echo_diagnostics: bool,
}

impl<'a> TrapContext<'a> {
    pub fn new(machine: &'a mut dyn Machine, console: &'a mut dyn Console) -> Self {
        Self {
            machine,
            console,
            echo_diagnostics: true,
        }
    }

    /// 是否把可恢复错误的提示写到控制台
    pub fn with_diagnostics(mut self, echo: bool) -> Self {
        self.echo_diagnostics = echo;
        self
    }

    /// 输出可恢复错误提示
    pub(crate) fn diagnose(&mut self, message: &str) {
        if self.echo_diagnostics {
            self.print(message);
        }
    }

    /// 直接输出到控制台，写失败只记录日志
    pub(crate) fn print(&mut self, message: &str) {
        if let Err(e) = self.console.write(message.as_bytes()) {
            warn!(error = %e, "提示信息写入控制台失败");
        }
    }
}
