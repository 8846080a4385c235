//! 控制台设备 trait 定义

use thiserror::Error;

/// 控制台错误类型
#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("控制台读取错误: {0}")]
    Read(String),
    #[error("控制台写入错误: {0}")]
    Write(String),
    #[error("控制台已关闭")]
    Closed,
}

/// 同步控制台 trait
/// 内核的所有控制台读写都经过此 trait，调用可能阻塞
pub trait Console {
    /// 从控制台读取数据
    ///
    /// # 参数
    /// - buf: 目标缓冲区，最多读取 buf.len() 个字节
    ///
    /// # 返回
    /// 实际读取的字节数。遇到换行符时停止，换行符被消耗但不写入缓冲区；
    /// 一行恰好填满缓冲区时，其后的换行符同样被消耗；
    /// 输入耗尽时返回 0
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConsoleError>;

    /// 向控制台写入数据
    fn write(&mut self, buf: &[u8]) -> Result<(), ConsoleError>;

    /// 获取设备名称（用于调试）
    fn name(&self) -> &str {
        "console"
    }
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConsoleError> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> Result<(), ConsoleError> {
        (**self).write(buf)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
