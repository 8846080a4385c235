use anyhow::{self, Context};
use serde::Deserialize;
use std::path::Path;

/// 系统调用号寄存器，同时也是返回值寄存器
pub const SYSCALL_CODE_REG: usize = 2;
pub const RESULT_REG: usize = 2;
/// 参数寄存器 r4..r7
pub const ARG_REGS: [usize; 4] = [4, 5, 6, 7];

/// 指令宽度（字节）
pub const INSTRUCTION_WIDTH: i32 = 4;

/// ReadInt 最多读取的字符数：符号位 + 10 位十进制数字
pub const MAX_INT_LEN: usize = 11;
/// PrintString 从用户空间拷贝的最大长度（不含结束符）
pub const MAX_STRING_LEN: usize = 255;

#[derive(Deserialize, Debug, Clone)]
pub struct MachineConfig {
    pub page_size: usize,
    pub num_phys_pages: usize,
    #[serde(default)]
    pub boot_pc: i32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct KernelSection {
    /// 可恢复的输入错误是否回显到控制台
    #[serde(default = "default_true")]
    pub echo_diagnostics: bool,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DebugConfig {
    pub trap_history_size: usize,
}

fn default_true() -> bool {
    true
}

/// 主配置（来自 profile/config.toml）
#[derive(Deserialize, Debug, Clone)]
pub struct KernelConfig {
    pub machine: MachineConfig,
    pub kernel: KernelSection,
    pub debug: DebugConfig,
}

impl KernelConfig {
    pub fn new(path: impl AsRef<Path>) -> anyhow::Result<KernelConfig> {
        let toml_str = std::fs::read_to_string(&path)
            .with_context(|| format!("无法读取主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        let config: KernelConfig = toml::from_str(&toml_str)
            .with_context(|| format!("无法解析主配置文件: {:?}", &path.as_ref().as_os_str()))?;
        anyhow::Ok(config)
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            machine: MachineConfig {
                page_size: 128,
                num_phys_pages: 32,
                boot_pc: 0,
            },
            kernel: KernelSection {
                echo_diagnostics: true,
            },
            debug: DebugConfig {
                trap_history_size: 16,
            },
        }
    }
}
