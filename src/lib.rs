//! 教学操作系统的用户态/内核态陷入层
pub mod const_values;
pub mod kernel;
pub mod machine;
pub mod script;
pub mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::{ScriptedConsole, StdConsole};
use console_trait::Console;
use kernel::{Kernel, RegisterAccess, TrapContext, TrapOutcome};
use machine::SimMachine;
use script::{TrapScript, TrapStep};
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// 陷入层驱动程序
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// 陷入脚本路径
    #[arg(short, long)]
    pub script: String,

    /// 配置文件地址
    #[arg(short, long, default_value = "profile/config.toml")]
    pub config: String,

    /// 控制台输入，覆盖脚本中的 input；两者都没有时读取 stdin
    #[arg(short, long)]
    pub input: Option<String>,
}

/// 一次回放的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// 实际处理的陷入数（含翻译失败投递的陷入）
    pub traps: usize,
    pub halted: bool,
}

/// 依次投递脚本中的陷入，机器停机后停止
pub fn replay_traps(
    kernel: &mut Kernel,
    machine: &mut SimMachine,
    console: &mut dyn Console,
    steps: &[TrapStep],
    echo_diagnostics: bool,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    for (i, step) in steps.iter().enumerate() {
        if machine.is_halted() {
            warn!(remaining = steps.len() - i, "机器已停机，跳过剩余陷入");
            break;
        }

        let kind = step
            .exception_type()
            .with_context(|| format!("第 {} 个陷入无效", i))?;
        if let Some(code) = step.syscall_code()? {
            machine.write_register(const_values::SYSCALL_CODE_REG, code);
        }
        for (reg, value) in const_values::ARG_REGS.iter().zip(step.checked_args()?) {
            machine.write_register(*reg, *value);
        }

        let outcome = {
            let mut ctx = TrapContext::new(&mut *machine, &mut *console).with_diagnostics(echo_diagnostics);
            kernel.handle_trap(&mut ctx, kind)
        };
        summary.traps += 1;
        debug!(index = i, exception = %kind, ?outcome, result = machine.read_register(const_values::RESULT_REG), "陷入处理完成");

        // 用户内存访问失败，作为新的陷入投递
        if let Some(pending) = machine.take_pending_exception() {
            warn!(exception = %pending.kind, bad_vaddr = pending.bad_vaddr, "投递地址转换异常");
            let mut ctx = TrapContext::new(&mut *machine, &mut *console).with_diagnostics(echo_diagnostics);
            kernel.handle_trap(&mut ctx, pending.kind);
            summary.traps += 1;
        }

        if outcome == TrapOutcome::Fatal || machine.is_halted() {
            break;
        }
    }
    summary.halted = machine.is_halted();
    Ok(summary)
}

pub fn build_kernel_run_blocking(args: Args) -> Result<()> {
    let prj_base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let arg_cfg_path = PathBuf::from(&args.config);
    let config_path = if arg_cfg_path.is_absolute() {
        arg_cfg_path
    } else {
        prj_base.join(&args.config)
    };
    let config = const_values::KernelConfig::new(config_path)?;

    info!(path = %args.script, "加载陷入脚本");
    let script = TrapScript::new(&args.script)?;

    let mut machine = SimMachine::new(&config.machine)?;
    for &page in &script.readonly_pages {
        if !machine.set_read_only(page) {
            warn!(page, "只读页不存在");
        }
    }
    for segment in &script.segments {
        let data = segment.bytes()?;
        machine
            .load(segment.addr, &data)
            .with_context(|| format!("无法装载段 {:#x}", segment.addr))?;
    }

    let mut console: Box<dyn Console> = match args.input.or_else(|| script.input.clone()) {
        Some(input) => Box::new(ScriptedConsole::new(input).with_echo(true)),
        None => Box::new(StdConsole::default()),
    };
    info!(console = console.name(), "控制台就绪");

    let mut kernel = Kernel::new(&config);
    let summary = replay_traps(
        &mut kernel,
        &mut machine,
        console.as_mut(),
        &script.traps,
        config.kernel.echo_diagnostics,
    )?;

    info!("陷入统计: {}", kernel.stats());
    let history = kernel.history();
    if history.is_empty() {
        info!("没有陷入历史");
    } else {
        let log: Vec<String> = history.iter().map(|r| r.to_string()).collect();
        info!(
            "陷入历史 (最近 {}/{}):\n{}",
            history.len(),
            kernel.history_capacity(),
            log.join("\n")
        );
    }
    if let Some(last) = kernel.last_trap() {
        info!(pc = machine.registers().pc(), "最后一次陷入: {}", last);
    }

    if kernel.stats().fatal > 0 {
        error!("CPU状态:\n{}", machine.registers());
        println!("\n{}", format!("因致命异常停机，共处理 {} 次陷入", summary.traps).red());
    } else if summary.halted {
        println!("\n{}", format!("正常停机，共处理 {} 次陷入", summary.traps).green());
    } else {
        println!("\n{}", format!("脚本结束，共处理 {} 次陷入，机器未停机", summary.traps).yellow());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use const_values::KernelConfig;
    use kernel::{SyscallCode, UserMemory};
    use machine::ExceptionType;

    fn run(script: &str, input: &str) -> (RunSummary, Kernel, SimMachine, ScriptedConsole) {
        let script: TrapScript = toml::from_str(script).unwrap();
        let config = KernelConfig::default();
        let mut machine = SimMachine::new(&config.machine).unwrap();
        for segment in &script.segments {
            machine.load(segment.addr, &segment.bytes().unwrap()).unwrap();
        }
        for &page in &script.readonly_pages {
            machine.set_read_only(page);
        }
        let mut console = ScriptedConsole::new(input);
        let mut kernel = Kernel::new(&config);
        let summary =
            replay_traps(&mut kernel, &mut machine, &mut console, &script.traps, true).unwrap();
        (summary, kernel, machine, console)
    }

    #[test]
    fn echo_program() {
        let (summary, kernel, machine, console) = run(
            r#"
            [[segment]]
            addr = 0x100
            text = "n = "

            [[trap]]
            syscall = "print_string"
            args = [0x100]

            [[trap]]
            syscall = "read_int"

            [[trap]]
            syscall = "halt"

            [[trap]]
            syscall = "print_char"
            args = [65]
            "#,
            "-12\n",
        );
        assert_eq!(summary, RunSummary { traps: 3, halted: true });
        // halt 前脚本已把 r2 写成调用号 0，ReadInt 的结果被覆盖
        assert_eq!(kernel.stats().syscall_count(SyscallCode::ReadInt), 1);
        assert_eq!(console.remaining_input(), 0);
        assert_eq!(machine.read_register(const_values::RESULT_REG), 0);
        let out = console.output();
        assert!(out.starts_with(b"n = \0"));
        assert!(!out.contains(&b'A'));
        assert_eq!(kernel.history().len(), 3);
    }

    #[test]
    fn read_string_into_read_only_page_is_fatal() {
        let (summary, kernel, mut machine, console) = run(
            r#"
            readonly_pages = [2]

            [[trap]]
            syscall = "read_string"
            args = [0x100, 8]

            [[trap]]
            syscall = "print_int"
            args = [1]
            "#,
            "abc\n",
        );
        assert_eq!(summary, RunSummary { traps: 2, halted: true });
        assert_eq!(kernel.stats().fatal, 1);
        assert_eq!(machine.halt_count(), 1);
        assert_eq!(machine.read_mem(0x100), 0);
        let history = kernel.history();
        assert_eq!(history[1].kind, ExceptionType::ReadOnly);
        assert!(!console.output().contains(&b'1'));
    }

    #[test]
    fn script_stops_without_halt() {
        let (summary, kernel, _, console) = run(
            r#"
            [[trap]]
            syscall = "print_int"
            args = [7]

            [[trap]]
            exception = "none"
            "#,
            "",
        );
        assert_eq!(summary, RunSummary { traps: 2, halted: false });
        assert_eq!(console.output(), b"7");
        assert_eq!(kernel.stats().ignored, 1);
    }

    #[test]
    fn invalid_step_is_an_error() {
        let script: TrapScript = toml::from_str(
            r#"
            [[trap]]
            exception = "segfault"
            "#,
        )
        .unwrap();
        let config = KernelConfig::default();
        let mut machine = SimMachine::new(&config.machine).unwrap();
        let mut console = ScriptedConsole::default();
        let mut kernel = Kernel::new(&config);
        assert!(replay_traps(&mut kernel, &mut machine, &mut console, &script.traps, true).is_err());
    }
}
