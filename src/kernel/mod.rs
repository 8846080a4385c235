//! 内核陷入入口：异常分类与系统调用分派
//!
//! 状态机：
//! - Idle -> Trapped：CPU 陷入
//! - Trapped -> Returned：NoException，不改动寄存器和 PC
//! - Trapped -> Dispatching：系统调用，读取 r2
//! - Dispatching -> HandlerRunning：按调用号精确匹配一个处理函数
//! - HandlerRunning -> Returned：推进 PC，回到用户程序
//! - HandlerRunning -> Halted：Halt 系统调用，机器停机
//! - Trapped -> Fatal：其余异常，输出诊断信息后停机
//!
//! Halted 和 Fatal 是终止状态，之后的陷入一律拒绝

mod classify;
mod context;
mod marshal;
mod numeric;
mod pc;
mod syscall;

pub use classify::{FatalFault, TrapClass, classify};
pub use context::{Interrupt, Machine, RegisterAccess, TrapContext, UserMemory};
pub use marshal::{KernelBuffer, KernelBufferError, copy_from_user, copy_to_user};
pub use numeric::{DecimalDigits, ParseIntError, format_decimal, parse_decimal};
pub use pc::advance_program_counter;
pub use syscall::{
    HandlerFlow, MSG_NOT_AN_INTEGER, MSG_READ_CHAR_FAILED, MSG_SHUTDOWN, ParseSyscallError,
    SyscallCode, SyscallError,
};

use crate::const_values::{KernelConfig, RESULT_REG, SYSCALL_CODE_REG};
use crate::machine::ExceptionType;
use crate::machine::registers::BAD_VADDR_REG;
use crate::utils::ringbuf::RingBuffer;
use rustc_hash::FxHashMap;
use std::fmt;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrapState {
    #[default]
    Idle,
    Trapped,
    Dispatching,
    HandlerRunning,
    Returned,
    Halted,
    Fatal,
}

/// 一次陷入的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrapOutcome {
    /// NoException，什么也没做
    #[default]
    Ignored,
    /// 系统调用已处理（包括未知调用号），PC 已推进
    Resumed,
    /// Halt 系统调用，机器停机
    Halted,
    /// 不可恢复异常，机器停机
    Fatal,
}

/// 陷入历史记录
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrapRecord {
    pub kind: ExceptionType,
    /// 系统调用时 r2 中的原始调用号
    pub code: Option<i32>,
    pub outcome: TrapOutcome,
}

impl fmt::Display for TrapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(raw) = self.code {
            match SyscallCode::from_raw(raw) {
                Some(code) => write!(f, " {}", code)?,
                None => write!(f, " <未知调用号 {}>", raw)?,
            }
        }
        write!(f, " -> {:?}", self.outcome)
    }
}

/// 陷入统计
#[derive(Debug, Clone, Default)]
pub struct TrapStats {
    pub syscalls: FxHashMap<SyscallCode, u64>,
    pub unknown_syscalls: u64,
    pub failed_syscalls: u64,
    pub ignored: u64,
    pub fatal: u64,
}

impl TrapStats {
    pub fn syscall_count(&self, code: SyscallCode) -> u64 {
        self.syscalls.get(&code).copied().unwrap_or(0)
    }

    pub fn total_syscalls(&self) -> u64 {
        self.syscalls.values().sum::<u64>() + self.unknown_syscalls
    }
}

impl fmt::Display for TrapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "系统调用 {} 次 (未知 {}, 失败 {}), 忽略 {}, 致命 {}",
            self.total_syscalls(),
            self.unknown_syscalls,
            self.failed_syscalls,
            self.ignored,
            self.fatal
        )?;
        for code in SyscallCode::ALL {
            let count = self.syscall_count(code);
            if count > 0 {
                write!(f, "\n  {:<12} {}", code.to_string(), count)?;
            }
        }
        Ok(())
    }
}

/// 陷入处理器
pub struct Kernel {
    state: TrapState,
    history: RingBuffer<TrapRecord>,
    stats: TrapStats,
}

impl Kernel {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            state: TrapState::Idle,
            history: RingBuffer::new(config.debug.trap_history_size),
            stats: TrapStats::default(),
        }
    }

    #[inline(always)]
    pub fn state(&self) -> TrapState {
        self.state
    }

    pub fn stats(&self) -> &TrapStats {
        &self.stats
    }

    /// 从旧到新的陷入历史
    pub fn history(&self) -> Vec<TrapRecord> {
        self.history.snapshot()
    }

    /// 最近一次陷入
    pub fn last_trap(&self) -> Option<TrapRecord> {
        self.history.last()
    }

    pub fn history_capacity(&self) -> usize {
        self.history.capacity()
    }

    fn transition(&mut self, next: TrapState) {
        debug!(from = ?self.state, to = ?next, "陷入状态转换");
        self.state = next;
    }

    /// 陷入入口
    pub fn handle_trap(&mut self, ctx: &mut TrapContext<'_>, kind: ExceptionType) -> TrapOutcome {
        match self.state {
            TrapState::Fatal => {
                warn!(exception = %kind, "机器已因致命异常停机，忽略后续陷入");
                return TrapOutcome::Fatal;
            }
            TrapState::Halted => {
                warn!(exception = %kind, "机器已停机，忽略后续陷入");
                return TrapOutcome::Halted;
            }
            _ => {}
        }
        self.transition(TrapState::Trapped);

        let (outcome, code) = match classify(kind) {
            TrapClass::Ignore => {
                self.stats.ignored += 1;
                self.transition(TrapState::Returned);
                (TrapOutcome::Ignored, None)
            }
            TrapClass::Syscall => {
                let (outcome, raw) = self.dispatch_syscall(ctx);
                (outcome, Some(raw))
            }
            TrapClass::Fatal(fault) => {
                self.raise_fatal(ctx, kind, fault);
                (TrapOutcome::Fatal, None)
            }
        };

        self.history.push_overwrite(TrapRecord {
            kind,
            code,
            outcome,
        });
        if self.state == TrapState::Returned {
            self.transition(TrapState::Idle);
        }
        outcome
    }

    fn dispatch_syscall(&mut self, ctx: &mut TrapContext<'_>) -> (TrapOutcome, i32) {
        self.transition(TrapState::Dispatching);
        let raw = ctx.machine.read_register(SYSCALL_CODE_REG);

        let Some(code) = SyscallCode::from_raw(raw) else {
            // 未知调用号：不执行任何处理，PC 照常推进
            warn!(code = raw, "未知的系统调用号");
            self.stats.unknown_syscalls += 1;
            self.transition(TrapState::HandlerRunning);
            advance_program_counter(&mut *ctx.machine);
            self.transition(TrapState::Returned);
            return (TrapOutcome::Resumed, raw);
        };

        debug!(%code, "分派系统调用");
        *self.stats.syscalls.entry(code).or_default() += 1;
        self.transition(TrapState::HandlerRunning);

        let outcome = match syscall::run_handler(code, ctx) {
            Ok(HandlerFlow::Halted) => {
                self.transition(TrapState::Halted);
                return (TrapOutcome::Halted, raw);
            }
            Ok(HandlerFlow::Return) => {
                advance_program_counter(&mut *ctx.machine);
                TrapOutcome::Resumed
            }
            Err(e) => {
                error!(%code, error = %e, "系统调用处理失败");
                self.stats.failed_syscalls += 1;
                ctx.machine.write_register(RESULT_REG, -1);
                advance_program_counter(&mut *ctx.machine);
                TrapOutcome::Resumed
            }
        };
        self.transition(TrapState::Returned);
        (outcome, raw)
    }

    fn raise_fatal(&mut self, ctx: &mut TrapContext<'_>, kind: ExceptionType, fault: FatalFault) {
        self.transition(TrapState::Fatal);
        self.stats.fatal += 1;
        error!(
            exception = %kind,
            bad_vaddr = ctx.machine.read_register(BAD_VADDR_REG),
            "{}",
            fault
        );
        ctx.print(&format!("\n\n{}\n", fault));
        ctx.machine.halt();
    }
}
