//! 安装状态机
//!
//! 持有当前阶段并校验每一次转换：只能按顺序前进一步，
//! 任何非终止阶段都可以进入 Error，终止阶段之后不能再转换。

use crate::core::TransitionError;
use crate::models::InstallationStage;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct InstallationMachine {
    current: InstallationStage,
    failed_at: Option<InstallationStage>,
    error_message: Option<String>,
    history: Vec<(InstallationStage, DateTime<Utc>)>,
}

impl Default for InstallationMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallationMachine {
    pub fn new() -> Self {
        Self {
            current: InstallationStage::Initializing,
            failed_at: None,
            error_message: None,
            history: vec![(InstallationStage::Initializing, Utc::now())],
        }
    }

    #[inline]
    pub fn current(&self) -> InstallationStage {
        self.current
    }

    /// 失败时所处的阶段
    pub fn failed_at(&self) -> Option<InstallationStage> {
        self.failed_at
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.current == InstallationStage::Complete
    }

    pub fn is_failed(&self) -> bool {
        self.current == InstallationStage::Error
    }

    pub fn history(&self) -> &[(InstallationStage, DateTime<Utc>)] {
        &self.history
    }

    /// 转换到下一阶段（必须是紧接着的阶段）
    pub fn transition_to(
        &mut self,
        target: InstallationStage,
    ) -> Result<InstallationStage, TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }

        // Error 只能通过 fail() 进入，需要附带错误信息
        if target == InstallationStage::Error {
            return Err(TransitionError::NotAllowed {
                stage: self.current,
                action: "直接进入错误状态",
            });
        }

        if target.order() <= self.current.order() {
            return Err(TransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(TransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        tracing::debug!(from = ?self.current, to = ?target, "安装阶段转换");
        self.record(target);
        Ok(target)
    }

    /// 校验当前阶段，用于只允许在某个阶段执行的操作
    pub fn require(
        &self,
        stage: InstallationStage,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }
        if self.current != stage {
            return Err(TransitionError::NotAllowed {
                stage: self.current,
                action,
            });
        }
        Ok(())
    }

    /// 进入错误状态
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }
        let message = message.into();
        tracing::error!(stage = ?self.current, error = %message, "安装流程失败");

        self.failed_at = Some(self.current);
        self.error_message = Some(message);
        self.record(InstallationStage::Error);
        Ok(())
    }

    /// 放弃安装，只允许在创建目录之前
    pub fn cancel(&self) -> Result<(), TransitionError> {
        if self.current.is_cancellable() {
            Ok(())
        } else {
            Err(TransitionError::NotCancellable {
                stage: self.current,
            })
        }
    }

    fn record(&mut self, stage: InstallationStage) {
        self.current = stage;
        self.history.push((stage, Utc::now()));
    }
}
