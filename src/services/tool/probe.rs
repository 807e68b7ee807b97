//! 依赖检测服务
//!
//! 各工具并发检测后汇总；每个检测有独立超时，超时以软错误形式返回，
//! 不会拖住其他工具。结果按工具缓存，直到显式清除。

use super::cache::DetectionCache;
use super::detectors::DetectorRegistry;
use super::instructions;
use crate::models::{DependencyInfo, ToolKind};
use crate::utils::CommandExecutor;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::time::Duration;

pub struct DependencyProbe {
    registry: DetectorRegistry,
    executor: CommandExecutor,
    cache: DetectionCache,
    timeout: Duration,
}

impl DependencyProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            registry: DetectorRegistry::new(),
            executor: CommandExecutor::new(),
            cache: DetectionCache::new(),
            timeout,
        }
    }

    pub fn with_registry(mut self, registry: DetectorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cache(mut self, cache: DetectionCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &DetectionCache {
        &self.cache
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    /// 检测单个工具
    ///
    /// 没有为该工具注册 Detector 时返回 None；其余情况总是返回结果。
    pub async fn detect(&self, kind: ToolKind) -> Option<DependencyInfo> {
        if let Some(cached) = self.cache.get(kind) {
            tracing::trace!(tool = %kind, "使用缓存的检测结果");
            return Some(cached);
        }

        let detector = self.registry.get(kind)?;
        let info = match tokio::time::timeout(self.timeout, detector.detect(&self.executor)).await
        {
            Ok(info) => info,
            Err(_) => {
                tracing::warn!(tool = %kind, timeout_secs = self.timeout.as_secs_f64(), "检测超时");
                DependencyInfo::soft_error(
                    kind,
                    format!("检测超时（{} 秒）", self.timeout.as_secs_f64()),
                )
            }
        };

        tracing::debug!(
            tool = %kind,
            installed = info.installed(),
            version = ?info.version(),
            "检测完成"
        );
        self.cache.insert(info.clone());
        Some(info)
    }

    /// 并发检测所有已注册的工具
    pub async fn detect_all(&self) -> BTreeMap<ToolKind, DependencyInfo> {
        let kinds = self.registry.kinds();
        let results = join_all(kinds.iter().map(|kind| self.detect(*kind))).await;

        let detected: BTreeMap<_, _> = results
            .into_iter()
            .flatten()
            .map(|info| (info.kind(), info))
            .collect();

        tracing::info!(
            total = detected.len(),
            installed = detected.values().filter(|info| info.installed()).count(),
            "依赖检测完成"
        );
        detected
    }

    /// 清除缓存（None 表示全部）
    pub fn clear_cache(&self, kind: Option<ToolKind>) {
        match kind {
            Some(kind) => {
                self.cache.invalidate(kind);
                tracing::debug!(tool = %kind, "已清除检测缓存");
            }
            None => {
                self.cache.clear();
                tracing::debug!("已清除所有检测缓存");
            }
        }
    }

    pub fn instructions(&self, kind: ToolKind) -> &'static str {
        instructions::install_instructions(kind)
    }

    pub fn quick_install_command(&self, kind: ToolKind) -> Option<&'static str> {
        instructions::quick_install_command(kind)
    }
}
