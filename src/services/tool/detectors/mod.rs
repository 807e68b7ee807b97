// Tool Detectors Module
//
// 内置工具的 Detector 实现和注册表

mod claude_code;
mod gemini;
mod ollama;

pub use claude_code::ClaudeCodeDetector;
pub use gemini::GeminiDetector;
pub use ollama::OllamaDetector;

use super::detector_trait::ToolDetector;
use crate::models::ToolKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Detector 注册表
///
/// 每种工具最多一个 Detector，后注册的覆盖先注册的。
pub struct DetectorRegistry {
    detectors: HashMap<ToolKind, Arc<dyn ToolDetector>>,
}

impl DetectorRegistry {
    /// 创建注册表并注册所有内置工具
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ClaudeCodeDetector::new()));
        registry.register(Arc::new(OllamaDetector::new()));
        registry.register(Arc::new(GeminiDetector::new()));

        tracing::debug!(
            "Detector 注册表初始化完成，已注册 {} 个工具",
            registry.detectors.len()
        );
        registry
    }

    /// 空注册表（测试或自定义宿主使用）
    pub fn empty() -> Self {
        Self {
            detectors: HashMap::new(),
        }
    }

    pub fn register(&mut self, detector: Arc<dyn ToolDetector>) {
        let kind = detector.kind();
        tracing::trace!(tool = %kind, "注册工具 Detector");
        self.detectors.insert(kind, detector);
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolDetector>> {
        self.detectors.get(&kind).cloned()
    }

    /// 已注册的工具，按固定顺序
    pub fn kinds(&self) -> Vec<ToolKind> {
        ToolKind::ALL
            .into_iter()
            .filter(|kind| self.detectors.contains_key(kind))
            .collect()
    }

    pub fn contains(&self, kind: ToolKind) -> bool {
        self.detectors.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
