//! 检测结果缓存
//!
//! 缓存按工具保存检测结果和检测时间，只在显式清除时失效。
//! 配置了有效期时，过期条目读取为不存在，但不会在调用方不知情的情况下被刷新。

use crate::models::{DependencyInfo, ToolKind};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

/// 时间来源
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// 手动推进的时钟（测试使用）
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(delta) = chrono::Duration::from_std(by) {
            let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    info: DependencyInfo,
    probed_at: DateTime<Utc>,
}

pub struct DetectionCache {
    entries: RwLock<HashMap<ToolKind, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Option<Duration>,
}

impl DetectionCache {
    /// 不过期的缓存
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock), None)
    }

    pub fn with_clock(clock: Arc<dyn Clock>, ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl,
        }
    }

    pub fn get(&self, kind: ToolKind) -> Option<DependencyInfo> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(&kind)?;
        if self.is_expired(entry) {
            tracing::debug!(tool = %kind, "缓存已过期");
            return None;
        }
        Some(entry.info.clone())
    }

    /// 条目的检测时间（过期条目返回 None）
    pub fn cached_at(&self, kind: ToolKind) -> Option<DateTime<Utc>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&kind)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.probed_at)
    }

    pub fn insert(&self, info: DependencyInfo) {
        let entry = CacheEntry {
            probed_at: self.clock.now(),
            info,
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.info.kind(), entry);
    }

    /// 清除单个工具的缓存，返回是否存在条目
    pub fn invalidate(&self, kind: ToolKind) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&kind)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = self.clock.now().signed_duration_since(entry.probed_at);
        age.to_std().map(|age| age >= ttl).unwrap_or(false)
    }
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_live_until_invalidated() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = DetectionCache::with_clock(clock.clone(), None);
        cache.insert(DependencyInfo::not_installed(ToolKind::Ollama));

        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(cache.get(ToolKind::Ollama).is_some());

        assert!(cache.invalidate(ToolKind::Ollama));
        assert!(cache.get(ToolKind::Ollama).is_none());
        assert!(!cache.invalidate(ToolKind::Ollama));
    }

    #[test]
    fn test_ttl_expiry_reads_as_absent() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = DetectionCache::with_clock(clock.clone(), Some(Duration::from_secs(60)));
        cache.insert(DependencyInfo::not_installed(ToolKind::Gemini));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.cached_at(ToolKind::Gemini), Some(start));

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(ToolKind::Gemini).is_none());
        assert!(cache.cached_at(ToolKind::Gemini).is_none());
        // 过期条目仍在，等待显式清除或重新检测覆盖
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = DetectionCache::new();
        for kind in ToolKind::ALL {
            cache.insert(DependencyInfo::not_installed(kind));
        }
        assert_eq!(cache.len(), 3);
        cache.clear();
        assert!(cache.is_empty());
    }
}
