//! 事件配置（EventConfig）
//!
use bon::Builder;

/// 事件配置
#[derive(Clone, Debug, Builder)]
pub struct EventConfig {
    /// 事件名称，仅用于日志标注
    #[builder(into)]
    pub name: Option<String>,
    /// 是否捕获监听器 panic 并按失败处理
    #[builder(default = true)]
    pub catch_panics: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            name: None,
            catch_panics: true,
        }
    }
}

impl EventConfig {
    pub(crate) fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("event")
    }
}
