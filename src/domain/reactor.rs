// ==========================================
// 反应釜批次排程看板 - 反应釜定义
// ==========================================
// 职责: 静态、有序的反应釜列表（标识 + 显示标签）
// 红线: 进程启动后不可变，顺序即排程扁平序列中的釜内顺序
// ==========================================

use serde::{Deserialize, Serialize};

/// 反应釜定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorDefinition {
    pub id: String,    // 反应釜标识 (S/T/U/V/W)
    pub name: String,  // 显示名称
    pub label: String, // 表头标签
}

impl ReactorDefinition {
    pub fn new(id: &str, name: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            label: label.to_string(),
        }
    }
}

/// 反应釜集合
///
/// 有序且非空；顺序决定同一周期内各釜的先后。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorSet {
    reactors: Vec<ReactorDefinition>,
}

impl ReactorSet {
    pub fn new(reactors: Vec<ReactorDefinition>) -> Self {
        Self { reactors }
    }

    /// 产线默认的五台反应釜
    pub fn standard() -> Self {
        Self::new(
            ["S", "T", "U", "V", "W"]
                .iter()
                .map(|id| ReactorDefinition::new(id, &format!("Reactor {}", id), id))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.reactors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReactorDefinition> {
        self.reactors.iter()
    }

    pub fn get(&self, index: usize) -> Option<&ReactorDefinition> {
        self.reactors.get(index)
    }

    pub fn contains(&self, reactor_id: &str) -> bool {
        self.reactors.iter().any(|r| r.id == reactor_id)
    }
}

impl Default for ReactorSet {
    fn default() -> Self {
        Self::standard()
    }
}
