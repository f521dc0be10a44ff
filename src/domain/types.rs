// ==========================================
// 反应釜批次排程看板 - 领域类型定义
// ==========================================
// 职责: 牌号、阀门模式、排程格状态等枚举
// 序列化格式: 与存储层一致的大写字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 产品牌号 (Grade)
// ==========================================
// 全线共五个牌号，未覆写时使用看板当前牌号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Grade {
    #[default]
    Sm,
    Slk,
    Slp,
    Se,
    Sr,
}

impl Grade {
    /// 全部牌号（按看板下拉顺序）
    pub const ALL: [Grade; 5] = [Grade::Sm, Grade::Slk, Grade::Slp, Grade::Se, Grade::Sr];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Sm => "SM",
            Grade::Slk => "SLK",
            Grade::Slp => "SLP",
            Grade::Se => "SE",
            Grade::Sr => "SR",
        }
    }

    /// 从字符串解析牌号（大小写不敏感）
    ///
    /// # 返回
    /// - Some(Grade): 识别成功
    /// - None: 未知牌号
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "SM" => Some(Grade::Sm),
            "SLK" => Some(Grade::Slk),
            "SLP" => Some(Grade::Slp),
            "SE" => Some(Grade::Se),
            "SR" => Some(Grade::Sr),
            _ => None,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 阀门模式 (Item Mode)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemMode {
    Open,
    #[default]
    Close,
}

impl ItemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemMode::Open => "OPEN",
            ItemMode::Close => "CLOSE",
        }
    }

    /// 从字符串解析模式，无法识别时回落为 CLOSE
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => ItemMode::Open,
            _ => ItemMode::Close,
        }
    }
}

impl fmt::Display for ItemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 排程格状态 (Item Status)
// ==========================================
// 顺序无业务含义，仅用于展示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Past,    // 已开始超过宽限期
    Active,  // 开始前 10 秒至开始后 60 秒
    Future,  // 尚未到达
    Skipped, // 人工跳过
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Past => "past",
            ItemStatus::Active => "active",
            ItemStatus::Future => "future",
            ItemStatus::Skipped => "skipped",
        }
    }

    /// 是否已结束（已过期或已跳过）
    pub fn is_settled(&self) -> bool {
        matches!(self, ItemStatus::Past | ItemStatus::Skipped)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_parse_is_case_insensitive() {
        assert_eq!(Grade::parse("slk"), Some(Grade::Slk));
        assert_eq!(Grade::parse(" SR "), Some(Grade::Sr));
        assert_eq!(Grade::parse("G9"), None);
        assert_eq!(Grade::ALL.len(), 5);
    }

    #[test]
    fn test_grade_serde_uses_upper_case() {
        let json = serde_json::to_string(&Grade::Slp).unwrap();
        assert_eq!(json, "\"SLP\"");
        let back: Grade = serde_json::from_str("\"SE\"").unwrap();
        assert_eq!(back, Grade::Se);
    }

    #[test]
    fn test_item_mode_defaults_to_close() {
        assert_eq!(ItemMode::default(), ItemMode::Close);
        assert_eq!(ItemMode::from_str("open"), ItemMode::Open);
        assert_eq!(ItemMode::from_str("garbage"), ItemMode::Close);
    }

    #[test]
    fn test_status_settled() {
        assert!(ItemStatus::Past.is_settled());
        assert!(ItemStatus::Skipped.is_settled());
        assert!(!ItemStatus::Active.is_settled());
        assert!(!ItemStatus::Future.is_settled());
    }
}
