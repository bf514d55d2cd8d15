//! 报告数据结构
//!
//! 模型输出的结构只是"建议"，所以所有字段都带默认值，
//! 解析成功后再由 [`FinalReport::normalize`] 施加本地约束。

use serde::{Deserialize, Deserializer, Serialize};

use super::profile::Persona;

/// 时间线最多保留的条目数
pub const MAX_TIMELINE_ENTRIES: usize = 10;

/// 只有前 5 个预测年份可以携带收益率影响字段
pub const YIELD_IMPACT_YEARS: usize = 5;

/// 模型常用 `null` 表示"未知"，非 Option 字段按默认值处理
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 引用来源
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Citation {
    #[serde(deserialize_with = "null_as_default")]
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BriefingPoint {
    #[serde(deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Citation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimelineEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub year: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Citation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LifestyleConflict {
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Citation>,
}

/// 年度财务预测行
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinancialProjectionRow {
    #[serde(deserialize_with = "null_as_default")]
    pub year: i32,
    #[serde(deserialize_with = "null_as_default")]
    pub property_value: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub strata_levies: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub special_levies: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub cumulative_cost: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gross_yield_impact: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_yield_impact: Option<f64>,
}

impl FinancialProjectionRow {
    pub fn has_yield_impact(&self) -> bool {
        self.gross_yield_impact.is_some() || self.net_yield_impact.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Amenity {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendedRent {
    #[serde(deserialize_with = "null_as_default")]
    pub weekly_low: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub weekly_high: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub rationale: String,
}

/// 租房 vs 买房（仅自住）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RentVsBuy {
    #[serde(deserialize_with = "null_as_default")]
    pub total_cost_of_buying: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_cost_of_renting: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub break_even_year: Option<i32>,
    #[serde(deserialize_with = "null_as_default")]
    pub verdict: String,
}

/// 投资财富预测（仅投资）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvestorWealth {
    #[serde(deserialize_with = "null_as_default")]
    pub projected_equity: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_rental_income: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_holding_costs: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub net_wealth_position: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub annualized_return_percent: f64,
}

/// 最终报告
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalReport {
    #[serde(deserialize_with = "null_as_default")]
    pub risk_score: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub briefing_points: Vec<BriefingPoint>,
    #[serde(deserialize_with = "null_as_default")]
    pub timeline: Vec<TimelineEvent>,
    #[serde(deserialize_with = "null_as_default")]
    pub lifestyle_conflicts: Vec<LifestyleConflict>,
    #[serde(deserialize_with = "null_as_default")]
    pub financial_projection: Vec<FinancialProjectionRow>,
    #[serde(deserialize_with = "null_as_default")]
    pub amenities: Vec<Amenity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_rent: Option<RecommendedRent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_vs_buy: Option<RentVsBuy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub investor_wealth: Option<InvestorWealth>,
    #[serde(deserialize_with = "null_as_default")]
    pub conclusion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion_source: Option<Citation>,
}

/// 单个批次的分析结果，结构与最终报告相同
pub type PartialReport = FinalReport;

impl FinalReport {
    /// 施加本地约束：身份互斥、时间线上限、收益率影响年份、风险分范围
    pub fn normalize(mut self, persona: Persona) -> Self {
        match persona {
            Persona::Occupier => self.investor_wealth = None,
            Persona::Investor => self.rent_vs_buy = None,
        }

        self.timeline.truncate(MAX_TIMELINE_ENTRIES);

        for row in self.financial_projection.iter_mut().skip(YIELD_IMPACT_YEARS) {
            row.gross_yield_impact = None;
            row.net_yield_impact = None;
        }

        self.risk_score = if self.risk_score.is_finite() {
            self.risk_score.clamp(0.0, 100.0)
        } else {
            0.0
        };

        self
    }
}
