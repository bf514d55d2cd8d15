//! 指令文本与输出结构定义
//!
//! 指令措辞只是交给外部模型的配置，结构定义需要与 [`FinalReport`] 的字段保持一致。
//!
//! [`FinalReport`]: crate::models::report::FinalReport

use serde_json::{json, Value};

use crate::models::profile::Persona;

/// 输出结构名称
pub const SCHEMA_NAME: &str = "property_forecast_report";

pub const SYSTEM_INSTRUCTION: &str = "You are a forensic strata and property analyst. \
You read strata minutes, building reports, by-laws, levy notices and contracts, and you \
produce an evidence-backed 10-year risk and financial forecast for one specific buyer. \
Every claim must cite the file name and page number it came from whenever possible.";

/// 数值格式要求（模型常输出病态数值，必须显式约束）
pub const NUMERIC_RULES: &str = "Numeric output rules: round every number to at most 4 decimal \
places; never use scientific notation; use 0 instead of extremely small values; never emit \
NaN or Infinity.";

pub const EXTRACTION_INSTRUCTION: &str = "Analyse the attached documents for the buyer profile \
below. Produce a risk score from 0 to 100, briefing points with citations, a timeline of at \
most 10 year-tagged events, lifestyle conflicts, a year-by-year financial projection covering \
10 years (yield impact only for the first 5 years), nearby amenities, a recommended rent range \
and a conclusion.";

pub const SYNTHESIS_INSTRUCTION: &str = "You are given several partial reports, each produced \
from a different batch of documents about the same property. Merge them into one report: \
de-duplicate briefing points and citations; merge per-year financial and timeline rows into a \
single unified 10-year span; when the same risk appears in several partial reports keep the \
most severe cited evidence; keep at most 10 timeline entries. Do not invent evidence that none \
of the partial reports contain.";

/// 与身份对应的补充指令
pub fn persona_instruction(persona: Persona) -> &'static str {
    match persona {
        Persona::Occupier => "The buyer intends to live in the property. Include a rentVsBuy \
comparison and do not include investorWealth.",
        Persona::Investor => "The buyer is an investor. Include an investorWealth projection and \
do not include rentVsBuy.",
    }
}

fn citation_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fileName": { "type": "string" },
            "pageNumber": { "type": "integer" }
        },
        "required": ["fileName"]
    })
}

/// 构建与身份对应的输出结构
pub fn report_schema(persona: Persona) -> Value {
    let citation = citation_schema();

    let mut properties = json!({
        "riskScore": { "type": "number" },
        "briefingPoints": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": { "content": { "type": "string" }, "source": citation },
                "required": ["content"]
            }
        },
        "timeline": {
            "type": "array",
            "maxItems": 10,
            "items": {
                "type": "object",
                "properties": {
                    "year": { "type": "integer" },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "estimatedCost": { "type": "number" },
                    "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                    "source": citation
                },
                "required": ["year", "title", "description"]
            }
        },
        "lifestyleConflicts": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "category": { "type": "string" },
                    "description": { "type": "string" },
                    "severity": { "type": "string" },
                    "source": citation
                },
                "required": ["category", "description"]
            }
        },
        "financialProjection": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "year": { "type": "integer" },
                    "propertyValue": { "type": "number" },
                    "strataLevies": { "type": "number" },
                    "specialLevies": { "type": "number" },
                    "cumulativeCost": { "type": "number" },
                    "grossYieldImpact": { "type": "number" },
                    "netYieldImpact": { "type": "number" }
                },
                "required": ["year", "propertyValue", "strataLevies", "specialLevies", "cumulativeCost"]
            }
        },
        "amenities": {
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "category": { "type": "string" },
                    "distance": { "type": "string" }
                },
                "required": ["name", "category"]
            }
        },
        "recommendedRent": {
            "type": "object",
            "properties": {
                "weeklyLow": { "type": "number" },
                "weeklyHigh": { "type": "number" },
                "rationale": { "type": "string" }
            }
        },
        "conclusion": { "type": "string" },
        "conclusionSource": citation
    });

    let mut required = vec![
        "riskScore",
        "briefingPoints",
        "timeline",
        "lifestyleConflicts",
        "financialProjection",
        "amenities",
        "conclusion",
    ];

    let (key, sub_schema) = match persona {
        Persona::Occupier => (
            "rentVsBuy",
            json!({
                "type": "object",
                "properties": {
                    "totalCostOfBuying": { "type": "number" },
                    "totalCostOfRenting": { "type": "number" },
                    "breakEvenYear": { "type": "integer" },
                    "verdict": { "type": "string" }
                },
                "required": ["totalCostOfBuying", "totalCostOfRenting", "verdict"]
            }),
        ),
        Persona::Investor => (
            "investorWealth",
            json!({
                "type": "object",
                "properties": {
                    "projectedEquity": { "type": "number" },
                    "totalRentalIncome": { "type": "number" },
                    "totalHoldingCosts": { "type": "number" },
                    "netWealthPosition": { "type": "number" },
                    "annualizedReturnPercent": { "type": "number" }
                },
                "required": ["projectedEquity", "netWealthPosition"]
            }),
        ),
    };
    properties[key] = sub_schema;
    required.push(key);

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
