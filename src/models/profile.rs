use serde::{Deserialize, Serialize};

/// 用户身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// 自住
    Occupier,
    /// 投资
    Investor,
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Persona::Occupier => write!(f, "occupier"),
            Persona::Investor => write!(f, "investor"),
        }
    }
}

/// 自住用户画像（金额以数字字符串保存，原样交给模型）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OccupierProfile {
    pub purchase_price: String,
    pub deposit: String,
    pub interest_rate: String,
    pub loan_term_years: String,
    pub current_weekly_rent: String,
    pub annual_income: String,
    pub has_pets: bool,
    pub works_from_home: bool,
    pub has_children: bool,
    pub needs_parking: bool,
}

/// 投资用户画像
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvestorProfile {
    pub purchase_price: String,
    pub deposit: String,
    pub interest_rate: String,
    pub loan_term_years: String,
    pub expected_weekly_rent: String,
    pub management_fee_percent: String,
    pub vacancy_weeks_per_year: String,
    pub marginal_tax_rate: String,
    pub interest_only: bool,
    pub plans_renovation: bool,
}

/// 用户画像：只有一个身份的数据会被填充和使用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "persona", rename_all = "lowercase")]
pub enum UserProfile {
    Occupier(OccupierProfile),
    Investor(InvestorProfile),
}

impl UserProfile {
    pub fn persona(&self) -> Persona {
        match self {
            UserProfile::Occupier(_) => Persona::Occupier,
            UserProfile::Investor(_) => Persona::Investor,
        }
    }

    /// 渲染为附加在指令中的画像描述
    pub fn describe(&self) -> String {
        match self {
            UserProfile::Occupier(p) => {
                let lines = [
                    "Persona: Owner-occupier".to_string(),
                    format!("Purchase price: {}", or_unknown(&p.purchase_price)),
                    format!("Deposit: {}", or_unknown(&p.deposit)),
                    format!("Interest rate (%): {}", or_unknown(&p.interest_rate)),
                    format!("Loan term (years): {}", or_unknown(&p.loan_term_years)),
                    format!("Current weekly rent: {}", or_unknown(&p.current_weekly_rent)),
                    format!("Annual household income: {}", or_unknown(&p.annual_income)),
                    format!("Has pets: {}", yes_no(p.has_pets)),
                    format!("Works from home: {}", yes_no(p.works_from_home)),
                    format!("Has children: {}", yes_no(p.has_children)),
                    format!("Needs parking: {}", yes_no(p.needs_parking)),
                ];
                lines.join("\n")
            }
            UserProfile::Investor(p) => {
                let lines = [
                    "Persona: Investor".to_string(),
                    format!("Purchase price: {}", or_unknown(&p.purchase_price)),
                    format!("Deposit: {}", or_unknown(&p.deposit)),
                    format!("Interest rate (%): {}", or_unknown(&p.interest_rate)),
                    format!("Loan term (years): {}", or_unknown(&p.loan_term_years)),
                    format!("Expected weekly rent: {}", or_unknown(&p.expected_weekly_rent)),
                    format!("Management fee (%): {}", or_unknown(&p.management_fee_percent)),
                    format!("Vacancy (weeks/year): {}", or_unknown(&p.vacancy_weeks_per_year)),
                    format!("Marginal tax rate (%): {}", or_unknown(&p.marginal_tax_rate)),
                    format!("Interest-only loan: {}", yes_no(p.interest_only)),
                    format!("Plans renovation: {}", yes_no(p.plans_renovation)),
                ];
                lines.join("\n")
            }
        }
    }
}

fn or_unknown(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        "not provided"
    } else {
        trimmed
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
