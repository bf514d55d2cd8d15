//! 响应清洗服务 - 业务能力层
//!
//! 模型的结构化输出并不保证逐字节合法，本模块负责确定性地修复
//! 两类最常见的问题：缺失的数组/对象分隔符，以及过长精度或科学计数法的数值。
//!
//! 步骤（顺序固定，后一步依赖前一步）：
//! 1. 去掉 markdown 代码围栏
//! 2. 截取第一个 `{` 到最后一个 `}` 之间的内容
//! 3. 逐字符扫描（跳过字符串内部）：补逗号、规整数值
//! 4. 解析；失败时做一次兜底修复（去尾逗号、给裸键加引号）再解析
//! 5. 仍然失败则返回带诊断片段的错误
//!
//! 字符串字面量的内容永远不会被修改，兜底修复也只作用于字符串之外的片段。

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{InvocationError, SanitizeError};
use crate::models::profile::Persona;
use crate::models::report::FinalReport;
use crate::utils::logging::truncate_text;

/// 诊断片段的最大字符数
pub const SNIPPET_LIMIT: usize = 200;

/// 保留的小数位数
const DECIMAL_PLACES: i32 = 4;

/// 低于该量级的非零数值视为噪声
const NOISE_FLOOR: f64 = 1e-15;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"));

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("bare key regex")
});

/// 清洗并解析模型返回的文本
pub fn sanitize(raw: &str) -> Result<Value, SanitizeError> {
    let unfenced = strip_code_fences(raw);
    let isolated = isolate_object(unfenced)?;
    let repaired = repair_structure(isolated);

    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => Ok(value),
        Err(first) => {
            debug!("首次解析失败，尝试兜底修复: {}", first);
            let fallback = fallback_repair(&repaired);
            serde_json::from_str::<Value>(&fallback).map_err(|e| {
                SanitizeError::UnrecoverableMalformedResponse {
                    message: e.to_string(),
                    snippet: error_snippet(&fallback, e.line(), e.column()),
                }
            })
        }
    }
}

/// 清洗后反序列化为报告，并施加本地约束
pub fn parse_report(raw: &str, persona: Persona) -> Result<FinalReport, InvocationError> {
    let value = sanitize(raw)?;
    let report: FinalReport = serde_json::from_value(value)?;
    Ok(report.normalize(persona))
}

/// 去掉首尾的 markdown 代码围栏（如 ```json ... ```）
fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

fn isolate_object(text: &str) -> Result<&str, SanitizeError> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(SanitizeError::NoJsonObjectFound),
    }
}

/// 逐字符扫描，只处理字符串之外的区域
fn repair_structure(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut in_string = false;
    let mut escaped = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '}' | ']' => {
                out.push(c);
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if matches!(next, Some('{') | Some('[')) {
                    out.push(',');
                }
                i += 1;
            }
            '-' | '+' | '0'..='9' => match scan_number(&chars, i) {
                Some(end) => {
                    let literal: String = chars[i..end].iter().collect();
                    out.push_str(&normalize_number(&literal));
                    i = end;
                }
                None => match non_finite_len(&chars[i + 1..]) {
                    // -Infinity / +NaN
                    Some(len) => {
                        out.push('0');
                        i += 1 + len;
                    }
                    None => {
                        out.push(c);
                        i += 1;
                    }
                },
            },
            c if c.is_alphabetic() || c == '_' => {
                // 标识符（true / null / 裸键）原样复制，避免把其中的数字当成数值
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                if is_non_finite(&ident) {
                    out.push('0');
                } else {
                    out.push_str(&ident);
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}

fn is_non_finite(ident: &str) -> bool {
    matches!(ident, "NaN" | "Infinity")
}

/// 紧跟在符号之后的 NaN / Infinity 标识符长度
fn non_finite_len(chars: &[char]) -> Option<usize> {
    let len = chars
        .iter()
        .take_while(|c| c.is_alphanumeric() || **c == '_')
        .count();
    let ident: String = chars[..len].iter().collect();
    is_non_finite(&ident).then_some(len)
}

/// 识别数值字面量，返回结束位置（不含）
fn scan_number(chars: &[char], start: usize) -> Option<usize> {
    let digits_from = |mut j: usize| {
        while j < chars.len() && chars[j].is_ascii_digit() {
            j += 1;
        }
        j
    };

    let mut j = start;
    if matches!(chars.get(j), Some('-') | Some('+')) {
        j += 1;
    }

    let int_end = digits_from(j);
    if int_end == j {
        return None;
    }
    j = int_end;

    if chars.get(j) == Some(&'.') && chars.get(j + 1).is_some_and(|c| c.is_ascii_digit()) {
        j = digits_from(j + 1);
    }

    if matches!(chars.get(j), Some('e') | Some('E')) {
        let mut k = j + 1;
        if matches!(chars.get(k), Some('-') | Some('+')) {
            k += 1;
        }
        if chars.get(k).is_some_and(|c| c.is_ascii_digit()) {
            j = digits_from(k);
        }
    }

    Some(j)
}

/// 数值规整：非有限或噪声量级归零，其余四舍五入到 4 位小数并以普通小数输出
fn normalize_number(literal: &str) -> String {
    let value = match literal.parse::<f64>() {
        Ok(value) => value,
        Err(_) => return literal.to_string(),
    };

    if !value.is_finite() || (value != 0.0 && value.abs() < NOISE_FLOOR) {
        return "0".to_string();
    }

    format_plain(value)
}

fn format_plain(value: f64) -> String {
    // 超过 1e15 的数在 f64 中已没有小数精度
    if value.abs() >= 1e15 {
        return format!("{:.0}", value);
    }

    let scale = 10f64.powi(DECIMAL_PLACES);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        return "0".to_string();
    }

    let text = format!("{:.*}", DECIMAL_PLACES as usize, rounded);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// 兜底修复：去尾逗号、给裸键加引号，只改写字符串之外的片段
fn fallback_repair(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);

    for (quoted, segment) in split_string_literals(text) {
        if quoted {
            out.push_str(segment);
        } else {
            let without_trailing = TRAILING_COMMA.replace_all(segment, "$1");
            out.push_str(&BARE_KEY.replace_all(&without_trailing, "$1\"$2\"$3"));
        }
    }

    out
}

/// 按字符串字面量切分文本，返回 `(是否在引号内, 片段)`
///
/// 两个正则都不匹配引号，因此任何匹配都完整地落在单个引号外片段中
fn split_string_literals(text: &str) -> Vec<(bool, &str)> {
    let mut segments = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (pos, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                segments.push((true, &text[start..=pos]));
                start = pos + 1;
                in_string = false;
            }
        } else if c == '"' {
            if start < pos {
                segments.push((false, &text[start..pos]));
            }
            start = pos;
            in_string = true;
        }
    }

    if start < text.len() {
        segments.push((in_string, &text[start..]));
    }

    segments
}

/// 截取解析错误位置附近的片段（line / column 均从 1 开始）
fn error_snippet(text: &str, line: usize, column: usize) -> String {
    let line_offset: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    let mut offset = (line_offset + column.saturating_sub(1)).min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }

    let before: usize = text[..offset]
        .chars()
        .rev()
        .take(SNIPPET_LIMIT / 2)
        .map(char::len_utf8)
        .sum();

    truncate_text(&text[offset - before..], SNIPPET_LIMIT)
}
