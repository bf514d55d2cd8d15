//! 报告合成服务 - 业务能力层
//!
//! 只负责把多个部分报告打包交给模型合并。去重、年份合并、
//! 严重度取舍都由模型完成，本地不做任何数值平均。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AnalysisError, AnalysisResult};
use crate::models::profile::UserProfile;
use crate::models::report::{FinalReport, PartialReport};
use crate::services::model_invoker::{InvocationPayload, ModelInvoker};

pub struct ReportSynthesizer {
    invoker: Arc<ModelInvoker>,
}

impl ReportSynthesizer {
    pub fn new(invoker: Arc<ModelInvoker>) -> Self {
        Self { invoker }
    }

    /// 合并部分报告
    ///
    /// 只有一个部分报告时原样返回，不发起合成调用
    pub async fn synthesize(
        &self,
        mut partials: Vec<PartialReport>,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> AnalysisResult<FinalReport> {
        match partials.len() {
            0 => Err(AnalysisError::NoBatchesProduced),
            1 => Ok(partials.remove(0)),
            count => {
                info!("🧩 正在合成 {} 个部分报告...", count);
                self.invoker
                    .invoke(InvocationPayload::Synthesis(&partials), profile, cancel)
                    .await
            }
        }
    }
}
