use async_trait::async_trait;

use crate::defs::{AnalysisRequest, AnalysisResult, Analyzer, DigestLine, GatewayError, GatewayResult, Language};

/// Analyzer used when no scoring service is configured.
///
/// Every call fails, so collected records stay unanalyzed until a real
/// analyzer is wired in and the next run picks them up.
pub struct OfflineAnalyzer;

#[async_trait]
impl Analyzer for OfflineAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> GatewayResult<AnalysisResult> {
        Err(GatewayError::Analyzer(format!(
            "no analyzer configured, leaving '{}' unanalyzed",
            request.title
        )))
    }

    async fn summarize(&self, _lines: &[DigestLine], _language: Language) -> GatewayResult<String> {
        Err(GatewayError::Analyzer("no analyzer configured".to_string()))
    }
}
