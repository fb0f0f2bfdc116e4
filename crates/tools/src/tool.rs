use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use squall_core::{Result, RiskCategory};

/// Result of one tool invocation, keyed by the call id the agent loop
/// supplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { tool_call_id: tool_call_id.into(), content: content.into(), error: None }
    }

    pub fn error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self { tool_call_id: tool_call_id.into(), content: String::new(), error: Some(error.into()) }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// The core trait all tools implement.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Unique name of this tool
    fn name(&self) -> &str;

    /// What this tool does
    fn description(&self) -> &str;

    /// Nominal risk tier of the tool itself; per-invocation risk comes
    /// from classifying the concrete arguments
    fn risk_category(&self) -> RiskCategory;

    /// Execute the tool with the given arguments
    async fn execute(&self, tool_call_id: String, arguments: &Value) -> Result<ToolResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("call_1", "output");
        assert!(result.is_success());
        assert!(!result.is_error());
        assert_eq!(result.content, "output");
    }

    #[test]
    fn test_tool_result_error() {
        let result = ToolResult::error("call_2", "boom");
        assert!(result.is_error());
        assert_eq!(result.error, Some("boom".to_string()));
        assert!(result.content.is_empty());
    }

    #[test]
    fn test_tool_result_serialization_omits_absent_error() {
        let result = ToolResult::success("call_3", "fine");
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("error"));
    }
}
