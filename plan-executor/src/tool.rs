//! The Tool Catalog (SPEC_FULL.md §4.12): `action` strings resolve to
//! `Arc<dyn Tool>` entries declared at startup rather than a hardcoded
//! match statement, mirroring the teacher's `PipelineServices` trait-object
//! pattern.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use common::error::AppError;
use serde_json::Value;

/// A single invocable action a plan step may reference.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Parameter keys that must be present and non-empty (spec.md §4.7
    /// "Validation"). The default validator checks exactly this set and
    /// reports `AppError::Validation` (surfaced as `MissingParameters`); a
    /// tool with stricter requirements overrides [`Tool::validate`] and
    /// returns `AppError::InvalidParameters` for a shape that isn't simply
    /// missing (spec.md §4.7: "attachments must be a list of file paths, not
    /// inlined content").
    fn required_parameters(&self) -> &[&str];

    /// Critical actions get submitted for background verification after a
    /// successful run (spec.md §4.7 "Verification").
    fn is_critical(&self) -> bool {
        false
    }

    /// Checks `parameters` before `call` is invoked. Missing or empty
    /// required values return a validation error without ever reaching
    /// `call`.
    fn validate(&self, parameters: &Value) -> Result<(), AppError> {
        for key in self.required_parameters() {
            let present = parameters
                .get(key)
                .is_some_and(|v| !matches!(v, Value::Null) && !matches!(v, Value::String(s) if s.trim().is_empty()));
            if !present {
                return Err(AppError::Validation(format!("missing required parameter `{key}`")));
            }
        }
        Ok(())
    }

    async fn call(&self, parameters: Value) -> Result<Value, AppError>;
}

/// Process-wide registry of tools, resolved by `action` string
/// (spec.md §9 "Dynamic method dispatch").
#[derive(Clone, Default)]
pub struct ToolCatalog {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    #[must_use]
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    #[must_use]
    pub fn get(&self, action: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(action).cloned()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn required_parameters(&self) -> &[&str] {
            &["message"]
        }
        async fn call(&self, parameters: Value) -> Result<Value, AppError> {
            Ok(parameters)
        }
    }

    /// A tool with a stricter check beyond "is this key present": attachments
    /// must be a list of file paths, never inlined content.
    struct AttachTool;

    #[async_trait]
    impl Tool for AttachTool {
        fn name(&self) -> &str {
            "attach"
        }
        fn required_parameters(&self) -> &[&str] {
            &["attachments"]
        }
        fn validate(&self, parameters: &Value) -> Result<(), AppError> {
            match parameters.get("attachments") {
                Some(Value::Array(items)) if items.iter().all(Value::is_string) => Ok(()),
                Some(_) => Err(AppError::InvalidParameters(
                    "attachments must be a list of file paths, not inlined content".to_string(),
                )),
                None => Err(AppError::Validation("missing required parameter `attachments`".to_string())),
            }
        }
        async fn call(&self, parameters: Value) -> Result<Value, AppError> {
            Ok(parameters)
        }
    }

    #[test]
    fn validate_rejects_a_missing_required_parameter() {
        let tool = EchoTool;
        assert!(tool.validate(&json!({})).is_err());
    }

    #[test]
    fn validate_rejects_an_empty_string_value() {
        let tool = EchoTool;
        assert!(tool.validate(&json!({ "message": "   " })).is_err());
    }

    #[test]
    fn validate_accepts_a_populated_value() {
        let tool = EchoTool;
        assert!(tool.validate(&json!({ "message": "hi" })).is_ok());
    }

    #[test]
    fn catalog_resolves_by_action_name() {
        let catalog = ToolCatalog::new().with_tool(Arc::new(EchoTool));
        assert!(catalog.get("echo").is_some());
        assert!(catalog.get("missing").is_none());
    }

    #[test]
    fn stricter_validator_distinguishes_invalid_from_missing() {
        let tool = AttachTool;
        assert_eq!(
            tool.validate(&json!({})).unwrap_err().validation_error_type(),
            "MissingParameters"
        );
        assert_eq!(
            tool.validate(&json!({ "attachments": "inline text" })).unwrap_err().validation_error_type(),
            "InvalidParameters"
        );
        assert!(tool.validate(&json!({ "attachments": ["a.txt", "b.txt"] })).is_ok());
    }
}
