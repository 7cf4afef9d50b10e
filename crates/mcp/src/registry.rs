//! Tool registration and dispatch for hosts.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ToolError;
use crate::protocol::{CallToolResult, Tool};
use crate::schema::{Arguments, InputSchema, Param};

/// Future returned by a tool handler.
pub type ToolFuture = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send>>;

type Handler = Arc<dyn Fn(Arguments) -> ToolFuture + Send + Sync>;

/// Name, description and input schema of a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: InputSchema,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: InputSchema::new(),
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.schema = self.schema.param(param);
        self
    }

    /// Wire form used in `tools/list`.
    pub fn to_tool(&self) -> Tool {
        Tool {
            name: self.name.clone(),
            description: Some(self.description.clone()),
            input_schema: self.schema.to_json(),
        }
    }
}

struct Entry {
    descriptor: ToolDescriptor,
    handler: Handler,
}

/// Ordered set of tools a host serves.
///
/// Built once at host startup and read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
    call_timeout: Option<Duration>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.entries.iter().map(|e| &e.descriptor.name).collect();
        f.debug_struct("ToolRegistry")
            .field("tools", &names)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort handlers that run longer than `timeout`.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Register a tool.
    ///
    /// The handler receives arguments already validated against the
    /// descriptor's schema.
    pub fn register<F, Fut>(&mut self, descriptor: ToolDescriptor, handler: F) -> Result<(), ToolError>
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        if self.index.contains_key(&descriptor.name) {
            return Err(ToolError::Duplicate(descriptor.name));
        }

        let handler: Handler = Arc::new(move |arguments| Box::pin(handler(arguments)) as ToolFuture);
        self.index
            .insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            handler,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    /// Descriptors in registration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Wire descriptors in registration order.
    pub fn list(&self) -> Vec<Tool> {
        self.descriptors().map(ToolDescriptor::to_tool).collect()
    }

    /// Run a tool and encode the outcome as a call result.
    ///
    /// Never fails: unknown tools, bad arguments, handler errors and handler
    /// panics all come back as `is_error` results.
    pub async fn dispatch(&self, name: &str, arguments: Option<Map<String, Value>>) -> CallToolResult {
        match self.invoke(name, arguments).await {
            Ok(text) => CallToolResult::text(text),
            Err(e) => {
                debug!(tool = name, error = %e, "tool call failed");
                CallToolResult::error(e.to_string())
            }
        }
    }

    /// Run a tool, returning the handler's text or the reason it failed.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<String, ToolError> {
        let index = *self
            .index
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        let entry = &self.entries[index];
        let arguments = entry.descriptor.schema.validate(arguments)?;

        // Own task per call so a panicking handler can't take the host down.
        let task = tokio::spawn((entry.handler)(arguments));
        let joined = match self.call_timeout {
            Some(limit) => {
                let abort = task.abort_handle();
                match tokio::time::timeout(limit, task).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        abort.abort();
                        warn!(tool = name, ?limit, "tool call timed out");
                        return Err(ToolError::Upstream(format!(
                            "tool {name} timed out after {limit:?}"
                        )));
                    }
                }
            }
            None => task.await,
        };

        match joined {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                warn!(tool = name, "tool handler panicked");
                Err(ToolError::Upstream(format!("tool {name} failed unexpectedly")))
            }
            Err(e) => Err(ToolError::Upstream(format!("tool {name} was cancelled: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamKind;
    use serde_json::json;
    use std::collections::HashSet;

    fn args(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn echo() -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo the message back")
            .param(Param::required("message", ParamKind::String))
    }

    async fn echo_message(args: Arguments) -> Result<String, ToolError> {
        Ok(args.str("message")?.to_string())
    }

    async fn refuse(_: Arguments) -> Result<String, ToolError> {
        Err(ToolError::upstream("upstream said no"))
    }

    async fn explode(_: Arguments) -> Result<String, ToolError> {
        panic!("handler bug")
    }

    async fn dawdle(_: Arguments) -> Result<String, ToolError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok("late".to_string())
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(echo(), echo_message).unwrap();
        registry
            .register(ToolDescriptor::new("fail", "Always fails"), refuse)
            .unwrap();
        registry
            .register(ToolDescriptor::new("panic", "Always panics"), explode)
            .unwrap();
        registry
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = registry();
        let err = registry.register(echo(), echo_message).unwrap_err();
        assert_eq!(err, ToolError::Duplicate("echo".into()));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn list_preserves_order_and_names_are_unique() {
        let tools = registry().list();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["echo", "fail", "panic"]);
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert_eq!(tools[0].input_schema["required"], json!(["message"]));
    }

    #[tokio::test]
    async fn dispatch_runs_handler() {
        let result = registry()
            .dispatch("echo", args(json!({"message": "hello"})))
            .await;
        assert!(!result.is_error);
        assert_eq!(result.joined_text(), "hello");
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let registry = registry();
        assert_eq!(
            registry.invoke("nope", None).await,
            Err(ToolError::Unknown("nope".into()))
        );
        let result = registry.dispatch("nope", None).await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("unknown tool: nope"));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_handler() {
        let result = registry().dispatch("echo", args(json!({"message": 3}))).await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("message"));
    }

    #[tokio::test]
    async fn handler_error_and_panic_are_contained() {
        let registry = registry();

        let failed = registry.dispatch("fail", None).await;
        assert!(failed.is_error);
        assert_eq!(failed.joined_text(), "upstream said no");

        let panicked = registry.dispatch("panic", None).await;
        assert!(panicked.is_error);
        assert!(panicked.joined_text().contains("failed unexpectedly"));

        // Still serving after the panic.
        let ok = registry.dispatch("echo", args(json!({"message": "ok"}))).await;
        assert_eq!(ok.joined_text(), "ok");
    }

    #[tokio::test]
    async fn slow_handlers_time_out() {
        let mut registry = ToolRegistry::new().with_call_timeout(Duration::from_millis(20));
        registry
            .register(ToolDescriptor::new("slow", "Sleeps"), dawdle)
            .unwrap();

        let result = registry.dispatch("slow", None).await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("timed out"));
    }
}
