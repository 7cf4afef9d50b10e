//! Scripted tool calls against each host.
//!
//! The same script runs over a stdio session (`toolbox demo`) or straight
//! against an in-process registry (`toolbox direct`).

use hosts::HostKind;
use mcp::{CallToolResult, Session, ToolRegistry};
use serde_json::{Map, Value, json};

/// Something that can run a tool by name.
pub trait ToolCaller {
    async fn call(&self, tool: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult>;
}

impl ToolCaller for Session {
    async fn call(&self, tool: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult> {
        self.call_tool(tool, Some(arguments)).await
    }
}

impl ToolCaller for ToolRegistry {
    async fn call(&self, tool: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult> {
        Ok(self.dispatch(tool, Some(arguments)).await)
    }
}

/// One scripted call.
struct Step {
    label: &'static str,
    tool: &'static str,
    arguments: Value,
    /// Characters of output to print; `None` prints everything.
    preview: Option<usize>,
}

impl Step {
    fn new(label: &'static str, tool: &'static str, arguments: Value) -> Self {
        Self {
            label,
            tool,
            arguments,
            preview: None,
        }
    }

    fn preview(mut self, chars: usize) -> Self {
        self.preview = Some(chars);
        self
    }
}

fn steps(kind: HostKind) -> Vec<Step> {
    match kind {
        HostKind::Math => vec![
            Step::new("5 + 3", "add", json!({"a": 5, "b": 3})),
            Step::new("7 * 6", "multiply", json!({"a": 7, "b": 6})),
            Step::new("2 ^ 8", "power", json!({"a": 2, "b": 8})),
            Step::new("sqrt(16)", "sqrt", json!({"a": 16})),
            Step::new("10 / 0", "divide", json!({"a": 10, "b": 0})),
        ],
        HostKind::Weather => vec![
            Step::new(
                "Weather in Warsaw",
                "get_weather_by_city",
                json!({"city": "Warsaw", "country_code": "PL"}),
            ),
            Step::new(
                "Forecast for 52.2297, 21.0122",
                "get_forecast",
                json!({"latitude": 52.2297, "longitude": 21.0122}),
            )
            .preview(400),
        ],
        HostKind::Wikipedia => vec![
            Step::new(
                "Summary of Machine learning",
                "get_wikipedia_summary",
                json!({"title": "Machine learning"}),
            )
            .preview(300),
        ],
        HostKind::Arxiv => vec![
            Step::new(
                "Papers on machine learning",
                "search_papers",
                json!({"query": "machine learning", "max_results": 2}),
            )
            .preview(600),
        ],
        HostKind::WebSearch => vec![
            Step::new(
                "Web search for the Model Context Protocol",
                "search",
                json!({"query": "Model Context Protocol", "max_results": 3}),
            )
            .preview(600),
        ],
    }
}

/// Run the script for `kind`, printing each call's outcome.
///
/// Tool errors are printed and the script goes on. Session errors stop the
/// script and are returned.
pub async fn run<C: ToolCaller>(kind: HostKind, caller: &C) -> mcp::Result<()> {
    println!("=== {kind} ===");
    for step in steps(kind) {
        let arguments = match step.arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let result = caller.call(step.tool, arguments).await?;
        let text = result.joined_text();
        let shown = match step.preview {
            Some(limit) if text.chars().count() > limit => {
                format!("{}...", text.chars().take(limit).collect::<String>())
            }
            _ => text,
        };
        if result.is_error {
            println!("{}: error: {shown}", step.label);
        } else {
            println!("{}: {shown}", step.label);
        }
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hosts::Settings;

    #[test]
    fn every_step_names_a_registered_tool() {
        let settings = Settings {
            openweathermap_api_key: Some("k".to_string()),
            tavily_api_key: Some("k".to_string()),
            ..Settings::default()
        };
        for kind in HostKind::ALL {
            let registry = kind.registry(&settings).unwrap();
            for step in steps(kind) {
                assert!(registry.get(step.tool).is_some(), "{kind}: {}", step.tool);
                assert!(step.arguments.is_object());
            }
        }
    }

    #[tokio::test]
    async fn math_script_runs_in_process() {
        run(HostKind::Math, &hosts::math::registry().unwrap())
            .await
            .unwrap();
    }
}
