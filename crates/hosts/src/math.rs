//! Arithmetic host. No upstream, no credentials.

use mcp::{Arguments, Param, ParamKind, ToolDescriptor, ToolError, ToolRegistry};

/// Build the registry of math tools.
pub fn registry() -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(
        binary("add", "Add two numbers.", "First number", "Second number"),
        add,
    )?;
    registry.register(
        binary("subtract", "Subtract b from a.", "First number", "Second number"),
        subtract,
    )?;
    registry.register(
        binary("multiply", "Multiply two numbers.", "First number", "Second number"),
        multiply,
    )?;
    registry.register(binary("divide", "Divide a by b.", "Dividend", "Divisor"), divide)?;
    registry.register(
        binary("power", "Raise a to the power of b.", "Base number", "Exponent"),
        power,
    )?;
    registry.register(
        ToolDescriptor::new("sqrt", "Calculate square root of a number.").param(
            Param::required("a", ParamKind::Number)
                .describe("Number to calculate square root of"),
        ),
        sqrt,
    )?;
    registry.register(
        ToolDescriptor::new(
            "factorial",
            "Calculate factorial of a non-negative integer (exact up to 34!).",
        )
            .param(Param::required("n", ParamKind::Integer).describe("Non-negative integer")),
        factorial,
    )?;
    Ok(registry)
}

fn binary(name: &str, description: &str, a: &str, b: &str) -> ToolDescriptor {
    ToolDescriptor::new(name, description)
        .param(Param::required("a", ParamKind::Number).describe(a))
        .param(Param::required("b", ParamKind::Number).describe(b))
}

fn operands(args: &Arguments) -> Result<(f64, f64), ToolError> {
    Ok((args.f64("a")?, args.f64("b")?))
}

/// Render a result, refusing infinities and NaN.
fn number(n: f64) -> Result<String, ToolError> {
    if !n.is_finite() {
        return Err(ToolError::upstream("Result is not a finite number"));
    }
    // -0 prints as "-0".
    let n = if n == 0.0 { 0.0 } else { n };
    Ok(n.to_string())
}

async fn add(args: Arguments) -> Result<String, ToolError> {
    let (a, b) = operands(&args)?;
    number(a + b)
}

async fn subtract(args: Arguments) -> Result<String, ToolError> {
    let (a, b) = operands(&args)?;
    number(a - b)
}

async fn multiply(args: Arguments) -> Result<String, ToolError> {
    let (a, b) = operands(&args)?;
    number(a * b)
}

async fn divide(args: Arguments) -> Result<String, ToolError> {
    let (a, b) = operands(&args)?;
    if b == 0.0 {
        return Err(ToolError::upstream("Cannot divide by zero"));
    }
    number(a / b)
}

async fn power(args: Arguments) -> Result<String, ToolError> {
    let (a, b) = operands(&args)?;
    number(a.powf(b))
}

async fn sqrt(args: Arguments) -> Result<String, ToolError> {
    let a = args.f64("a")?;
    if a < 0.0 {
        return Err(ToolError::upstream(
            "Cannot calculate square root of negative number",
        ));
    }
    number(a.sqrt())
}

async fn factorial(args: Arguments) -> Result<String, ToolError> {
    let n = args.i64("n")?;
    if n < 0 {
        return Err(ToolError::upstream(
            "Factorial is not defined for negative numbers",
        ));
    }
    (2..=n as u128)
        .try_fold(1u128, u128::checked_mul)
        .map(|product| product.to_string())
        .ok_or_else(|| ToolError::upstream(format!("Factorial of {n} is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};
    use std::collections::HashSet;

    fn args(value: Value) -> Option<Map<String, Value>> {
        value.as_object().cloned()
    }

    async fn call(tool: &str, arguments: Value) -> Result<String, ToolError> {
        registry().unwrap().invoke(tool, args(arguments)).await
    }

    #[test]
    fn tool_names_are_unique() {
        let tools = registry().unwrap().list();
        let names: HashSet<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names.len(), 7);
        assert!(names.contains("factorial"));
    }

    #[tokio::test]
    async fn basic_arithmetic() {
        assert_eq!(call("multiply", json!({"a": 7, "b": 6})).await.unwrap(), "42");
        assert_eq!(call("power", json!({"a": 2, "b": 8})).await.unwrap(), "256");
        assert_eq!(call("divide", json!({"a": 5, "b": 2})).await.unwrap(), "2.5");
        assert_eq!(call("subtract", json!({"a": 1, "b": 1})).await.unwrap(), "0");
        assert_eq!(call("multiply", json!({"a": -1, "b": 0})).await.unwrap(), "0");
        assert_eq!(call("sqrt", json!({"a": 16})).await.unwrap(), "4");
    }

    #[tokio::test]
    async fn add_is_commutative() {
        for (x, y) in [(1.5, 2.25), (-3.0, 10.0), (1e10, 7.0), (0.1, 0.2)] {
            let xy = call("add", json!({"a": x, "b": y})).await.unwrap();
            let yx = call("add", json!({"a": y, "b": x})).await.unwrap();
            assert_eq!(xy, (x + y).to_string());
            assert_eq!(xy, yx);
        }
    }

    #[tokio::test]
    async fn divide_by_zero_is_an_error_result() {
        let result = registry()
            .unwrap()
            .dispatch("divide", args(json!({"a": 10, "b": 0})))
            .await;
        assert!(result.is_error);
        assert!(result.joined_text().contains("divide by zero"));
    }

    #[tokio::test]
    async fn sqrt_of_negative_is_an_error_result() {
        let result = registry()
            .unwrap()
            .dispatch("sqrt", args(json!({"a": -4})))
            .await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn factorial_bounds() {
        assert_eq!(call("factorial", json!({"n": 0})).await.unwrap(), "1");
        assert_eq!(call("factorial", json!({"n": 5})).await.unwrap(), "120");
        assert_eq!(call("factorial", json!({"n": 5.0})).await.unwrap(), "120");
        assert_eq!(
            call("factorial", json!({"n": 34})).await.unwrap(),
            "295232799039604140847618609643520000000"
        );
        assert!(call("factorial", json!({"n": 35})).await.is_err());
        let tools = registry().unwrap();
        assert!(tools.get("factorial").unwrap().description.contains("34!"));
        assert!(call("factorial", json!({"n": -1})).await.is_err());
        assert!(matches!(
            call("factorial", json!({"n": 2.5})).await,
            Err(ToolError::InvalidArguments { field, .. }) if field == "n"
        ));
    }

    #[tokio::test]
    async fn non_finite_results_are_errors() {
        assert!(call("power", json!({"a": 10, "b": 400})).await.is_err());
        assert!(call("multiply", json!({"a": 1e308, "b": 10})).await.is_err());
    }

    #[tokio::test]
    async fn missing_operand_names_the_field() {
        let err = call("add", json!({"a": 1})).await.unwrap_err();
        assert_eq!(err, ToolError::invalid("b", "missing required parameter"));
    }
}
