//! Built-in arithmetic tools for replayed runs.

use fsmkit_core::{FnTool, ToolArgs, ToolError, ToolRegistry, number_value};
use serde_json::Value;

fn operand(args: &ToolArgs, key: &str) -> Result<f64, ToolError> {
    match args.get(key) {
        Some(value) => value
            .as_f64()
            .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a number, got {value}"))),
        None => Err(ToolError::InvalidArguments(format!("missing argument '{key}'"))),
    }
}

fn binary(
    args: &ToolArgs,
    op: impl Fn(f64, f64) -> Result<f64, ToolError>,
) -> Result<Value, ToolError> {
    let result = op(operand(args, "a")?, operand(args, "b")?)?;
    Ok(number_value(result))
}

/// A registry with `add`, `subtract`, `multiply` and `divide`, each taking
/// numeric arguments `a` and `b`.
pub fn arithmetic() -> ToolRegistry {
    ToolRegistry::new()
        .with(FnTool::new("add", "add(a, b): returns a + b", |args| {
            binary(args, |a, b| Ok(a + b))
        }))
        .with(FnTool::new("subtract", "subtract(a, b): returns a - b", |args| {
            binary(args, |a, b| Ok(a - b))
        }))
        .with(FnTool::new("multiply", "multiply(a, b): returns a * b", |args| {
            binary(args, |a, b| Ok(a * b))
        }))
        .with(FnTool::new("divide", "divide(a, b): returns a / b; b must not be 0", |args| {
            binary(args, |a, b| {
                if b == 0.0 {
                    Err(ToolError::ExecutionFailed("division by zero".into()))
                } else {
                    Ok(a / b)
                }
            })
        }))
}
