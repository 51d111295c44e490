//! Shared test helpers for state and driver tests.

use async_trait::async_trait;
use fsmkit_core::{
    FnTool, Generation, Message, Model, ModelError, ToolError, ToolRegistry, Usage, number_value,
};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// A model that returns the same text forever and counts its calls.
pub struct CountingModel {
    text: String,
    call_count: Mutex<usize>,
}

impl CountingModel {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            call_count: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Model for CountingModel {
    fn name(&self) -> &str {
        "counting_mock"
    }

    async fn generate(
        &self,
        _messages: &[Message],
        _stop_word: Option<&str>,
        _max_tokens: u32,
    ) -> Result<Generation, ModelError> {
        *self.call_count.lock().unwrap() += 1;
        Ok(Generation::new(
            self.text.clone(),
            Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
            Duration::from_millis(1),
        ))
    }
}

fn number(args: &fsmkit_core::ToolArgs, key: &str) -> Result<f64, ToolError> {
    args.get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{key}' must be a number")))
}

fn arithmetic(
    args: &fsmkit_core::ToolArgs,
    op: impl Fn(f64, f64) -> Result<f64, ToolError>,
) -> Result<Value, ToolError> {
    let result = op(number(args, "a")?, number(args, "b")?)?;
    Ok(number_value(result))
}

/// `add`, `subtract`, `multiply` and `divide` over arguments `a` and `b`.
pub fn arithmetic_tools() -> ToolRegistry {
    ToolRegistry::new()
        .with(FnTool::new("add", "Add a and b", |args| {
            arithmetic(args, |a, b| Ok(a + b))
        }))
        .with(FnTool::new("subtract", "Subtract b from a", |args| {
            arithmetic(args, |a, b| Ok(a - b))
        }))
        .with(FnTool::new("multiply", "Multiply a by b", |args| {
            arithmetic(args, |a, b| Ok(a * b))
        }))
        .with(FnTool::new("divide", "Divide a by b", |args| {
            arithmetic(args, |a, b| {
                if b == 0.0 {
                    Err(ToolError::ExecutionFailed("division by zero".into()))
                } else {
                    Ok(a / b)
                }
            })
        }))
}
