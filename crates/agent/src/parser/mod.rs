//! Parsing of model turns: the tagged-text protocol and the literal-mapping
//! decoder used for tool arguments.

pub mod literal;
pub mod response;

pub use literal::{LiteralError, parse_mapping};
pub use response::{
    Classification, NO_TOOL, ParsedCall, ToolInvocation, classify, cut_at_stop, parse_tool_call,
};
