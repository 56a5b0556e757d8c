//! Tools CLI command handler: built-in tool discovery.

use anyhow::{Context, Result};

use agentharness::config::Config;
use agentharness::tools::builtin_tools;

/// List the tools a `run` agent is given, with their input schemas.
pub(crate) fn cmd_tools() -> Result<()> {
    let config = Config::load().with_context(|| "Failed to load configuration")?;
    let tools = builtin_tools(&config);

    println!("Built-in tools:");
    println!();
    for tool in &tools {
        let descriptor = tool.descriptor();
        let required = descriptor
            .input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| {
                r.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        println!("  {:<24} {}", descriptor.name, descriptor.description);
        if !required.is_empty() {
            println!("  {:<24} required: {}", "", required);
        }
    }
    println!();
    match config.agent.termination_tool.as_deref() {
        Some(name) => println!("Termination tool: {}", name),
        None => println!("Termination tool: disabled"),
    }
    Ok(())
}
