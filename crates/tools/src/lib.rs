//! Built-in tool implementations for Parley.
//!
//! Tools give the model the ability to look things up (time, weather) and
//! to answer through the transport directly (sending a picture).

pub mod image;
pub mod time;
pub mod weather;

pub use image::SendRandomImageTool;
pub use time::{GetFullTimeTool, GetOnlyTimeTool};
pub use weather::GetWeatherTool;

use parley_core::tool::{ToolContract, ToolRegistry};

/// The static registration table of built-in tools.
pub fn builtin_contracts() -> Vec<ToolContract> {
    vec![
        ToolContract::new(GetOnlyTimeTool),
        ToolContract::new(GetFullTimeTool),
        ToolContract::new(GetWeatherTool),
        ToolContract::new(SendRandomImageTool::new())
            .terminating()
            .with_context(),
    ]
}

/// Create a registry holding all built-in tools.
pub fn default_registry() -> ToolRegistry {
    ToolRegistry::from_contracts(builtin_contracts())
}
