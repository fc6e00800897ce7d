//! Tools the model can call during a session.

pub mod arguments;
pub mod tool;
pub mod types;
pub mod validation;
pub mod weather;

pub use arguments::ToolArguments;
pub use tool::{FunctionTool, Tool};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
pub use validation::check_arguments;
pub use weather::{
    weather_tool, Coordinates, GeoMarker, MarkerState, Reading, SharedMarker,
    WEATHER_TOOL_NAME,
};
