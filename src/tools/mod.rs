//! 工具箱：注册表、分发器与具体工具（local_tip、web_search）

pub mod dispatcher;
pub mod local_tip;
pub mod registry;
pub mod search;

pub use dispatcher::ToolDispatcher;
pub use local_tip::LocalTipTool;
pub use registry::{Tool, ToolError, ToolRegistry};
pub use search::WebSearchTool;
