mod server;
mod types;

pub use server::run_mcp_server;
