pub mod connection;
pub mod console;
pub mod coordinator;
pub mod registry;
pub mod router;
pub mod server;

pub use console::AdminConsole;
pub use coordinator::Coordinator;
pub use registry::ConnectionRegistry;
pub use router::GatewayState;
pub use server::{port_in_range, start, GatewayHandle, ServerConfig, PORT_MAX, PORT_MIN};
