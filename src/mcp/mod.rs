//! Model Context Protocol connection pool: transports, state model, port
//! table, the pool itself, and the environment/credential resolver that
//! decides which servers are eligible (spec §4.F/§4.G/§4.H).

pub mod config_resolver;
pub mod model;
pub mod ports;
pub mod pool;
pub mod transport;

pub use config_resolver::{ConfigResolver, ResolvedServer};
pub use model::{ConnectionState, MCPServerConfig, TransportConfig};
pub use pool::{McpPool, PoolMetricsSnapshot};
