// agentboard-api: wire protocol, realtime transport, and snapshot client.

pub mod error;
pub mod protocol;
pub mod snapshot;
pub mod transport;
pub mod websocket;

pub use error::Error;
pub use protocol::{Channel, InboundMessage, MessageType, OutboundMessage};
pub use snapshot::SnapshotClient;
pub use transport::TransportConfig;
pub use websocket::{Connector, TransportEvent, TungsteniteConnector, WsConnection};
