// liftwire-api: async session layer for the elevator call WebSocket API

pub mod auth;
pub mod connection;
pub mod correlator;
pub mod envelope;
pub mod error;
pub mod evidence;
pub mod inbox;
mod listener;
pub mod session;
pub mod token_store;
pub mod transport;

pub use auth::{CachedToken, Credentials, TokenManager};
pub use connection::ConnectionState;
pub use envelope::{BuildingId, CorrelationId, Envelope, InboundFrame, MessageType};
pub use error::Error;
pub use evidence::{EvidenceEntry, EvidenceRecorder, EvidenceSink, FileEvidence, MemoryEvidence, Phase};
pub use session::{Session, SessionConfig};
pub use token_store::{MemoryTokenStore, StoredToken, TokenStore};
pub use transport::{TlsMode, TransportConfig};
