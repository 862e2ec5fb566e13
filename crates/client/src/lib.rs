//! # Cohort Client Crate
//!
//! Client side of the community channel: a connection session that joins
//! channels over the event stream, survives transport loss with bounded
//! exponential backoff, rejoins what it held and heals the gap from history.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cohort_client::{ConnectionSession, RestHistory, WebSocketTransport};
//! use cohort_config::ClientConfig;
//!
//! # async fn run() -> cohort_client::ClientResult<()> {
//! let transport = WebSocketTransport::new("http://127.0.0.1:7070", "token")?;
//! let history = RestHistory::new("http://127.0.0.1:7070", "token")?;
//! let (session, mut events) = ConnectionSession::start(Arc::new(transport), Arc::new(history), ClientConfig::default());
//!
//! session.wait_for(|state| matches!(state, cohort_client::SessionState::Connected { .. })).await?;
//! session.join("cohort-1").await?;
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod error;
pub mod history;
pub mod session;
pub mod timeline;
pub mod transport;

pub use backoff::Backoff;
pub use error::{ClientError, ClientResult};
pub use history::{HistorySource, RestHistory};
pub use session::{ConnectionSession, JoinAck, SessionEvent, SessionHandle, SessionState};
pub use timeline::Timeline;
pub use transport::{Link, Transport, WebSocketTransport};
