//! Cookie-keyed session storage.
//!
//! This crate keeps per-client state across stateless request/response
//! cycles:
//! - [`SessionStore`]: the storage contract, with [`MemoryStore`]
//!   (single-process, volatile) and [`FileStore`] (one JSON file per session,
//!   committed by atomic rename)
//! - Sliding TTL expiration: every successful load or save pushes the expiry
//!   to `now + ttl`
//! - [`Session`]: a per-request facade holding the working copy, with
//!   identifier rotation for fixation resistance
//! - [`Sweeper`]: background reclamation of expired and corrupt records
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_session::{Session, SessionConfig, open_store};
//!
//! let config = SessionConfig::default();
//! let store = open_store(&config)?;
//!
//! let mut session = Session::new(store.clone());
//! if session.load(candidate).await.is_err() {
//!     session.start().await?;
//! }
//! session.set("user", 42).await?;
//! let set_cookie = session.cookie(&config.cookie).to_string();
//! ```

mod config;
mod cookie;
mod error;
mod file;
mod id;
mod memory;
mod record;
mod session;
mod store;
mod sweep;
mod ttl;

pub use config::{SessionConfig, StoreKind, default_storage_dir};
pub use cookie::{CookieSettings, SameSite, SessionCookie, find_session_id};
pub use error::{Error, INVALID_SESSION, Result, SESSION_EXPIRED};
pub use file::{FileStore, SessionSummary, session_id_from_file_name};
pub use id::SessionId;
pub use memory::MemoryStore;
pub use record::{SessionData, SessionRecord};
pub use session::Session;
pub use store::{SessionStore, open_store};
pub use sweep::{SweepReport, Sweeper, SweeperHandle};
pub use ttl::{TtlPolicy, now_ms};
