//! BITS Upload Protocol
//!
//! Server side of the Background Intelligent Transfer Service upload
//! protocol: resumable uploads over HTTP with a custom request method.
//!
//! Protocol Flow:
//! 1. Client sends `create-session` advertising the protocols it speaks
//! 2. Server answers with a session id and the negotiated protocol
//! 3. Client sends `fragment` packets, each a byte range of one file
//! 4. Server appends only bytes past what it already holds and reports
//!    the new size, so a client can resume from any point
//! 5. Client sends `close-session` (or `cancel-session`) and the session
//!    directory is removed

pub mod events;
pub mod filter;
pub mod fragment;
pub mod handler;
pub mod locks;
pub mod range;
pub mod response;
pub mod session;
pub mod types;

pub use events::{BitsEvent, EventListener, NoopListener, Notifier};
pub use filter::FilenameFilter;
pub use fragment::{FragmentAck, FragmentRequest, Reconciler};
pub use handler::{BitsHandler, BitsRequest};
pub use range::{ContentRange, RangeError};
pub use response::BitsResponse;
pub use session::{CreatedSession, SessionId, SessionStore};
pub use types::*;
