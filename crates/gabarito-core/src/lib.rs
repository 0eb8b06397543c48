//! gabarito-core — Session, authorization gate, exam lifecycle and view models.
//!
//! This crate holds the client-side rules of the exam-correction system. It
//! talks to the backend only through the `ExamBackend` trait, which
//! `gabarito-client` implements over HTTP and in memory.

pub mod access;
pub mod backend;
pub mod display;
pub mod error;
pub mod labels;
pub mod lifecycle;
pub mod model;
pub mod session;
pub mod view;

pub use access::{can_access, check, Access, Route};
pub use backend::ExamBackend;
pub use error::{ClientError, ClientResult, ErrorBody, Rejection};
pub use lifecycle::{Affordances, CommandOutcome, ExamAction, ExamCommand, ExamController};
pub use session::{FileSessionStorage, MemorySessionStorage, SessionStorage, SessionStore};
