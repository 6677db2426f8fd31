//! chainwatch-api: query façade and its HTTP binding.
//!
//! - [`QueryFacade`]: the three read/subscribe operations, transport-agnostic
//! - [`LedgerFacade`]: façade over any `AddressLedger`
//! - [`router`] / [`serve`]: axum routes under `/api`

pub mod facade;
pub mod handlers;
pub mod server;

pub use facade::{LedgerFacade, QueryFacade};
pub use handlers::{ApiError, ApiState};
pub use server::{router, serve};
