//! hulink-manager - Manager coordination and RPC dispatch engine
//!
//! This crate ties an application to a head-unit session: it aggregates
//! sub-component readiness into one lifecycle, correlates outbound requests
//! with their responses, runs the post-ready icon bootstrap and exposes the
//! whole thing behind the [`LinkManager`] facade.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       LinkManager                           │
//! │  owner-facing facade (builder, lifecycle, gated accessors)  │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ Readiness    │  │ Bootstrap    │  │ Sub-components   │   │
//! │  │ monitor      │  │ sequencer    │  │ (files/perm/scr) │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘   │
//! │                          │                                  │
//! │                   ┌──────┴───────┐                          │
//! │                   │RpcDispatcher │                          │
//! │                   │(correlation) │                          │
//! │                   └──────┬───────┘                          │
//! │                          │                                  │
//! │                   ┌──────┴──────┐                           │
//! │                   │ SessionPeer │                           │
//! │                   │ (transport) │                           │
//! │                   └─────────────┘                           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod bootstrap;

pub mod components;
pub mod config;
pub mod manager;
pub mod readiness;
pub mod rpc;

pub use config::{BuildError, LinkManagerBuilder, SessionConfig};
pub use manager::{LinkManager, ManagerEventListener, ManagerState};
pub use readiness::aggregate;
pub use rpc::{
    BatchId, BatchListener, BatchUpdate, DispatchError, ListenerId, RequestOutcome, RpcDispatcher,
};

// Re-export for convenience
pub use hulink_core::{
    AppCategory, ColorScheme, CompletionCallback, CorrelationId, FunctionId, HmiLevel, IconAsset,
    Locale, Message, Notification, ReadinessState, Request, Response, ResultCode, SessionEvent,
    SessionPeer, SubComponent, Version,
};
