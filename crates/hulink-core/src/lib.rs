//! hulink-core - Core types and collaborator contracts for the hulink runtime
//!
//! This crate provides the message envelope, session identity models and the
//! two trait seams (session peer, sub-component) that the manager coordination
//! layer is built against. Concrete peers live behind [`peer::SessionPeer`];
//! a scripted in-process peer for demos and tests ships in [`peer::mock`].

pub mod component;
pub mod message;
pub mod model;
pub mod peer;
pub mod readiness;
pub mod version;

pub use component::{CompletionCallback, SubComponent};
pub use message::{
    CorrelationId, FunctionId, Message, Notification, Request, Response, ResultCode,
};
pub use model::{AppCategory, ColorScheme, HmiLevel, IconAsset, Locale, Rgb};
pub use peer::{DisconnectReason, PeerError, SessionEvent, SessionPeer};
pub use readiness::ReadinessState;
pub use version::Version;
