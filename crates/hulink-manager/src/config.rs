//! Session configuration and the manager builder
//!
//! The builder validates everything up front and only then constructs the
//! facade, so no partially configured manager is ever observable. The
//! resulting [`SessionConfig`] is an immutable snapshot; changing identity
//! or appearance later means building a new manager.

use std::sync::Arc;

use hulink_core::{AppCategory, ColorScheme, FunctionId, IconAsset, Locale, SessionPeer, Version};
use thiserror::Error;
use tracing::info;

use crate::manager::{LinkManager, ManagerEventListener};
use crate::rpc::NotificationHandler;

/// Immutable session identity handed to the facade at build time
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Stable application identifier the head unit keys policies on
    pub app_id: String,
    /// Name shown to the driver
    pub app_name: String,
    /// Abbreviated name for constrained displays
    pub short_app_name: Option<String>,
    /// Classification; never empty, defaults to [Default]
    pub categories: Vec<AppCategory>,
    /// Derived: true when categories contain Media
    pub is_media: bool,
    pub locale: Locale,
    pub day_color_scheme: Option<ColorScheme>,
    pub night_color_scheme: Option<ColorScheme>,
    /// Lowest acceptable negotiated protocol version
    pub minimum_protocol_version: Version,
    /// Lowest acceptable negotiated RPC spec version
    pub minimum_rpc_version: Version,
    /// App icon uploaded and applied after the first ready transition
    pub icon: Option<IconAsset>,
}

/// Rejected before anything is constructed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum BuildError {
    #[error("An app id must be provided")]
    MissingAppId,

    #[error("An app name must be provided")]
    MissingAppName,

    #[error("A manager event listener must be provided")]
    MissingListener,

    #[error("A session peer must be provided")]
    MissingPeer,
}

/// Builder for [`LinkManager`].
///
/// App id, app name, the owner listener and the session peer are
/// mandatory; everything else falls back to documented defaults
/// (category `DEFAULT`, locale `EN-US`, version floors `1.0.0`).
#[derive(Default)]
pub struct LinkManagerBuilder {
    app_id: Option<String>,
    app_name: Option<String>,
    short_app_name: Option<String>,
    categories: Vec<AppCategory>,
    locale: Option<Locale>,
    day_color_scheme: Option<ColorScheme>,
    night_color_scheme: Option<ColorScheme>,
    minimum_protocol_version: Option<Version>,
    minimum_rpc_version: Option<Version>,
    icon: Option<IconAsset>,
    listener: Option<Arc<dyn ManagerEventListener>>,
    peer: Option<Arc<dyn SessionPeer>>,
    notification_listeners: Vec<(FunctionId, Arc<NotificationHandler>)>,
}

impl LinkManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn short_app_name(mut self, short_app_name: impl Into<String>) -> Self {
        self.short_app_name = Some(short_app_name.into());
        self
    }

    pub fn categories(mut self, categories: Vec<AppCategory>) -> Self {
        self.categories = categories;
        self
    }

    pub fn locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn day_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.day_color_scheme = Some(scheme);
        self
    }

    pub fn night_color_scheme(mut self, scheme: ColorScheme) -> Self {
        self.night_color_scheme = Some(scheme);
        self
    }

    pub fn minimum_protocol_version(mut self, version: Version) -> Self {
        self.minimum_protocol_version = Some(version);
        self
    }

    pub fn minimum_rpc_version(mut self, version: Version) -> Self {
        self.minimum_rpc_version = Some(version);
        self
    }

    pub fn icon(mut self, icon: IconAsset) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ManagerEventListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn peer(mut self, peer: Arc<dyn SessionPeer>) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Pre-register a notification listener; it is attached to the
    /// dispatcher at build time, before any message can arrive.
    pub fn notification_listener(
        mut self,
        function: FunctionId,
        handler: Arc<NotificationHandler>,
    ) -> Self {
        self.notification_listeners.push((function, handler));
        self
    }

    /// Validate and construct the facade, already in SettingUp
    pub fn build(self) -> Result<LinkManager, BuildError> {
        let app_id = match self.app_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(BuildError::MissingAppId),
        };
        let app_name = match self.app_name {
            Some(name) if !name.trim().is_empty() => name,
            _ => return Err(BuildError::MissingAppName),
        };
        let listener = self.listener.ok_or(BuildError::MissingListener)?;
        let peer = self.peer.ok_or(BuildError::MissingPeer)?;

        let categories = if self.categories.is_empty() {
            vec![AppCategory::Default]
        } else {
            self.categories
        };
        let is_media = categories.contains(&AppCategory::Media);

        let config = SessionConfig {
            app_id,
            app_name,
            short_app_name: self.short_app_name,
            categories,
            is_media,
            locale: self.locale.unwrap_or_default(),
            day_color_scheme: self.day_color_scheme,
            night_color_scheme: self.night_color_scheme,
            minimum_protocol_version: self.minimum_protocol_version.unwrap_or_else(Version::lowest),
            minimum_rpc_version: self.minimum_rpc_version.unwrap_or_else(Version::lowest),
            icon: self.icon,
        };
        info!(app_id = %config.app_id, app_name = %config.app_name, "link manager configured");

        Ok(LinkManager::from_parts(
            config,
            peer,
            listener,
            self.notification_listeners,
        ))
    }
}
