//! Typed message envelopes exchanged with the head unit
//!
//! The runtime never inspects payload internals; payloads travel as opaque
//! [`serde_json::Value`] maps and only the envelope (function identifier,
//! message kind, correlation sequence, result code) is interpreted here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed catalog of message-type identifiers understood by this runtime.
///
/// `On*` variants are notification functions emitted by the head unit; the
/// rest are request functions originated by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionId {
    RegisterAppInterface,
    UnregisterAppInterface,
    SetAppIcon,
    PutFile,
    DeleteFile,
    ListFiles,
    Show,
    Speak,
    Alert,
    AddCommand,
    DeleteCommand,
    SubscribeButton,
    UnsubscribeButton,
    GenericResponse,
    OnHmiStatus,
    OnPermissionsChange,
    OnButtonPress,
    OnCommand,
    OnLanguageChange,
    OnSystemRequest,
}

impl std::fmt::Display for FunctionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FunctionId::RegisterAppInterface => "RegisterAppInterface",
            FunctionId::UnregisterAppInterface => "UnregisterAppInterface",
            FunctionId::SetAppIcon => "SetAppIcon",
            FunctionId::PutFile => "PutFile",
            FunctionId::DeleteFile => "DeleteFile",
            FunctionId::ListFiles => "ListFiles",
            FunctionId::Show => "Show",
            FunctionId::Speak => "Speak",
            FunctionId::Alert => "Alert",
            FunctionId::AddCommand => "AddCommand",
            FunctionId::DeleteCommand => "DeleteCommand",
            FunctionId::SubscribeButton => "SubscribeButton",
            FunctionId::UnsubscribeButton => "UnsubscribeButton",
            FunctionId::GenericResponse => "GenericResponse",
            FunctionId::OnHmiStatus => "OnHmiStatus",
            FunctionId::OnPermissionsChange => "OnPermissionsChange",
            FunctionId::OnButtonPress => "OnButtonPress",
            FunctionId::OnCommand => "OnCommand",
            FunctionId::OnLanguageChange => "OnLanguageChange",
            FunctionId::OnSystemRequest => "OnSystemRequest",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for FunctionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RegisterAppInterface" => Ok(FunctionId::RegisterAppInterface),
            "UnregisterAppInterface" => Ok(FunctionId::UnregisterAppInterface),
            "SetAppIcon" => Ok(FunctionId::SetAppIcon),
            "PutFile" => Ok(FunctionId::PutFile),
            "DeleteFile" => Ok(FunctionId::DeleteFile),
            "ListFiles" => Ok(FunctionId::ListFiles),
            "Show" => Ok(FunctionId::Show),
            "Speak" => Ok(FunctionId::Speak),
            "Alert" => Ok(FunctionId::Alert),
            "AddCommand" => Ok(FunctionId::AddCommand),
            "DeleteCommand" => Ok(FunctionId::DeleteCommand),
            "SubscribeButton" => Ok(FunctionId::SubscribeButton),
            "UnsubscribeButton" => Ok(FunctionId::UnsubscribeButton),
            "GenericResponse" => Ok(FunctionId::GenericResponse),
            "OnHmiStatus" => Ok(FunctionId::OnHmiStatus),
            "OnPermissionsChange" => Ok(FunctionId::OnPermissionsChange),
            "OnButtonPress" => Ok(FunctionId::OnButtonPress),
            "OnCommand" => Ok(FunctionId::OnCommand),
            "OnLanguageChange" => Ok(FunctionId::OnLanguageChange),
            "OnSystemRequest" => Ok(FunctionId::OnSystemRequest),
            _ => Err(format!("Unknown function: '{}'", s)),
        }
    }
}

/// Outcome code carried by every response from the head unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Success,
    Warnings,
    Rejected,
    Disallowed,
    InvalidData,
    TimedOut,
    GenericError,
}

impl ResultCode {
    /// Warnings counts as success: the head unit performed the operation
    /// but wants the application to know something was off.
    pub fn is_success(&self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::Warnings)
    }
}

impl std::fmt::Display for ResultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultCode::Success => "SUCCESS",
            ResultCode::Warnings => "WARNINGS",
            ResultCode::Rejected => "REJECTED",
            ResultCode::Disallowed => "DISALLOWED",
            ResultCode::InvalidData => "INVALID_DATA",
            ResultCode::TimedOut => "TIMED_OUT",
            ResultCode::GenericError => "GENERIC_ERROR",
        };
        f.write_str(s)
    }
}

/// Application-originated request.
///
/// `correlation` is `None` until the dispatch layer assigns the next
/// transport sequence number immediately before transmission; user code
/// never picks correlation values itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub function: FunctionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<u32>,
    #[serde(default)]
    pub payload: Value,
}

impl Request {
    pub fn new(function: FunctionId, payload: Value) -> Self {
        Self {
            function,
            correlation: None,
            payload,
        }
    }
}

/// Head-unit response to a previously transmitted request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub function: FunctionId,
    pub correlation: u32,
    pub result: ResultCode,
    /// Free-text detail accompanying non-success results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    /// Correlation key this response settles
    pub fn correlation_id(&self) -> CorrelationId {
        CorrelationId::new(self.function, self.correlation)
    }
}

/// Unsolicited head-unit push; carries no correlation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub function: FunctionId,
    #[serde(default)]
    pub payload: Value,
}

/// Any message crossing the session boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    Request(Request),
    Response(Response),
    Notification(Notification),
}

impl Message {
    pub fn request(function: FunctionId, payload: Value) -> Self {
        Message::Request(Request::new(function, payload))
    }

    pub fn notification(function: FunctionId, payload: Value) -> Self {
        Message::Notification(Notification { function, payload })
    }

    pub fn function(&self) -> FunctionId {
        match self {
            Message::Request(r) => r.function,
            Message::Response(r) => r.function,
            Message::Notification(n) => n.function,
        }
    }
}

/// Key under which an in-flight request waits for its response.
///
/// The message type participates alongside the sequence number, so a
/// response is only matched when both agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    pub function: FunctionId,
    pub sequence: u32,
}

impl CorrelationId {
    pub fn new(function: FunctionId, sequence: u32) -> Self {
        Self { function, sequence }
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.function, self.sequence)
    }
}
