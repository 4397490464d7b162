//! NSM protocol message handling

use crate::error::{Error, NsmError, Result};
use crate::osc::OscMessage;
use crate::types::{
    CapabilitySet, ErrorCode, ADDR_ANNOUNCE, ADDR_ERROR, ADDR_GUI_HIDDEN, ADDR_GUI_SHOWN,
    ADDR_HIDE_GUI, ADDR_IS_CLEAN, ADDR_IS_DIRTY, ADDR_LABEL, ADDR_MESSAGE, ADDR_OPEN,
    ADDR_PROGRESS, ADDR_REPLY, ADDR_SAVE, ADDR_SESSION_LOADED, ADDR_SHOW_GUI, API_VERSION_MAJOR,
    API_VERSION_MINOR,
};

use super::traits::OpenRequest;

/// Highest status message priority the manager understands
pub const MAX_MESSAGE_PRIORITY: i32 = 3;

/// Builds outbound messages and classifies inbound ones
#[derive(Debug, Default, Clone, Copy)]
pub struct ProtocolHandler;

impl ProtocolHandler {
    pub fn new() -> Self {
        Self
    }

    /// `/nsm/server/announce s:name s:capabilities s:executable i:major i:minor i:pid`
    pub fn create_announce(
        &self,
        app_name: &str,
        capabilities: &CapabilitySet,
        executable: &str,
        pid: u32,
    ) -> OscMessage {
        OscMessage::new(ADDR_ANNOUNCE)
            .with_arg(app_name)
            .with_arg(capabilities.to_token())
            .with_arg(executable)
            .with_arg(API_VERSION_MAJOR)
            .with_arg(API_VERSION_MINOR)
            .with_arg(pid as i32)
    }

    /// `/reply s:responding_to s:status`
    pub fn create_reply(&self, responding_to: &str, status: &str) -> OscMessage {
        OscMessage::new(ADDR_REPLY)
            .with_arg(responding_to)
            .with_arg(status)
    }

    /// `/error s:responding_to i:code s:message`
    pub fn create_error(&self, responding_to: &str, code: ErrorCode, message: &str) -> OscMessage {
        OscMessage::new(ADDR_ERROR)
            .with_arg(responding_to)
            .with_arg(code.code())
            .with_arg(message)
    }

    pub fn create_progress(&self, fraction: f32) -> OscMessage {
        OscMessage::new(ADDR_PROGRESS).with_arg(fraction)
    }

    pub fn create_dirty(&self, dirty: bool) -> OscMessage {
        OscMessage::new(if dirty { ADDR_IS_DIRTY } else { ADDR_IS_CLEAN })
    }

    /// Priority is clamped into 0..=3
    pub fn create_message(&self, priority: i32, text: &str) -> OscMessage {
        OscMessage::new(ADDR_MESSAGE)
            .with_arg(priority.clamp(0, MAX_MESSAGE_PRIORITY))
            .with_arg(text)
    }

    pub fn create_label(&self, label: &str) -> OscMessage {
        OscMessage::new(ADDR_LABEL).with_arg(label)
    }

    pub fn create_gui_state(&self, visible: bool) -> OscMessage {
        OscMessage::new(if visible { ADDR_GUI_SHOWN } else { ADDR_GUI_HIDDEN })
    }

    /// Parse an inbound message.
    ///
    /// Unknown addresses are not an error; they come back as
    /// `NsmMessage::Unknown`. A known address with the wrong arguments is.
    pub fn parse_message(&self, message: &OscMessage) -> Result<NsmMessage> {
        match message.address.as_str() {
            ADDR_REPLY => self.parse_reply(message),
            ADDR_ERROR => {
                let responding_to = required_str(message, 0, "responding-to address")?;
                let code = message.int_arg(1).ok_or_else(|| invalid(message, "error code"))?;
                let text = required_str(message, 2, "error message")?;
                Ok(NsmMessage::Error {
                    responding_to,
                    code,
                    message: text,
                })
            }
            ADDR_OPEN => {
                let path_prefix = required_str(message, 0, "session path prefix")?;
                let session_name = required_str(message, 1, "session name")?;
                let client_id = required_str(message, 2, "client id")?;
                Ok(NsmMessage::Open(OpenRequest {
                    path_prefix,
                    session_name,
                    client_id,
                }))
            }
            ADDR_SAVE => Ok(NsmMessage::Save),
            ADDR_SESSION_LOADED => Ok(NsmMessage::SessionLoaded),
            ADDR_SHOW_GUI => Ok(NsmMessage::ShowGui),
            ADDR_HIDE_GUI => Ok(NsmMessage::HideGui),
            _ => Ok(NsmMessage::Unknown(message.clone())),
        }
    }

    fn parse_reply(&self, message: &OscMessage) -> Result<NsmMessage> {
        let responding_to = required_str(message, 0, "replied-to address")?;

        if responding_to == ADDR_ANNOUNCE {
            let welcome_message = required_str(message, 1, "welcome message")?;
            let manager_name = required_str(message, 2, "manager name")?;
            // Very old servers send no capability string at all
            let capabilities = message.str_arg(3).unwrap_or_default();
            return Ok(NsmMessage::Welcome {
                welcome_message,
                manager_name,
                capabilities: CapabilitySet::parse(capabilities),
            });
        }

        let text = message
            .args
            .iter()
            .skip(1)
            .map(|arg| arg.as_str().map_or_else(|| arg.to_string(), str::to_string))
            .collect::<Vec<_>>()
            .join(" ");
        Ok(NsmMessage::Reply {
            responding_to,
            message: text,
        })
    }
}

fn required_str(message: &OscMessage, index: usize, what: &str) -> Result<String> {
    message
        .str_arg(index)
        .map(str::to_string)
        .ok_or_else(|| invalid(message, what))
}

fn invalid(message: &OscMessage, what: &str) -> Error {
    Error::Nsm(NsmError::InvalidMessage(format!(
        "{} missing or mistyped in {}",
        what, message
    )))
}

/// Parsed inbound NSM message
#[derive(Debug, Clone, PartialEq)]
pub enum NsmMessage {
    /// Reply to our announce: we are now part of a session
    Welcome {
        welcome_message: String,
        manager_name: String,
        capabilities: CapabilitySet,
    },
    /// Any other `/reply`
    Reply {
        responding_to: String,
        message: String,
    },
    Error {
        responding_to: String,
        code: i32,
        message: String,
    },
    Open(OpenRequest),
    Save,
    SessionLoaded,
    ShowGui,
    HideGui,
    /// Address not part of the client protocol
    Unknown(OscMessage),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::OscArg;
    use crate::types::Capability;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_announce() {
        let handler = ProtocolHandler::new();
        let caps: CapabilitySet = [Capability::Progress, Capability::Message]
            .into_iter()
            .collect();
        let msg = handler.create_announce("MyApp", &caps, "myapp", 4242);

        assert_eq!(msg.address, ADDR_ANNOUNCE);
        assert_eq!(msg.type_tags(), "sssiii");
        assert_eq!(
            msg.args,
            vec![
                OscArg::from("MyApp"),
                OscArg::from(":message:progress:"),
                OscArg::from("myapp"),
                OscArg::Int(1),
                OscArg::Int(2),
                OscArg::Int(4242),
            ]
        );
    }

    #[test]
    fn test_create_message_clamps_priority() {
        let handler = ProtocolHandler::new();
        assert_eq!(handler.create_message(7, "hi").int_arg(0), Some(3));
        assert_eq!(handler.create_message(-1, "hi").int_arg(0), Some(0));
    }

    #[test]
    fn test_create_dirty_and_gui_addresses() {
        let handler = ProtocolHandler::new();
        assert_eq!(handler.create_dirty(true).address, ADDR_IS_DIRTY);
        assert_eq!(handler.create_dirty(false).address, ADDR_IS_CLEAN);
        assert_eq!(handler.create_gui_state(true).address, ADDR_GUI_SHOWN);
        assert_eq!(handler.create_gui_state(false).address, ADDR_GUI_HIDDEN);
    }

    #[test]
    fn test_parse_welcome() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_REPLY)
            .with_arg(ADDR_ANNOUNCE)
            .with_arg("Howdy, what took you so long?")
            .with_arg("Non Session Manager")
            .with_arg(":server-control:broadcast:optional-gui:");

        match handler.parse_message(&msg).unwrap() {
            NsmMessage::Welcome {
                manager_name,
                capabilities,
                ..
            } => {
                assert_eq!(manager_name, "Non Session Manager");
                assert!(capabilities.contains(Capability::OptionalGui));
            }
            other => panic!("Expected Welcome, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_welcome_without_capabilities() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_REPLY)
            .with_arg(ADDR_ANNOUNCE)
            .with_arg("hi")
            .with_arg("nsmd");

        let parsed = handler.parse_message(&msg).unwrap();
        assert!(matches!(parsed, NsmMessage::Welcome { capabilities, .. } if capabilities.is_empty()));
    }

    #[test]
    fn test_parse_other_reply() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_REPLY)
            .with_arg("/nsm/server/save")
            .with_arg("Saved.");

        assert_eq!(
            handler.parse_message(&msg).unwrap(),
            NsmMessage::Reply {
                responding_to: "/nsm/server/save".to_string(),
                message: "Saved.".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_error() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_ERROR)
            .with_arg(ADDR_ANNOUNCE)
            .with_arg(-2)
            .with_arg("Incompatible API");

        assert_eq!(
            handler.parse_message(&msg).unwrap(),
            NsmMessage::Error {
                responding_to: ADDR_ANNOUNCE.to_string(),
                code: -2,
                message: "Incompatible API".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_open() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_OPEN)
            .with_arg("/home/user/sess/MyApp.nABCD")
            .with_arg("sess")
            .with_arg("MyApp.nABCD");

        assert_eq!(
            handler.parse_message(&msg).unwrap(),
            NsmMessage::Open(OpenRequest::new(
                "/home/user/sess/MyApp.nABCD",
                "sess",
                "MyApp.nABCD"
            ))
        );
    }

    #[test]
    fn test_parse_open_missing_args_is_invalid() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new(ADDR_OPEN).with_arg("/only/prefix");

        let err = handler.parse_message(&msg).unwrap_err();
        assert!(matches!(err, Error::Nsm(NsmError::InvalidMessage(_))));
    }

    #[test]
    fn test_parse_no_arg_messages() {
        let handler = ProtocolHandler::new();
        assert_eq!(
            handler.parse_message(&OscMessage::new(ADDR_SAVE)).unwrap(),
            NsmMessage::Save
        );
        assert_eq!(
            handler.parse_message(&OscMessage::new(ADDR_SESSION_LOADED)).unwrap(),
            NsmMessage::SessionLoaded
        );
        assert_eq!(
            handler.parse_message(&OscMessage::new(ADDR_SHOW_GUI)).unwrap(),
            NsmMessage::ShowGui
        );
        assert_eq!(
            handler.parse_message(&OscMessage::new(ADDR_HIDE_GUI)).unwrap(),
            NsmMessage::HideGui
        );
    }

    #[test]
    fn test_parse_unknown() {
        let handler = ProtocolHandler::new();
        let msg = OscMessage::new("/foo/bar").with_arg(1);
        assert_eq!(
            handler.parse_message(&msg).unwrap(),
            NsmMessage::Unknown(msg)
        );
    }
}
