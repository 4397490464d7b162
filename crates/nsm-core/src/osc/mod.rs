//! Open Sound Control messages
//!
//! The session manager speaks OSC 1.0 over UDP. Only plain messages are
//! exchanged; bundles never appear in the NSM protocol.

mod codec;

pub use codec::{decode, encode};

use std::fmt;

/// A single typed OSC argument
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
    Long(i64),
    Double(f64),
    Bool(bool),
    Nil,
}

impl OscArg {
    /// OSC type tag character
    pub fn type_tag(&self) -> char {
        match self {
            OscArg::Int(_) => 'i',
            OscArg::Float(_) => 'f',
            OscArg::Str(_) => 's',
            OscArg::Long(_) => 'h',
            OscArg::Double(_) => 'd',
            OscArg::Bool(true) => 'T',
            OscArg::Bool(false) => 'F',
            OscArg::Nil => 'N',
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OscArg::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; 64-bit values are accepted when they fit
    pub fn as_int(&self) -> Option<i32> {
        match self {
            OscArg::Int(v) => Some(*v),
            OscArg::Long(v) => i32::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Int(v) => write!(f, "{}", v),
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::Str(s) => write!(f, "{:?}", s),
            OscArg::Long(v) => write!(f, "{}", v),
            OscArg::Double(v) => write!(f, "{}", v),
            OscArg::Bool(v) => write!(f, "{}", v),
            OscArg::Nil => f.write_str("nil"),
        }
    }
}

impl From<i32> for OscArg {
    fn from(v: i32) -> Self {
        OscArg::Int(v)
    }
}

impl From<f32> for OscArg {
    fn from(v: f32) -> Self {
        OscArg::Float(v)
    }
}

impl From<&str> for OscArg {
    fn from(s: &str) -> Self {
        OscArg::Str(s.to_string())
    }
}

impl From<String> for OscArg {
    fn from(s: String) -> Self {
        OscArg::Str(s)
    }
}

/// An addressed OSC message
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<OscArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Type tag string without the leading comma, e.g. `"sis"`
    pub fn type_tags(&self) -> String {
        self.args.iter().map(OscArg::type_tag).collect()
    }

    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(OscArg::as_str)
    }

    pub fn int_arg(&self, index: usize) -> Option<i32> {
        self.args.get(index).and_then(OscArg::as_int)
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ,{}", self.address, self.type_tags())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_builder() {
        let msg = OscMessage::new("/error")
            .with_arg("/nsm/client/open")
            .with_arg(-1)
            .with_arg("failed");

        assert_eq!(msg.type_tags(), "sis");
        assert_eq!(msg.str_arg(0), Some("/nsm/client/open"));
        assert_eq!(msg.int_arg(1), Some(-1));
        assert_eq!(msg.int_arg(0), None);
        assert_eq!(msg.str_arg(3), None);
    }

    #[test]
    fn test_long_arg_as_int() {
        assert_eq!(OscArg::Long(-2).as_int(), Some(-2));
        assert_eq!(OscArg::Long(i64::MAX).as_int(), None);
    }

    #[test]
    fn test_display() {
        let msg = OscMessage::new("/nsm/client/progress").with_arg(0.5f32);
        assert_eq!(msg.to_string(), "/nsm/client/progress ,f 0.5");
    }
}
