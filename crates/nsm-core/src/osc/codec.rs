//! OSC 1.0 binary encoding on top of `rosc`
//!
//! Only plain messages carrying the argument types in `OscArg` are accepted;
//! anything else the wire format allows is rejected here so the rest of the
//! crate never sees it.

use super::{OscArg, OscMessage};
use crate::error::OscError;
use rosc::{OscPacket, OscType};

/// Encode a message into a single UDP datagram payload
pub fn encode(message: &OscMessage) -> Result<Vec<u8>, OscError> {
    let packet = OscPacket::Message(rosc::OscMessage {
        addr: message.address.clone(),
        args: message.args.iter().map(to_osc_type).collect(),
    });
    rosc::encoder::encode(&packet).map_err(|e| OscError::Encode(format!("{:?}", e)))
}

/// Decode a datagram payload into a message
pub fn decode(packet: &[u8]) -> Result<OscMessage, OscError> {
    if packet.starts_with(b"#bundle") {
        return Err(OscError::BundleNotSupported);
    }

    let (_, packet) =
        rosc::decoder::decode_udp(packet).map_err(|e| OscError::Decode(format!("{:?}", e)))?;
    let message = match packet {
        OscPacket::Message(message) => message,
        OscPacket::Bundle(_) => return Err(OscError::BundleNotSupported),
    };

    if !message.addr.starts_with('/') {
        return Err(OscError::InvalidAddress(message.addr));
    }

    let args = message
        .args
        .into_iter()
        .map(from_osc_type)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OscMessage {
        address: message.addr,
        args,
    })
}

fn to_osc_type(arg: &OscArg) -> OscType {
    match arg {
        OscArg::Int(v) => OscType::Int(*v),
        OscArg::Float(v) => OscType::Float(*v),
        OscArg::Str(s) => OscType::String(s.clone()),
        OscArg::Long(v) => OscType::Long(*v),
        OscArg::Double(v) => OscType::Double(*v),
        OscArg::Bool(v) => OscType::Bool(*v),
        OscArg::Nil => OscType::Nil,
    }
}

fn from_osc_type(arg: OscType) -> Result<OscArg, OscError> {
    let tag = match arg {
        OscType::Int(v) => return Ok(OscArg::Int(v)),
        OscType::Float(v) => return Ok(OscArg::Float(v)),
        OscType::String(s) => return Ok(OscArg::Str(s)),
        OscType::Long(v) => return Ok(OscArg::Long(v)),
        OscType::Double(v) => return Ok(OscArg::Double(v)),
        OscType::Bool(v) => return Ok(OscArg::Bool(v)),
        OscType::Nil => return Ok(OscArg::Nil),
        OscType::Blob(_) => 'b',
        OscType::Time(_) => 't',
        OscType::Char(_) => 'c',
        OscType::Midi(_) => 'm',
        OscType::Inf => 'I',
        _ => '?',
    };
    Err(OscError::UnsupportedTypeTag(tag))
}
