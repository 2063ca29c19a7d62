//! Layer-3 call control messages
//!
//! Only the messages the gateway needs to route a voice call are modelled:
//! VCALL to start a call and TX_REL to end it.

use crate::error::ParseError;

pub const MSG_VCALL: u8 = 0x01;
pub const MSG_TX_REL: u8 = 0x08;
pub const MSG_IDLE: u8 = 0x10;

pub const CALLTYPE_GROUP: u8 = 0b001;
pub const CALLTYPE_INDIVIDUAL: u8 = 0b100;

/// Layer-3 length carried by FACCH1
pub const LAYER3_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer3 {
    pub message_type: u8,
    pub group: bool,
    pub src: u16,
    pub dst: u16,
}

impl Layer3 {
    pub fn vcall(group: bool, src: u16, dst: u16) -> Self {
        Self {
            message_type: MSG_VCALL,
            group,
            src,
            dst,
        }
    }

    pub fn tx_rel(group: bool, src: u16, dst: u16) -> Self {
        Self {
            message_type: MSG_TX_REL,
            group,
            src,
            dst,
        }
    }

    pub fn to_bytes(&self) -> [u8; LAYER3_LEN] {
        let call_type = if self.group { CALLTYPE_GROUP } else { CALLTYPE_INDIVIDUAL };
        let src = self.src.to_be_bytes();
        let dst = self.dst.to_be_bytes();
        [
            self.message_type & 0x3F,
            call_type << 5,
            0x00,
            src[0],
            src[1],
            dst[0],
            dst[1],
            0x00,
            0x00,
            0x00,
        ]
    }

    /// Parse a message; at least the first seven bytes must be present
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        ParseError::check_len(data, 7)?;
        let group = match data[1] >> 5 {
            CALLTYPE_GROUP => true,
            CALLTYPE_INDIVIDUAL => false,
            other => {
                return Err(ParseError::OutOfRange {
                    field: "NXDN call type",
                    value: u64::from(other),
                })
            }
        };
        Ok(Self {
            message_type: data[0] & 0x3F,
            group,
            src: u16::from_be_bytes([data[3], data[4]]),
            dst: u16::from_be_bytes([data[5], data[6]]),
        })
    }

    pub fn is_vcall(&self) -> bool {
        self.message_type == MSG_VCALL
    }

    pub fn is_tx_rel(&self) -> bool {
        self.message_type == MSG_TX_REL
    }
}
