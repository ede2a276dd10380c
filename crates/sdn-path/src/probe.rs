//! Probe frame codec
//!
//! A probe is a bare ethernet frame with the reserved ethertype whose payload
//! is a single big-endian `u32`: the controller clock (tenths of ms) at send
//! time.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sdn_common::{SdnError, SdnResult, ETH_TYPE_PROBE};

/// Source MAC stamped on probes
pub const PROBE_SRC_MAC: [u8; 6] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02];
/// Destination MAC stamped on probes
pub const PROBE_DST_MAC: [u8; 6] = [0x00, 0x01, 0x00, 0x00, 0x00, 0x01];

const ETH_HEADER_LEN: usize = 14;
const STAMP_LEN: usize = 4;

/// Build the ethernet frame for a probe carrying `stamp`
pub fn encode_probe_frame(stamp: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(ETH_HEADER_LEN + STAMP_LEN);
    buf.put_slice(&PROBE_DST_MAC);
    buf.put_slice(&PROBE_SRC_MAC);
    buf.put_u16(ETH_TYPE_PROBE);
    buf.put_u32(stamp);
    buf.freeze()
}

/// Extract the send stamp from a probe's ethernet payload
///
/// Trailing bytes (ethernet padding) are ignored.
pub fn decode_probe_payload(payload: &[u8]) -> SdnResult<u32> {
    if payload.len() < STAMP_LEN {
        return Err(SdnError::MalformedProbe { len: payload.len() });
    }
    let mut buf = payload;
    Ok(buf.get_u32())
}

/// Split a full probe frame into its payload
pub fn probe_payload(frame: &[u8]) -> SdnResult<&[u8]> {
    if frame.len() < ETH_HEADER_LEN {
        return Err(SdnError::MalformedFrame(format!(
            "{} bytes is shorter than an ethernet header",
            frame.len()
        )));
    }
    let eth_type = u16::from_be_bytes([frame[12], frame[13]]);
    if eth_type != ETH_TYPE_PROBE {
        return Err(SdnError::MalformedFrame(format!(
            "ethertype {:#06x} is not a probe",
            eth_type
        )));
    }
    Ok(&frame[ETH_HEADER_LEN..])
}
