// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use num_enum::TryFromPrimitive;
use strum::{Display, EnumString};

/// The ten MQTT 3.1.1 control packet types this broker core dispatches on.
///
/// Values match the high nibble of the packet's Fixed Header byte. Types the
/// broker never needs to recognize (PUBACK, PUBREC, PUBREL, PUBCOMP, AUTH) are
/// intentionally absent; a packet carrying one of those type bits falls
/// through to `TryFrom`'s error and is treated as an unknown packet type.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PacketType {
    Connect = 1,
    Connack = 2,
    Publish = 3,
    Subscribe = 8,
    Suback = 9,
    Unsubscribe = 10,
    Unsuback = 11,
    Pingreq = 12,
    Pingresp = 13,
    Disconnect = 14,
}

impl PacketType {
    /// Extract the packet type from a Fixed Header byte's high nibble.
    pub fn from_fixed_header_byte(byte: u8) -> Option<Self> {
        Self::try_from(byte >> 4).ok()
    }
}

/// Outbound Fixed Header bytes this broker core ever writes.
///
/// Every value here is `type << 4 | flags` for the exact flag combination
/// the broker emits; there is never a reason to construct a `FixedHeader`
/// with any other flag bits; the broker does not send packets with
/// variable flags in the low nibble.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedHeader {
    /// CONNACK: type=2, flags=0.
    Connack = 0x20,
    /// PUBLISH at QoS 0: type=3, DUP=0, QoS=00, RETAIN=0.
    Publish = 0x30,
    /// SUBACK: type=9, flags=0.
    Suback = 0x90,
    /// UNSUBACK: type=11, flags=0.
    Unsuback = 0xB0,
    /// PINGRESP: type=13, flags=0.
    Pingresp = 0xD0,
}

impl FixedHeader {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}
