use crate::types::WriteKind;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Two-byte header that starts every frame in both directions
pub const HEADER: [u8; 2] = [0xEF, 0xDD];

/// Bytes a frame adds around its payload: header, type and two checksums
pub const FRAME_OVERHEAD: usize = 5;

/// Shortest notification that carries a command byte
pub const MIN_NOTIFICATION_LEN: usize = 3;

const WEIGHT_BODY_LEN: usize = 6;
const TIMER_BODY_LEN: usize = 3;
/// Stop/reset button bodies pad the timer reading to four bytes
const BUTTON_TIMER_SPAN: usize = 4;
const SIGN_BIT: u8 = 0x02;
const BATTERY_MASK: u8 = 0x7F;

/// Identify payload sent by the standalone web SDK
pub const IDENTIFY_PAYLOAD: [u8; 15] = [0x2D; 15];

/// Identify payload used by the older assistant hook: ASCII digits
pub const LEGACY_IDENTIFY_PAYLOAD: [u8; 15] = *b"012345678901234";

/// Notification subscription payload sent by the standalone web SDK
///
/// The leading byte is the payload length; the remaining pairs select the
/// weight, battery, timer and key event streams.
pub const NOTIFICATION_REQUEST: [u8; 9] = [9, 0, 1, 1, 2, 2, 5, 3, 4];

/// Shorter subscription payload used by the older assistant hook
pub const LEGACY_NOTIFICATION_REQUEST: [u8; 7] = [6, 0, 1, 1, 2, 2, 3];

/// Message type byte, the third byte of every frame
///
/// Several values are shared between directions: `0x0B` is the identify
/// command going out and the heartbeat acknowledgement coming in, `0x0C` is
/// the notification request going out and the wrapped notification coming in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    /// Keep-alive frame
    Heartbeat = 0x00,
    /// Zero the scale
    Tare = 0x04,
    /// Direct weight reading
    Weight = 0x05,
    /// Ask for a settings report
    RequestSettings = 0x06,
    /// Direct timer reading
    Timer = 0x07,
    /// Button event or settings/battery report
    Event = 0x08,
    /// Identify out, heartbeat acknowledgement in
    Identify = 0x0B,
    /// Notification request out, wrapped sub-messages in
    Notification = 0x0C,
    /// Start, stop or reset the scale timer
    TimerControl = 0x0D,
}

impl MessageType {
    /// Convert from u8
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Heartbeat),
            0x04 => Some(Self::Tare),
            0x05 => Some(Self::Weight),
            0x06 => Some(Self::RequestSettings),
            0x07 => Some(Self::Timer),
            0x08 => Some(Self::Event),
            0x0B => Some(Self::Identify),
            0x0C => Some(Self::Notification),
            0x0D => Some(Self::TimerControl),
            _ => None,
        }
    }
}

/// Sum of even-indexed and odd-indexed payload bytes, each mod 256
#[must_use]
pub fn checksum(payload: &[u8]) -> (u8, u8) {
    payload
        .iter()
        .enumerate()
        .fold((0u8, 0u8), |(even, odd), (i, &byte)| {
            if i % 2 == 0 {
                (even.wrapping_add(byte), odd)
            } else {
                (even, odd.wrapping_add(byte))
            }
        })
}

/// Encode a scale frame: `EF DD type payload.. ck1 ck2`
#[must_use]
pub fn encode_frame(msg_type: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + FRAME_OVERHEAD);

    buf.put_slice(&HEADER);
    buf.put_u8(msg_type);
    buf.put_slice(payload);

    let (even, odd) = checksum(payload);
    buf.put_u8(even);
    buf.put_u8(odd);

    buf.freeze()
}

/// A complete scale frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type byte
    pub msg_type: u8,
    /// Payload between the type byte and the checksums
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(msg_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            payload: payload.into(),
        }
    }

    /// Serialize frame to bytes
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        encode_frame(self.msg_type, &self.payload)
    }

    /// Parse a frame from a buffer
    ///
    /// Leading bytes before the header are skipped. The payload length is the
    /// remaining length minus the fixed overhead. Returns `None` when no
    /// header is found, the frame is too short, or the checksums disagree.
    #[must_use]
    pub fn parse(data: &[u8]) -> Option<Self> {
        let start = find_header(data)?;
        let frame = &data[start..];
        if frame.len() < FRAME_OVERHEAD {
            debug!("Frame too short: {} bytes", frame.len());
            return None;
        }

        let payload = &frame[3..frame.len() - 2];
        let expected = (frame[frame.len() - 2], frame[frame.len() - 1]);
        if checksum(payload) != expected {
            debug!("Frame checksum mismatch: {:02X?}", frame);
            return None;
        }

        Some(Self::new(frame[2], Bytes::copy_from_slice(payload)))
    }
}

/// Outgoing scale commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Zero the scale: `4 → [0]`
    Tare,
    /// Start the timer: `13 → [0, 0]`
    StartTimer,
    /// Stop the timer: `13 → [0, 2]`
    StopTimer,
    /// Reset the timer: `13 → [0, 1]`
    ResetTimer,
    /// Handshake identify frame: `11 → 15 bytes`
    Identify([u8; 15]),
    /// Subscribe to notification streams: `12 → payload`
    RequestNotifications(Vec<u8>),
    /// Keep-alive: `0 → [2, 0]`
    Heartbeat,
    /// Ask for a settings report: `6 → [0; 16]`
    RequestSettings,
}

impl Command {
    /// Message type byte for this command
    #[must_use]
    pub const fn message_type(&self) -> MessageType {
        match self {
            Self::Tare => MessageType::Tare,
            Self::StartTimer | Self::StopTimer | Self::ResetTimer => MessageType::TimerControl,
            Self::Identify(_) => MessageType::Identify,
            Self::RequestNotifications(_) => MessageType::Notification,
            Self::Heartbeat => MessageType::Heartbeat,
            Self::RequestSettings => MessageType::RequestSettings,
        }
    }

    /// Payload bytes for this command
    #[must_use]
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Self::Tare => vec![0],
            Self::StartTimer => vec![0, 0],
            Self::StopTimer => vec![0, 2],
            Self::ResetTimer => vec![0, 1],
            Self::Identify(payload) => payload.to_vec(),
            Self::RequestNotifications(payload) => payload.clone(),
            Self::Heartbeat => vec![2, 0],
            Self::RequestSettings => vec![0; 16],
        }
    }

    /// Build the frame for this command
    #[must_use]
    pub fn frame(&self) -> Frame {
        Frame::new(self.message_type() as u8, self.payload())
    }

    /// Encode this command to wire bytes
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        encode_frame(self.message_type() as u8, &self.payload())
    }

    /// Write type the scale expects for this command
    ///
    /// Handshake and keep-alive traffic is unacknowledged; user commands are
    /// written with response.
    #[must_use]
    pub const fn write_kind(&self) -> WriteKind {
        match self {
            Self::Identify(_) | Self::RequestNotifications(_) | Self::Heartbeat => {
                WriteKind::WithoutResponse
            }
            Self::Tare
            | Self::StartTimer
            | Self::StopTimer
            | Self::ResetTimer
            | Self::RequestSettings => WriteKind::WithResponse,
        }
    }
}

/// Physical button reported by the scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ButtonKind {
    /// Tare button
    Tare,
    /// Timer start
    Start,
    /// Timer stop
    Stop,
    /// Timer reset
    Reset,
}

impl ButtonKind {
    /// Map an `(action, type)` pair from an event body
    #[must_use]
    pub const fn from_pair(action: u8, kind: u8) -> Option<Self> {
        match (action, kind) {
            (0, 5) => Some(Self::Tare),
            (8, 5) => Some(Self::Start),
            (10, 7) => Some(Self::Stop),
            (9, 7) => Some(Self::Reset),
            _ => None,
        }
    }

    /// Whether the event carries a timer reading before the weight
    #[must_use]
    pub const fn carries_timer(self) -> bool {
        matches!(self, Self::Stop | Self::Reset)
    }
}

impl fmt::Display for ButtonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tare => write!(f, "tare"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Reset => write!(f, "reset"),
        }
    }
}

/// A semantic event decoded from a scale notification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScaleEvent {
    /// Weight in grams, negative below zero
    Weight(f64),
    /// Timer in seconds
    Timer(f64),
    /// Battery level in percent
    Battery(u8),
    /// A physical button was pressed
    Button {
        /// Which button
        kind: ButtonKind,
        /// Weight reported with the press
        weight: f64,
        /// Timer reported with stop/reset presses
        timer: Option<f64>,
    },
    /// The scale acknowledged a heartbeat or identify frame
    HandshakeAck,
}

/// Decode a 6-byte weight body
///
/// Bytes 0–1 hold the raw value (little-endian), byte 4 the decimal unit
/// code and bit `0x02` of byte 5 the sign. Unit codes above 4 read as whole
/// units.
#[must_use]
pub fn decode_weight(body: &[u8]) -> Option<f64> {
    if body.len() < WEIGHT_BODY_LEN {
        return None;
    }

    let mut buf = body;
    let raw = buf.get_u16_le();

    let divisor = match body[4] {
        0 => 1.0,
        1 => 10.0,
        2 => 100.0,
        3 => 1_000.0,
        4 => 10_000.0,
        unit => {
            debug!("Unknown weight unit code {unit}, reading as whole units");
            1.0
        }
    };

    let value = f64::from(raw) / divisor;
    if body[5] & SIGN_BIT == SIGN_BIT {
        Some(-value)
    } else {
        Some(value)
    }
}

/// Decode a 3-byte timer body: minutes, seconds, deciseconds
#[must_use]
pub fn decode_timer(body: &[u8]) -> Option<f64> {
    if body.len() < TIMER_BODY_LEN {
        return None;
    }

    Some(f64::from(body[0]) * 60.0 + f64::from(body[1]) + f64::from(body[2]) / 10.0)
}

/// Decode one scale notification into events
///
/// Unknown commands and buffers too short for their command yield an empty
/// list; BLE notifications may arrive fragmented and vendors add extensions.
#[must_use]
pub fn decode_notification(data: &[u8]) -> Vec<ScaleEvent> {
    if data.len() < MIN_NOTIFICATION_LEN {
        debug!("Dropping short notification: {:02X?}", data);
        return Vec::new();
    }

    let Some(start) = find_header(data) else {
        debug!("Dropping notification without header: {:02X?}", data);
        return Vec::new();
    };

    let frame = &data[start..];
    if frame.len() < MIN_NOTIFICATION_LEN {
        debug!("Dropping truncated frame: {:02X?}", frame);
        return Vec::new();
    }

    let events = if frame[2] == MessageType::Notification as u8 {
        decode_wrapped(&frame[3..])
    } else {
        decode_message(frame[2], &frame[3..]).unwrap_or_default()
    };

    if events.is_empty() {
        debug!("No events in notification: {:02X?}", frame);
    }
    events
}

/// Wrapped form: length byte, then `type + body` sub-messages
///
/// Only the declared length is parsed, with one byte of slack for scales
/// that undercount the last sub-message; the frame checksum follows it.
/// Weight and timer sub-messages repeat. An event or acknowledgement
/// sub-message consumes the rest of the window, and a wrapped event counts
/// only as a button press. Decoding stops at the first unknown or truncated
/// sub-message, keeping what was decoded before it.
fn decode_wrapped(body: &[u8]) -> Vec<ScaleEvent> {
    let mut events = Vec::new();
    let Some((&declared_len, tail)) = body.split_first() else {
        return events;
    };
    let window = (usize::from(declared_len) + 1).min(tail.len());
    let mut rest = &tail[..window];

    while let Some((&kind, sub)) = rest.split_first() {
        let consumed = match MessageType::from_u8(kind) {
            Some(MessageType::Weight) => WEIGHT_BODY_LEN,
            Some(MessageType::Timer) => TIMER_BODY_LEN,
            Some(MessageType::Event) => {
                events.extend(
                    decode_event(sub).filter(|event| matches!(event, ScaleEvent::Button { .. })),
                );
                break;
            }
            Some(MessageType::Identify) => {
                events.extend(decode_heartbeat_ack(sub).unwrap_or_default());
                break;
            }
            _ => break,
        };

        match decode_message(kind, sub) {
            Some(decoded) => events.extend(decoded),
            None => break,
        }

        if consumed >= sub.len() {
            break;
        }
        rest = &sub[consumed..];
    }

    events
}

/// Decode a single message body by type; `None` when the body is unusable
fn decode_message(kind: u8, body: &[u8]) -> Option<Vec<ScaleEvent>> {
    match MessageType::from_u8(kind)? {
        MessageType::Weight => decode_weight(body).map(|w| vec![ScaleEvent::Weight(w)]),
        MessageType::Timer => decode_timer(body).map(|t| vec![ScaleEvent::Timer(t)]),
        MessageType::Event => decode_event(body).map(|event| vec![event]),
        MessageType::Identify => decode_heartbeat_ack(body),
        _ => None,
    }
}

/// Button event, or a battery/settings report when no known button matches
///
/// A known button pair with a truncated body is dropped.
fn decode_event(body: &[u8]) -> Option<ScaleEvent> {
    if let [action, kind, rest @ ..] = body {
        if let Some(button) = ButtonKind::from_pair(*action, *kind) {
            return decode_button(button, rest);
        }
    }

    match body {
        [] => None,
        [battery] => Some(ScaleEvent::Battery(battery & BATTERY_MASK)),
        [_, battery, ..] => Some(ScaleEvent::Battery(battery & BATTERY_MASK)),
    }
}

fn decode_button(kind: ButtonKind, rest: &[u8]) -> Option<ScaleEvent> {
    if kind.carries_timer() {
        let timer = decode_timer(rest)?;
        let weight = decode_weight(rest.get(BUTTON_TIMER_SPAN..)?)?;
        Some(ScaleEvent::Button {
            kind,
            weight,
            timer: Some(timer),
        })
    } else {
        let weight = decode_weight(rest)?;
        Some(ScaleEvent::Button {
            kind,
            weight,
            timer: None,
        })
    }
}

/// Acknowledgement body: two bytes, a type tag, then the tagged reading
fn decode_heartbeat_ack(body: &[u8]) -> Option<Vec<ScaleEvent>> {
    let tag = *body.get(2)?;
    let reading = &body[3..];

    let mut events = vec![ScaleEvent::HandshakeAck];
    match MessageType::from_u8(tag) {
        Some(MessageType::Weight) => events.extend(decode_weight(reading).map(ScaleEvent::Weight)),
        Some(MessageType::Timer) => events.extend(decode_timer(reading).map(ScaleEvent::Timer)),
        _ => {}
    }
    Some(events)
}

fn find_header(data: &[u8]) -> Option<usize> {
    data.windows(HEADER.len()).position(|window| window == HEADER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weight_body(raw: u16, unit: u8, sign: u8) -> Vec<u8> {
        let [lo, hi] = raw.to_le_bytes();
        vec![lo, hi, 0, 0, unit, sign]
    }

    fn notification(cmd: u8, body: &[u8]) -> Vec<u8> {
        let mut data = vec![0xEF, 0xDD, cmd];
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_encode_frame_layout() {
        let frame = encode_frame(4, &[0]);
        assert_eq!(&frame[..], &[0xEF, 0xDD, 0x04, 0x00, 0x00, 0x00]);

        let heartbeat = Command::Heartbeat.to_bytes();
        assert_eq!(&heartbeat[..], &[0xEF, 0xDD, 0x00, 0x02, 0x00, 0x02, 0x00]);
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x01, 0x02, 0x01]), (0x01, 0x02));
        assert_eq!(checksum(&[]), (0, 0));
    }

    #[test]
    fn test_frame_length_invariant() {
        for len in 0..=20 {
            let payload = vec![0xA5; len];
            assert_eq!(encode_frame(12, &payload).len(), len + FRAME_OVERHEAD);
        }
    }

    #[test]
    fn test_frame_round_trip() {
        for len in 0..=20u8 {
            let payload: Vec<u8> = (0..len).map(|i| i.wrapping_mul(37).wrapping_add(3)).collect();
            let bytes = encode_frame(0x0D, &payload);
            let parsed = Frame::parse(&bytes).unwrap();

            assert_eq!(parsed.msg_type, 0x0D);
            assert_eq!(&parsed.payload[..], &payload[..]);
        }
    }

    #[test]
    fn test_frame_parse_skips_leading_noise() {
        let mut data = vec![0x00, 0x13];
        data.extend_from_slice(&Command::StopTimer.to_bytes());

        let parsed = Frame::parse(&data).unwrap();
        assert_eq!(parsed, Command::StopTimer.frame());
    }

    #[test]
    fn test_frame_parse_rejects_bad_checksum_and_short_input() {
        let mut bytes = encode_frame(4, &[0]).to_vec();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(Frame::parse(&bytes).is_none());

        assert!(Frame::parse(&[0xEF, 0xDD]).is_none());
        assert!(Frame::parse(&[0xEF, 0xDD, 0x04, 0x00]).is_none());
        assert!(Frame::parse(&[0x01, 0x02, 0x03, 0x04, 0x05]).is_none());
    }

    #[test]
    fn test_checksum_determinism() {
        let payload = [1, 2, 3, 4, 5];
        assert_eq!(encode_frame(13, &payload), encode_frame(13, &payload));

        let changed = [1, 2, 9, 4, 5];
        assert_ne!(encode_frame(13, &payload), encode_frame(13, &changed));
    }

    #[test]
    fn test_command_catalogue() {
        assert_eq!(Command::Tare.frame(), Frame::new(4, vec![0]));
        assert_eq!(Command::StartTimer.frame(), Frame::new(13, vec![0, 0]));
        assert_eq!(Command::StopTimer.frame(), Frame::new(13, vec![0, 2]));
        assert_eq!(Command::ResetTimer.frame(), Frame::new(13, vec![0, 1]));
        assert_eq!(Command::Heartbeat.frame(), Frame::new(0, vec![2, 0]));
        assert_eq!(Command::RequestSettings.frame(), Frame::new(6, vec![0; 16]));

        let identify = Command::Identify(IDENTIFY_PAYLOAD).to_bytes();
        assert_eq!(identify.len(), 15 + FRAME_OVERHEAD);
        assert_eq!(identify[2], 11);

        let request = Command::RequestNotifications(NOTIFICATION_REQUEST.to_vec()).frame();
        assert_eq!(request.msg_type, 12);
        assert_eq!(&request.payload[..], &NOTIFICATION_REQUEST);
    }

    #[test]
    fn test_legacy_handshake_fixtures() {
        // Older assistant variant: ASCII digit identify and 7-byte request
        let identify = Command::Identify(LEGACY_IDENTIFY_PAYLOAD).to_bytes();
        assert_eq!(&identify[3..6], &[0x30, 0x31, 0x32]);

        let request = Command::RequestNotifications(LEGACY_NOTIFICATION_REQUEST.to_vec());
        assert_eq!(request.to_bytes().len(), 7 + FRAME_OVERHEAD);
    }

    #[test]
    fn test_command_write_kinds() {
        assert_eq!(Command::Heartbeat.write_kind(), WriteKind::WithoutResponse);
        assert_eq!(
            Command::Identify(IDENTIFY_PAYLOAD).write_kind(),
            WriteKind::WithoutResponse
        );
        assert_eq!(Command::Tare.write_kind(), WriteKind::WithResponse);
        assert_eq!(Command::StopTimer.write_kind(), WriteKind::WithResponse);
    }

    #[test]
    fn test_decode_weight_examples() {
        assert_eq!(decode_weight(&[0x64, 0x00, 0, 0, 0x00, 0x00]), Some(100.0));
        assert_eq!(decode_weight(&[0x64, 0x00, 0, 0, 0x01, 0x00]), Some(10.0));
        assert_eq!(decode_weight(&[0x64, 0x00, 0, 0, 0x00, 0x02]), Some(-100.0));
        assert_eq!(decode_weight(&weight_body(1234, 2, 0)), Some(12.34));
        assert_eq!(decode_weight(&weight_body(10_000, 4, 0)), Some(1.0));
    }

    #[test]
    fn test_decode_weight_short_and_unknown_unit() {
        assert_eq!(decode_weight(&[0x64, 0x00, 0, 0, 0x01]), None);
        assert_eq!(decode_weight(&weight_body(100, 9, 0)), Some(100.0));
        assert_eq!(decode_weight(&weight_body(100, 7, 2)), Some(-100.0));
    }

    #[test]
    fn test_decode_timer() {
        assert_eq!(decode_timer(&[1, 30, 5]), Some(90.5));
        assert_eq!(decode_timer(&[0, 0, 0]), Some(0.0));
        assert_eq!(decode_timer(&[0, 1]), None);
    }

    #[test]
    fn test_decode_direct_weight_and_timer() {
        let data = notification(0x05, &weight_body(150, 1, 0));
        assert_eq!(decode_notification(&data), vec![ScaleEvent::Weight(15.0)]);

        let data = notification(0x07, &[0, 12, 5]);
        assert_eq!(decode_notification(&data), vec![ScaleEvent::Timer(12.5)]);
    }

    #[test]
    fn test_decode_wrapped_weight_and_timer() {
        let mut body = vec![0x0C, 0x05];
        body.extend(weight_body(2050, 1, 0));
        body.extend([0x07, 0, 5, 0]);

        let events = decode_notification(&notification(0x0C, &body));
        assert_eq!(
            events,
            vec![ScaleEvent::Weight(205.0), ScaleEvent::Timer(5.0)]
        );
    }

    #[test]
    fn test_decode_wrapped_keeps_events_before_truncation() {
        let mut body = vec![0x0C, 0x05];
        body.extend(weight_body(10, 0, 0));
        body.extend([0x07, 0, 5]);
        body.truncate(body.len() - 1);

        let events = decode_notification(&notification(0x0C, &body));
        assert_eq!(events, vec![ScaleEvent::Weight(10.0)]);
    }

    #[test]
    fn test_decode_wrapped_button_event() {
        let mut body = vec![0x0E, 0x08, 10, 7, 0, 30, 0, 0];
        body.extend(weight_body(361, 1, 0));

        let events = decode_notification(&notification(0x0C, &body));
        assert_eq!(
            events,
            vec![ScaleEvent::Button {
                kind: ButtonKind::Stop,
                weight: 36.1,
                timer: Some(30.0),
            }]
        );
    }

    #[test]
    fn test_decode_direct_button_events() {
        let mut tare = vec![0, 5];
        tare.extend(weight_body(0, 1, 0));
        assert_eq!(
            decode_notification(&notification(0x08, &tare)),
            vec![ScaleEvent::Button {
                kind: ButtonKind::Tare,
                weight: 0.0,
                timer: None,
            }]
        );

        let mut reset = vec![9, 7, 1, 2, 5, 0];
        reset.extend(weight_body(5, 0, 2));
        assert_eq!(
            decode_notification(&notification(0x08, &reset)),
            vec![ScaleEvent::Button {
                kind: ButtonKind::Reset,
                weight: -5.0,
                timer: Some(62.5),
            }]
        );
    }

    #[test]
    fn test_decode_battery_reports() {
        assert_eq!(
            decode_notification(&notification(0x08, &[0xD2])),
            vec![ScaleEvent::Battery(0x52)]
        );
        assert_eq!(
            decode_notification(&notification(0x08, &[0x0A, 0x40, 2, 0, 1])),
            vec![ScaleEvent::Battery(64)]
        );
    }

    #[test]
    fn test_decode_heartbeat_ack() {
        let mut body = vec![0, 0, 0x05];
        body.extend(weight_body(180, 1, 0));
        assert_eq!(
            decode_notification(&notification(0x0B, &body)),
            vec![ScaleEvent::HandshakeAck, ScaleEvent::Weight(18.0)]
        );

        let body = [0, 0, 0x07, 0, 2, 5];
        assert_eq!(
            decode_notification(&notification(0x0B, &body)),
            vec![ScaleEvent::HandshakeAck, ScaleEvent::Timer(2.5)]
        );

        assert_eq!(
            decode_notification(&notification(0x0B, &[0, 0, 0x01])),
            vec![ScaleEvent::HandshakeAck]
        );
    }

    #[test]
    fn test_decode_is_lenient() {
        assert!(decode_notification(&[]).is_empty());
        assert!(decode_notification(&[0xEF, 0xDD]).is_empty());
        assert!(decode_notification(&[0x01, 0x02, 0x03, 0x04]).is_empty());
        assert!(decode_notification(&notification(0x05, &[0x64, 0x00, 0])).is_empty());
        assert!(decode_notification(&notification(0x07, &[1])).is_empty());
        assert!(decode_notification(&notification(0x0B, &[0, 0])).is_empty());
        assert!(decode_notification(&notification(0x0C, &[])).is_empty());
        assert!(decode_notification(&notification(0x0C, &[4, 0x42, 1, 2, 3])).is_empty());
        assert!(decode_notification(&notification(0x08, &[])).is_empty());
        assert!(decode_notification(&notification(0x33, &[1, 2, 3, 4])).is_empty());
    }

    #[test]
    fn test_decode_drops_truncated_button_events() {
        assert!(decode_notification(&[0xEF, 0xDD, 0x08, 0x00, 0x05, 0x64, 0x00]).is_empty());
        assert!(decode_notification(&notification(0x08, &[10, 7, 0, 30])).is_empty());
        assert!(
            decode_notification(&[0xEF, 0xDD, 0x0C, 0x05, 0x08, 0x0A, 0x07, 0x00, 0x1E]).is_empty()
        );
    }

    #[test]
    fn test_decode_wrapped_stops_at_declared_length() {
        let frame = encode_frame(0x0C, &[7, 5, 0, 1, 0, 0, 1, 0]);
        assert_eq!(frame.last(), Some(&0x06));
        assert_eq!(decode_notification(&frame), vec![ScaleEvent::Weight(25.6)]);

        let mut body = vec![7, 0x05];
        body.extend(weight_body(40, 0, 0));
        body.extend([0x07, 0, 9, 0]);
        assert_eq!(
            decode_notification(&notification(0x0C, &body)),
            vec![ScaleEvent::Weight(40.0)]
        );
    }

    #[test]
    fn test_decode_wrapped_event_is_never_battery() {
        let body = [3, 0x08, 0x55, 0x40];
        assert!(decode_notification(&notification(0x0C, &body)).is_empty());
    }

    #[test]
    fn test_message_type_from_u8() {
        assert_eq!(MessageType::from_u8(0x0C), Some(MessageType::Notification));
        assert_eq!(MessageType::from_u8(0x0D), Some(MessageType::TimerControl));
        assert_eq!(MessageType::from_u8(0x42), None);
    }
}
