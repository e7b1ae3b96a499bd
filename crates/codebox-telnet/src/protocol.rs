//! Telnet wire protocol (RFC 854 / RFC 855).
//!
//! [`TelnetParser`] turns a raw byte stream into [`TelnetEvent`]s. It keeps
//! its state between calls to [`TelnetParser::feed`], so a command sequence
//! split across two socket reads parses exactly like one delivered whole.

use bytes::{Bytes, BytesMut};

/// Interpret As Command.
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
/// Subnegotiation begin.
pub const SB: u8 = 250;
/// Go ahead.
pub const GA: u8 = 249;
pub const NOP: u8 = 241;
/// Subnegotiation end.
pub const SE: u8 = 240;

/// Option codes seen in practice.
pub mod option {
    pub const ECHO: u8 = 1;
    pub const SUPPRESS_GO_AHEAD: u8 = 3;
    pub const STATUS: u8 = 5;
    pub const TERMINAL_TYPE: u8 = 24;
    pub const NAWS: u8 = 31;
    pub const TERMINAL_SPEED: u8 = 32;
    pub const LINEMODE: u8 = 34;
    pub const NEW_ENVIRON: u8 = 39;
}

/// Option negotiation verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

impl Verb {
    /// Decode a verb byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            WILL => Some(Self::Will),
            WONT => Some(Self::Wont),
            DO => Some(Self::Do),
            DONT => Some(Self::Dont),
            _ => None,
        }
    }

    /// Encode the verb as its wire byte.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Will => WILL,
            Self::Wont => WONT,
            Self::Do => DO,
            Self::Dont => DONT,
        }
    }
}

/// A unit of parsed telnet input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Application data with IAC escapes removed.
    Data(Bytes),
    /// A two-byte command such as `IAC GA` or `IAC NOP`.
    Command(u8),
    /// `IAC <verb> <option>`.
    Negotiate { verb: Verb, option: u8 },
    /// `IAC SB <option> ... IAC SE`.
    Subnegotiation { option: u8, payload: Bytes },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Data,
    Iac,
    Negotiate(Verb),
    SubOption,
    Sub(u8),
    SubIac(u8),
}

/// Streaming telnet parser.
#[derive(Debug)]
pub struct TelnetParser {
    state: State,
    data: BytesMut,
    sub: BytesMut,
}

impl Default for TelnetParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TelnetParser {
    /// Create a parser in the data state.
    pub fn new() -> Self {
        Self {
            state: State::Data,
            data: BytesMut::with_capacity(4096),
            sub: BytesMut::new(),
        }
    }

    /// Feed raw bytes, returning the events completed by them.
    ///
    /// Data bytes are coalesced: consecutive data between commands becomes
    /// a single [`TelnetEvent::Data`]. An incomplete trailing sequence is
    /// kept until the next call.
    pub fn feed(&mut self, input: &[u8]) -> Vec<TelnetEvent> {
        let mut events = Vec::new();

        for &b in input {
            self.state = match self.state {
                State::Data => {
                    if b == IAC {
                        State::Iac
                    } else {
                        self.data.extend_from_slice(&[b]);
                        State::Data
                    }
                }
                State::Iac => match b {
                    IAC => {
                        self.data.extend_from_slice(&[IAC]);
                        State::Data
                    }
                    SB => State::SubOption,
                    _ => match Verb::from_byte(b) {
                        Some(verb) => State::Negotiate(verb),
                        None => {
                            self.flush_data(&mut events);
                            events.push(TelnetEvent::Command(b));
                            State::Data
                        }
                    },
                },
                State::Negotiate(verb) => {
                    self.flush_data(&mut events);
                    events.push(TelnetEvent::Negotiate { verb, option: b });
                    State::Data
                }
                State::SubOption => {
                    self.sub.clear();
                    State::Sub(b)
                }
                State::Sub(option) => {
                    if b == IAC {
                        State::SubIac(option)
                    } else {
                        self.sub.extend_from_slice(&[b]);
                        State::Sub(option)
                    }
                }
                State::SubIac(option) => match b {
                    SE => {
                        self.flush_data(&mut events);
                        events.push(TelnetEvent::Subnegotiation {
                            option,
                            payload: self.sub.split().freeze(),
                        });
                        State::Data
                    }
                    IAC => {
                        self.sub.extend_from_slice(&[IAC]);
                        State::Sub(option)
                    }
                    // Malformed: keep both bytes and stay inside the block.
                    other => {
                        self.sub.extend_from_slice(&[IAC, other]);
                        State::Sub(option)
                    }
                },
            };
        }

        self.flush_data(&mut events);
        events
    }

    fn flush_data(&mut self, events: &mut Vec<TelnetEvent>) {
        if !self.data.is_empty() {
            events.push(TelnetEvent::Data(self.data.split().freeze()));
        }
    }
}

/// Decide the reply to a negotiation request.
///
/// The client lets the server echo and suppress go-ahead, and refuses every
/// other option. `WONT`/`DONT` are acknowledgements and get no reply.
pub fn negotiation_reply(verb: Verb, opt: u8) -> Option<[u8; 3]> {
    match verb {
        Verb::Will if matches!(opt, option::ECHO | option::SUPPRESS_GO_AHEAD) => {
            Some([IAC, DO, opt])
        }
        Verb::Will => Some([IAC, DONT, opt]),
        Verb::Do => Some([IAC, WONT, opt]),
        Verb::Wont | Verb::Dont => None,
    }
}

/// Escape outgoing application data by doubling IAC bytes.
pub fn escape_data(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    for &b in data {
        if b == IAC {
            out.push(IAC);
        }
        out.push(b);
    }
    out
}

/// Decode received data into text.
///
/// Invalid UTF-8 is replaced and CRLF becomes `\n`. NUL padding and bare CR
/// (including CR NUL) are dropped.
pub fn decode_text(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\0' => {}
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    out.push('\n');
                }
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &'static [u8]) -> TelnetEvent {
        TelnetEvent::Data(Bytes::from_static(s))
    }

    #[test]
    fn test_plain_data() {
        let mut parser = TelnetParser::new();
        assert_eq!(parser.feed(b"hello"), vec![data(b"hello")]);
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut parser = TelnetParser::new();
        let events = parser.feed(&[b'a', IAC, IAC, b'b']);
        assert_eq!(events, vec![TelnetEvent::Data(Bytes::from(vec![b'a', 0xFF, b'b']))]);
    }

    #[test]
    fn test_negotiation_between_data() {
        let mut parser = TelnetParser::new();
        let events = parser.feed(&[b'x', IAC, DO, option::TERMINAL_TYPE, b'y']);
        assert_eq!(
            events,
            vec![
                data(b"x"),
                TelnetEvent::Negotiate {
                    verb: Verb::Do,
                    option: option::TERMINAL_TYPE
                },
                data(b"y"),
            ]
        );
    }

    #[test]
    fn test_sequence_split_across_feeds() {
        let mut parser = TelnetParser::new();
        assert!(parser.feed(&[IAC]).is_empty());
        assert!(parser.feed(&[WILL]).is_empty());
        assert_eq!(
            parser.feed(&[option::ECHO]),
            vec![TelnetEvent::Negotiate {
                verb: Verb::Will,
                option: option::ECHO
            }]
        );
    }

    #[test]
    fn test_subnegotiation() {
        let mut parser = TelnetParser::new();
        let events = parser.feed(&[IAC, SB, option::TERMINAL_TYPE, 1, IAC, IAC, IAC, SE]);
        assert_eq!(
            events,
            vec![TelnetEvent::Subnegotiation {
                option: option::TERMINAL_TYPE,
                payload: Bytes::from(vec![1, IAC]),
            }]
        );
    }

    #[test]
    fn test_simple_command() {
        let mut parser = TelnetParser::new();
        assert_eq!(
            parser.feed(&[b'>', IAC, GA]),
            vec![data(b">"), TelnetEvent::Command(GA)]
        );
    }

    #[test]
    fn test_negotiation_policy() {
        assert_eq!(
            negotiation_reply(Verb::Will, option::ECHO),
            Some([IAC, DO, option::ECHO])
        );
        assert_eq!(
            negotiation_reply(Verb::Will, option::SUPPRESS_GO_AHEAD),
            Some([IAC, DO, option::SUPPRESS_GO_AHEAD])
        );
        assert_eq!(
            negotiation_reply(Verb::Will, option::LINEMODE),
            Some([IAC, DONT, option::LINEMODE])
        );
        assert_eq!(
            negotiation_reply(Verb::Do, option::NAWS),
            Some([IAC, WONT, option::NAWS])
        );
        assert_eq!(negotiation_reply(Verb::Wont, option::ECHO), None);
        assert_eq!(negotiation_reply(Verb::Dont, option::ECHO), None);
    }

    #[test]
    fn test_escape_data() {
        assert_eq!(escape_data(&[1, IAC, 2]), vec![1, IAC, IAC, 2]);
        assert_eq!(escape_data(b"ls"), b"ls".to_vec());
    }

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"a\r\nb\r\0c\rd"), "a\nbcd");
        assert_eq!(decode_text(b"progress 10%\rprogress 20%\r\n"), "progress 10%progress 20%\n");
    }
}
