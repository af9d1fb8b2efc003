//! OSC 1.0 message encoding (the subset the visual engine listener accepts).
//!
//! Layout: padded address string, padded type tag string (`,s` or `,ss`), then each
//! argument. Strings are NUL-terminated and padded to a multiple of 4 bytes.

/// A message whose arguments are all OSC strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<String>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        write_str(&mut buf, &self.address);
        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(|_| 's'));
        write_str(&mut buf, &tags);
        for arg in &self.args {
            write_str(&mut buf, arg);
        }
        buf
    }
}

/// Interior NULs are dropped: a receiver stops reading a string at the first NUL, which
/// would misalign every following argument.
fn write_str(buf: &mut Vec<u8>, s: &str) {
    let start = buf.len();
    buf.extend(s.bytes().filter(|&b| b != 0));
    let len = buf.len() - start;
    let padded = (len / 4 + 1) * 4;
    buf.resize(start + padded, 0);
}
