//! Signing key IDs from an ASCII-armored OpenPGP signature.
//!
//! Only as much of RFC 4880 / RFC 9580 is decoded as is needed to name the
//! signer: armor, packet framing, and the issuer fields of signature packets.
//! Nothing is verified.

use crate::error::SignatureError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

pub const BEGIN_SIGNATURE: &str = "-----BEGIN PGP SIGNATURE-----";
pub const END_SIGNATURE: &str = "-----END PGP SIGNATURE-----";

const TAG_SIGNATURE: u8 = 2;
const SUBPACKET_ISSUER: u8 = 16;
const SUBPACKET_ISSUER_FINGERPRINT: u8 = 33;

/// Key IDs named by the signature packets in `armored`, as 16-digit lowercase
/// hex, deduplicated in order of appearance.
pub fn key_ids(armored: &str) -> Result<Vec<String>, SignatureError> {
    let data = dearmor(armored)?;
    let mut ids = Vec::new();
    let mut saw_signature = false;

    for packet in packets(&data)? {
        if packet.tag == TAG_SIGNATURE {
            saw_signature = true;
            signature_issuers(packet.body, &mut ids)?;
        }
    }

    if !saw_signature {
        return Err(SignatureError::NoSignature);
    }
    Ok(ids)
}

/// Strip the armor lines, armor headers and CRC, then base64-decode the body.
fn dearmor(text: &str) -> Result<Vec<u8>, SignatureError> {
    let mut lines = text.lines().map(str::trim_end);
    lines
        .by_ref()
        .find(|line| line.starts_with(BEGIN_SIGNATURE))
        .ok_or(SignatureError::MissingArmor)?;

    let mut body = String::new();
    let mut in_headers = true;
    for line in lines {
        if line.starts_with("-----END PGP") {
            break;
        }
        if in_headers {
            if line.trim().is_empty() {
                in_headers = false;
                continue;
            }
            if line.contains(": ") {
                continue;
            }
            in_headers = false;
        }
        if line.starts_with('=') {
            // CRC24
            continue;
        }
        body.push_str(line.trim());
    }

    if body.is_empty() {
        return Err(SignatureError::MissingArmor);
    }
    Ok(STANDARD.decode(body)?)
}

struct Packet<'a> {
    tag: u8,
    body: &'a [u8],
}

fn packets(data: &[u8]) -> Result<Vec<Packet<'_>>, SignatureError> {
    let mut out = Vec::new();
    let mut pos = 0;

    while pos < data.len() {
        let header = data[pos];
        if header & 0x80 == 0 {
            return Err(SignatureError::BadHeader(pos));
        }

        let (tag, len, header_len) = if header & 0x40 != 0 {
            let (len, n) = packet_length(data, pos + 1)?;
            (header & 0x3f, len, 1 + n)
        } else {
            let tag = (header >> 2) & 0x0f;
            match header & 0x03 {
                0 => (tag, read_be(data, pos + 1, 1)?, 2),
                1 => (tag, read_be(data, pos + 1, 2)?, 3),
                2 => (tag, read_be(data, pos + 1, 4)?, 5),
                // indeterminate: runs to the end of the data
                _ => (tag, data.len() - pos - 1, 1),
            }
        };

        let start = pos + header_len;
        let end = start
            .checked_add(len)
            .filter(|&end| end <= data.len())
            .ok_or(SignatureError::Truncated(pos))?;
        out.push(Packet {
            tag,
            body: &data[start..end],
        });
        pos = end;
    }

    Ok(out)
}

/// New-format packet length. Returns `(length, octets consumed)`.
fn packet_length(data: &[u8], at: usize) -> Result<(usize, usize), SignatureError> {
    let first = *data.get(at).ok_or(SignatureError::Truncated(at))? as usize;
    match first {
        0..=191 => Ok((first, 1)),
        192..=223 => {
            let second = read_be(data, at + 1, 1)?;
            Ok((((first - 192) << 8) + second + 192, 2))
        }
        255 => Ok((read_be(data, at + 1, 4)?, 5)),
        _ => Err(SignatureError::PartialLength),
    }
}

/// Subpacket length. Same as the packet form except 224..=254 are two-octet.
fn subpacket_length(data: &[u8], at: usize) -> Result<(usize, usize), SignatureError> {
    let first = *data.get(at).ok_or(SignatureError::Truncated(at))? as usize;
    match first {
        0..=191 => Ok((first, 1)),
        192..=254 => {
            let second = read_be(data, at + 1, 1)?;
            Ok((((first - 192) << 8) + second + 192, 2))
        }
        _ => Ok((read_be(data, at + 1, 4)?, 5)),
    }
}

fn read_be(data: &[u8], at: usize, n: usize) -> Result<usize, SignatureError> {
    let bytes = data
        .get(at..at + n)
        .ok_or(SignatureError::Truncated(at))?;
    Ok(bytes.iter().fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

fn signature_issuers(body: &[u8], ids: &mut Vec<String>) -> Result<(), SignatureError> {
    let version = *body.first().ok_or(SignatureError::Truncated(0))?;
    let count_width = match version {
        2 | 3 => {
            // version, hashed length (5), type, creation time, key ID
            let key = body.get(7..15).ok_or(SignatureError::Truncated(7))?;
            push_unique(ids, hex(key));
            return Ok(());
        }
        4 => 2,
        5 | 6 => 4,
        _ => return Ok(()),
    };

    // version, type, public-key algorithm, hash algorithm
    let mut pos = 4;
    for _area in ["hashed", "unhashed"] {
        let len = read_be(body, pos, count_width)?;
        pos += count_width;
        let area = body
            .get(pos..pos + len)
            .ok_or(SignatureError::Truncated(pos))?;
        subpacket_issuers(area, ids)?;
        pos += len;
    }
    Ok(())
}

fn subpacket_issuers(area: &[u8], ids: &mut Vec<String>) -> Result<(), SignatureError> {
    let mut pos = 0;
    while pos < area.len() {
        let (len, n) = subpacket_length(area, pos)?;
        pos += n;
        if len == 0 {
            continue;
        }
        let sub = area
            .get(pos..pos + len)
            .ok_or(SignatureError::Truncated(pos))?;
        let data = &sub[1..];
        match sub[0] & 0x7f {
            SUBPACKET_ISSUER if data.len() == 8 => push_unique(ids, hex(data)),
            SUBPACKET_ISSUER_FINGERPRINT if data.len() > 8 => {
                let fingerprint = &data[1..];
                // v4 key IDs are the low 64 bits of the fingerprint, v6 the high
                let key = if data[0] == 4 {
                    &fingerprint[fingerprint.len() - 8..]
                } else {
                    &fingerprint[..8]
                };
                push_unique(ids, hex(key));
            }
            _ => {}
        }
        pos += len;
    }
    Ok(())
}

fn push_unique(ids: &mut Vec<String>, id: String) {
    if !ids.contains(&id) {
        ids.push(id);
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
