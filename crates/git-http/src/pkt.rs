//! pkt-line framing.
//!
//! Only encoding sits on the serving path; everything after the service
//! header is produced by `git` itself. The decoder exists for tests and
//! diagnostics.

use anyhow::{bail, Result};

pub const PKT_FLUSH: &[u8] = b"0000";

/// Largest payload a single pkt-line can carry (65520 minus the header).
pub const MAX_PKT_PAYLOAD: usize = 65516;

pub fn encode_pkt_line(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_PKT_PAYLOAD {
        bail!("pkt-line payload of {} bytes exceeds {MAX_PKT_PAYLOAD}", data.len());
    }
    let len = 4 + data.len();
    let mut out = Vec::with_capacity(len);
    out.extend_from_slice(format!("{len:04x}").as_bytes());
    out.extend_from_slice(data);
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pkt {
    Data(Vec<u8>),
    Flush,
    Delim,
}

pub fn decode_pkt_lines(mut buf: &[u8]) -> Result<Vec<Pkt>> {
    let mut out = Vec::new();
    while !buf.is_empty() {
        if buf.len() < 4 {
            bail!("truncated pkt-line length");
        }
        let len = usize::from_str_radix(std::str::from_utf8(&buf[..4])?, 16)?;
        buf = &buf[4..];
        match len {
            0 => out.push(Pkt::Flush),
            1 => out.push(Pkt::Delim),
            2 | 3 => bail!("invalid pkt-line length {len}"),
            _ => {
                let data_len = len - 4;
                if buf.len() < data_len {
                    bail!("truncated pkt-line data");
                }
                out.push(Pkt::Data(buf[..data_len].to_vec()));
                buf = &buf[data_len..];
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_service_header() {
        // 26 payload bytes + 4 header bytes = 0x1e, as real git emits it.
        let enc = encode_pkt_line(b"# service=git-upload-pack\n").unwrap();
        assert_eq!(enc, b"001e# service=git-upload-pack\n");
    }

    #[test]
    fn flush_is_four_zeroes() {
        assert_eq!(PKT_FLUSH, b"0000");
    }

    #[test]
    fn header_uses_lowercase_hex() {
        let payload = vec![b'x'; 0xab - 4];
        let enc = encode_pkt_line(&payload).unwrap();
        assert_eq!(&enc[..4], b"00ab");
    }

    #[test]
    fn rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PKT_PAYLOAD + 1];
        assert!(encode_pkt_line(&payload).is_err());
        assert!(encode_pkt_line(&payload[..MAX_PKT_PAYLOAD]).is_ok());
    }

    #[test]
    fn decodes_data_flush_and_delim() {
        let mut buf = encode_pkt_line(b"hello\n").unwrap();
        buf.extend_from_slice(b"0001");
        buf.extend_from_slice(PKT_FLUSH);
        let pkts = decode_pkt_lines(&buf).unwrap();
        assert_eq!(
            pkts,
            vec![Pkt::Data(b"hello\n".to_vec()), Pkt::Delim, Pkt::Flush]
        );
    }

    #[test]
    fn decode_rejects_truncation() {
        assert!(decode_pkt_lines(b"00").is_err());
        assert!(decode_pkt_lines(b"000ahel").is_err());
    }
}
