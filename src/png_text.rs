//! Minimal PNG text-chunk reader.
//!
//! Image generators embed their prompt graph in PNG text chunks (keyword
//! `prompt`, JSON value). This reads two chunk types:
//! - `tEXt`: `keyword \0 text`, both Latin-1
//! - `iTXt`: `keyword \0 flag method lang \0 translated \0 text`, UTF-8 text;
//!   only uncompressed (`flag == 0`) chunks are read
//!
//! Compressed `zTXt` chunks are skipped. No external dependencies.

use std::collections::BTreeMap;

use crate::backend::MetadataDecoder;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Read all text chunks from PNG bytes.
/// Returns an empty map for non-PNG or truncated input. The first chunk
/// with a given keyword wins.
pub fn read_png_text(data: &[u8]) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if !data.starts_with(PNG_SIGNATURE) {
        return fields;
    }

    let mut pos = PNG_SIGNATURE.len();
    // Each chunk: length (4, BE) + type (4) + data (length) + CRC (4)
    while pos + 8 <= data.len() {
        let length =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let chunk_type = &data[pos + 4..pos + 8];
        let start = pos + 8;
        // A chunk only counts once its CRC bytes are present too
        let Some(end) = start
            .checked_add(length)
            .filter(|&end| end.saturating_add(4) <= data.len())
        else {
            break;
        };
        let body = &data[start..end];

        let parsed = match chunk_type {
            b"tEXt" => parse_text_chunk(body),
            b"iTXt" => parse_itxt_chunk(body),
            b"IEND" => break,
            _ => None,
        };
        if let Some((keyword, text)) = parsed {
            fields.entry(keyword).or_insert(text);
        }

        pos = end + 4;
    }

    fields
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn split_nul(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let nul = bytes.iter().position(|&b| b == 0)?;
    Some((&bytes[..nul], &bytes[nul + 1..]))
}

fn parse_text_chunk(body: &[u8]) -> Option<(String, String)> {
    let (keyword, text) = split_nul(body)?;
    if keyword.is_empty() {
        return None;
    }
    Some((latin1(keyword), latin1(text)))
}

fn parse_itxt_chunk(body: &[u8]) -> Option<(String, String)> {
    let (keyword, rest) = split_nul(body)?;
    if keyword.is_empty() || rest.len() < 2 {
        return None;
    }
    let compressed = rest[0] != 0;
    if compressed {
        return None;
    }
    let (_language, rest) = split_nul(&rest[2..])?;
    let (_translated, text) = split_nul(rest)?;
    let text = String::from_utf8(text.to_vec()).ok()?;
    Some((latin1(keyword), text))
}

/// [`MetadataDecoder`] backed by [`read_png_text`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PngTextDecoder;

impl MetadataDecoder for PngTextDecoder {
    fn decode(&self, bytes: &[u8]) -> Option<BTreeMap<String, String>> {
        let fields = read_png_text(bytes);
        (!fields.is_empty()).then_some(fields)
    }
}

/// Build a PNG byte stream with the given chunks (CRC bytes zeroed).
#[cfg(test)]
pub(crate) fn png_with_chunks(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    for (kind, body) in chunks {
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(*kind);
        out.extend_from_slice(body);
        out.extend_from_slice(&[0, 0, 0, 0]);
    }
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(b"IEND");
    out.extend_from_slice(&[0, 0, 0, 0]);
    out
}

/// Body of a `tEXt` chunk.
#[cfg(test)]
pub(crate) fn text_chunk(keyword: &str, text: &str) -> Vec<u8> {
    let mut body = keyword.as_bytes().to_vec();
    body.push(0);
    body.extend_from_slice(text.as_bytes());
    body
}
