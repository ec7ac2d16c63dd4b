//! Font resolution: code-to-text decoding and glyph widths.

use std::collections::HashMap;

use lazy_static::lazy_static;
use lopdf::{Dictionary, Document, Object};
use regex::Regex;
use tracing::trace;

lazy_static! {
    static ref BFCHAR_SECTION: Regex =
        Regex::new(r"(?s)beginbfchar(.*?)endbfchar").unwrap();
    static ref BFRANGE_SECTION: Regex =
        Regex::new(r"(?s)beginbfrange(.*?)endbfrange").unwrap();
    static ref BFCHAR_ENTRY: Regex =
        Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]*)>").unwrap();
    static ref BFRANGE_ENTRY: Regex = Regex::new(
        r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]*)>|\[([^\]]*)\])"
    ).unwrap();
    static ref HEX_STRING: Regex = Regex::new(r"<([0-9A-Fa-f]*)>").unwrap();
}

/// Width used when a font carries no metrics, in thousandths of an em.
const FALLBACK_WIDTH: f32 = 500.0;

/// Monospaced fallback width for Courier.
const COURIER_WIDTH: f32 = 600.0;

/// One decoded glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    /// Character code as it appears in the string.
    pub code: u32,
    /// Unicode text for the code (may be empty or several chars).
    pub text: String,
    /// True for the single-byte space code, which receives word spacing.
    pub is_word_space: bool,
}

/// A parsed `ToUnicode` CMap.
#[derive(Debug, Clone, Default)]
pub struct ToUnicodeMap {
    map: HashMap<u32, String>,
}

impl ToUnicodeMap {
    /// Parse `bfchar` and `bfrange` sections of a CMap program.
    pub fn parse(program: &str) -> Self {
        let mut map = HashMap::new();

        for section in BFCHAR_SECTION.captures_iter(program) {
            for entry in BFCHAR_ENTRY.captures_iter(&section[1]) {
                if let Some(code) = parse_hex_code(&entry[1]) {
                    map.insert(code, utf16_hex_to_string(&entry[2]));
                }
            }
        }

        for section in BFRANGE_SECTION.captures_iter(program) {
            for entry in BFRANGE_ENTRY.captures_iter(&section[1]) {
                let (Some(lo), Some(hi)) = (parse_hex_code(&entry[1]), parse_hex_code(&entry[2]))
                else {
                    continue;
                };
                if hi < lo || hi - lo > 0xFFFF {
                    continue;
                }

                if let Some(base) = entry.get(3) {
                    let units = hex_to_utf16(base.as_str());
                    for (offset, code) in (lo..=hi).enumerate() {
                        let mut shifted = units.clone();
                        if let Some(last) = shifted.last_mut() {
                            *last = last.wrapping_add(offset as u16);
                        }
                        map.insert(code, String::from_utf16_lossy(&shifted));
                    }
                } else if let Some(list) = entry.get(4) {
                    let targets: Vec<String> = HEX_STRING
                        .captures_iter(list.as_str())
                        .map(|c| utf16_hex_to_string(&c[1]))
                        .collect();
                    for (code, text) in (lo..=hi).zip(targets) {
                        map.insert(code, text);
                    }
                }
            }
        }

        Self { map }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Glyph widths in thousandths of an em.
#[derive(Debug, Clone)]
enum Widths {
    /// Simple font `FirstChar` / `Widths`.
    Simple { first_char: u32, widths: Vec<f32> },
    /// CID font `W` array, flattened.
    Cid(HashMap<u32, f32>),
    None,
}

/// Everything needed to turn string operands into text and advances.
#[derive(Debug, Clone)]
pub struct FontInfo {
    pub base_font: String,
    two_byte: bool,
    to_unicode: Option<ToUnicodeMap>,
    widths: Widths,
    default_width: f32,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            base_font: String::new(),
            two_byte: false,
            to_unicode: None,
            widths: Widths::None,
            default_width: FALLBACK_WIDTH,
        }
    }
}

impl FontInfo {
    /// Build font info from a font dictionary.
    pub fn from_dict(doc: &Document, dict: &Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();

        let subtype = dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok());
        let two_byte = subtype == Some(b"Type0".as_slice());

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| stream_bytes(doc, o))
            .map(|bytes| ToUnicodeMap::parse(&String::from_utf8_lossy(&bytes)))
            .filter(|m| !m.is_empty());

        let fallback = if base_font.contains("Courier") {
            COURIER_WIDTH
        } else {
            FALLBACK_WIDTH
        };

        let (widths, default_width) = if two_byte {
            descendant_widths(doc, dict).unwrap_or((Widths::None, fallback))
        } else {
            (simple_widths(doc, dict), fallback)
        };

        trace!(
            "Font {}: two_byte={}, to_unicode={}",
            base_font,
            two_byte,
            to_unicode.as_ref().map(|m| m.len()).unwrap_or(0)
        );

        Self {
            base_font,
            two_byte,
            to_unicode,
            widths,
            default_width,
        }
    }

    /// Split a string operand into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if !self.two_byte && self.to_unicode.is_none() && bytes.starts_with(&[0xFE, 0xFF]) {
            let units: Vec<u16> = bytes[2..]
                .chunks(2)
                .filter(|c| c.len() == 2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            return char::decode_utf16(units)
                .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
                .map(|ch| Glyph {
                    code: ch as u32,
                    text: ch.to_string(),
                    is_word_space: ch == ' ',
                })
                .collect();
        }

        let codes: Vec<u32> = if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| match c {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|b| u32::from(*b)).collect()
        };

        codes
            .into_iter()
            .map(|code| {
                let text = match self.to_unicode.as_ref().and_then(|m| m.get(code)) {
                    Some(mapped) => mapped.to_string(),
                    None if self.two_byte => String::new(),
                    None => win_ansi_char(code as u8).to_string(),
                };
                Glyph {
                    code,
                    text,
                    is_word_space: !self.two_byte && code == 32,
                }
            })
            .collect()
    }

    /// Advance width of a code in thousandths of an em.
    pub fn width(&self, code: u32) -> f32 {
        match &self.widths {
            Widths::Simple { first_char, widths } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .filter(|w| *w > 0.0)
                .unwrap_or(self.default_width),
            Widths::Cid(map) => map.get(&code).copied().unwrap_or(self.default_width),
            Widths::None => self.default_width,
        }
    }
}

/// Collect font dictionaries from a resources dictionary, keyed by resource name.
pub fn resource_fonts<'a>(doc: &'a Document, resources: &'a Dictionary) -> Vec<(Vec<u8>, &'a Dictionary)> {
    let Ok(fonts) = resources.get(b"Font") else {
        return Vec::new();
    };
    let Ok((_, Object::Dictionary(fonts))) = doc.dereference(fonts) else {
        return Vec::new();
    };

    fonts
        .iter()
        .filter_map(|(name, obj)| match doc.dereference(obj) {
            Ok((_, Object::Dictionary(d))) => Some((name.clone(), d)),
            _ => None,
        })
        .collect()
}

fn stream_bytes(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    match doc.dereference(obj).ok()? {
        (_, Object::Stream(stream)) => Some(
            stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
        ),
        _ => None,
    }
}

pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

fn simple_widths(doc: &Document, dict: &Dictionary) -> Widths {
    let first_char = dict
        .get(b"FirstChar")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0)
        .max(0) as u32;

    let widths = dict
        .get(b"Widths")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_array().ok())
        .map(|arr| {
            arr.iter()
                .map(|w| doc.dereference(w).ok().and_then(|(_, o)| number(o)).unwrap_or(0.0))
                .collect::<Vec<_>>()
        });

    match widths {
        Some(widths) if !widths.is_empty() => Widths::Simple { first_char, widths },
        _ => Widths::None,
    }
}

fn descendant_widths(doc: &Document, dict: &Dictionary) -> Option<(Widths, f32)> {
    let descendants = dict.get(b"DescendantFonts").ok()?;
    let (_, descendants) = doc.dereference(descendants).ok()?;
    let first = descendants.as_array().ok()?.first()?;
    let (_, cid_font) = doc.dereference(first).ok()?;
    let cid_font = cid_font.as_dict().ok()?;

    let default_width = cid_font
        .get(b"DW")
        .ok()
        .and_then(number)
        .unwrap_or(1000.0);

    let mut map = HashMap::new();
    if let Some(w) = cid_font
        .get(b"W")
        .ok()
        .and_then(|o| doc.dereference(o).ok())
        .and_then(|(_, o)| o.as_array().ok())
    {
        let mut i = 0;
        while i < w.len() {
            let Some(start) = number(&w[i]) else {
                break;
            };
            match w.get(i + 1) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = number(width) {
                            map.insert(start as u32 + offset as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let (Some(end), Some(width)) = (number(end), w.get(i + 2).and_then(number))
                    else {
                        break;
                    };
                    for code in start as u32..=end as u32 {
                        map.insert(code, width);
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    Some((Widths::Cid(map), default_width))
}

fn parse_hex_code(hex: &str) -> Option<u32> {
    u32::from_str_radix(hex, 16).ok()
}

fn hex_to_utf16(hex: &str) -> Vec<u16> {
    let bytes: Vec<u8> = hex
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
        .collect();

    if bytes.len() == 1 {
        return vec![u16::from(bytes[0])];
    }
    bytes
        .chunks(2)
        .map(|c| match c {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn utf16_hex_to_string(hex: &str) -> String {
    String::from_utf16_lossy(&hex_to_utf16(hex))
}

/// Map a single byte through WinAnsiEncoding, falling back to Latin-1.
pub fn win_ansi_char(byte: u8) -> char {
    match byte {
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        other => char::from(other),
    }
}
