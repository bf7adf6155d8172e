//! `install.inf` scheme parsing.
//!
//! A Windows cursor pack registers its scheme with a single registry line
//! under `[Scheme.Reg]`:
//!
//! ```text
//! HKCU,"Control Panel\Cursors\Schemes","%SCHEME_NAME%",,"%10%\%CUR_DIR%\%pointer%,..."
//! ```
//!
//! The quoted list after `,,` holds one path per cursor role in the fixed
//! order Windows stores schemes in. `%name%` tokens are resolved against the
//! `[Strings]` section.

use log::debug;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::InfError;
use crate::model::role::CursorRole;

const SCHEME_REG_SECTION: &str = "scheme.reg";
const STRINGS_SECTION: &str = "strings";
const SCHEMES_KEY: &str = "control panel\\cursors\\schemes";

/// Roles for each slot of a Windows cursor scheme, in registry order.
pub const INF_POSITION_ROLES: [&[CursorRole]; 17] = {
    use CursorRole::*;
    [
        &[Arrow],                // 0  Arrow
        &[Help],                 // 1  Help
        &[Wait],                 // 2  AppStarting
        &[Busy],                 // 3  Wait
        &[Crosshair],            // 4  Crosshair
        &[Ibeam],                // 5  IBeam
        &[],                     // 6  NWPen
        &[Forbidden],            // 7  No
        &[ResizeNs, WindowNs],   // 8  SizeNS
        &[ResizeWe, WindowEw],   // 9  SizeWE
        &[WindowNwse],           // 10 SizeNWSE
        &[WindowNesw],           // 11 SizeNESW
        &[Move],                 // 12 SizeAll
        &[],                     // 13 UpArrow
        &[Pointing],             // 14 Hand
        &[],                     // 15 Pin
        &[],                     // 16 Person
    ]
};

/// Roles for a scheme position; empty for slots with no equivalent and for
/// positions past the end of the table.
pub fn roles_for_position(position: usize) -> &'static [CursorRole] {
    INF_POSITION_ROLES.get(position).copied().unwrap_or(&[])
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfMapping {
    /// Scheme slot to bare file name, e.g. `0 -> "Normal.ani"`.
    pub position_to_filename: BTreeMap<usize, String>,
    pub scheme_name: Option<String>,
    pub cursor_dir: Option<String>,
}

impl InfMapping {
    /// Scheme positions that reference `file_name`, compared case-insensitively.
    pub fn positions_for(&self, file_name: &str) -> Vec<usize> {
        self.position_to_filename
            .iter()
            .filter(|(_, name)| name.eq_ignore_ascii_case(file_name))
            .map(|(&position, _)| position)
            .collect()
    }

    /// All roles `file_name` fills in this scheme.
    pub fn roles_for(&self, file_name: &str) -> Vec<CursorRole> {
        let mut roles = Vec::new();
        for position in self.positions_for(file_name) {
            for role in roles_for_position(position) {
                if !roles.contains(role) {
                    roles.push(*role);
                }
            }
        }
        roles
    }

    pub fn len(&self) -> usize {
        self.position_to_filename.len()
    }

    pub fn is_empty(&self) -> bool {
        self.position_to_filename.is_empty()
    }
}

pub fn parse_inf_file(path: &Path) -> Result<InfMapping, InfError> {
    let data = std::fs::read(path).map_err(|e| {
        debug!("cannot read {}: {}", path.display(), e);
        InfError::FileNotFound(path.to_path_buf())
    })?;
    parse_inf(&data)
}

pub fn parse_inf(data: &[u8]) -> Result<InfMapping, InfError> {
    let text = decode_text(data)?;
    let sections = Sections::parse(&text);
    let strings = sections.strings();

    let scheme_lines = sections
        .get(SCHEME_REG_SECTION)
        .ok_or(InfError::NoSchemeRegSection)?;

    let line = scheme_lines
        .iter()
        .find(|line| line.to_lowercase().contains(SCHEMES_KEY))
        .ok_or(InfError::NoCursorPaths)?;

    let (head, list) = line.split_once(",,").ok_or(InfError::NoCursorPaths)?;
    let list = unquote(list.trim());
    if list.trim().is_empty() {
        return Err(InfError::NoCursorPaths);
    }

    let mut position_to_filename = BTreeMap::new();
    let mut paths = list.split(',');
    for (position, path) in paths.by_ref().take(INF_POSITION_ROLES.len()).enumerate() {
        match resolve_file_name(path, &strings) {
            Some(name) => {
                position_to_filename.insert(position, name);
            }
            None => debug!("scheme slot {} ({:?}) does not resolve to a file", position, path),
        }
    }
    let extra = paths.count();
    if extra > 0 {
        debug!("ignoring {} scheme entries past slot {}", extra, INF_POSITION_ROLES.len() - 1);
    }

    if position_to_filename.is_empty() {
        return Err(InfError::NoValidCursors);
    }

    let scheme_name = head
        .rsplit(',')
        .next()
        .map(|field| unquote(field.trim()))
        .filter(|field| !field.is_empty() && !field.to_lowercase().contains(SCHEMES_KEY))
        .and_then(|field| resolve_tokens(field, &strings))
        .or_else(|| strings.get("scheme_name").cloned())
        .filter(|name| !name.is_empty());

    Ok(InfMapping {
        position_to_filename,
        scheme_name,
        cursor_dir: strings.get("cur_dir").cloned(),
    })
}

/// INF lines grouped by lower-cased section name.
struct Sections<'a> {
    sections: HashMap<String, Vec<&'a str>>,
}

impl<'a> Sections<'a> {
    fn parse(text: &'a str) -> Self {
        let mut sections: HashMap<String, Vec<&'a str>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                let name = line[1..line.len() - 1].trim().to_lowercase();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }
            if let Some(name) = &current {
                sections.entry(name.clone()).or_default().push(line);
            }
        }

        Self { sections }
    }

    fn get(&self, name: &str) -> Option<&Vec<&'a str>> {
        self.sections.get(name)
    }

    /// `[Strings]` as a lower-cased key to unquoted value table.
    fn strings(&self) -> HashMap<String, String> {
        let Some(lines) = self.get(STRINGS_SECTION) else {
            return HashMap::new();
        };

        lines
            .iter()
            .filter_map(|line| line.split_once('='))
            .map(|(key, value)| (key.trim().to_lowercase(), unquote(value.trim()).to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect()
    }
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Expands every `%name%` token; `None` if any token is undefined.
fn resolve_tokens(value: &str, strings: &HashMap<String, String>) -> Option<String> {
    let mut resolved = String::new();
    let mut rest = value;

    while let Some(start) = rest.find('%') {
        resolved.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('%')?;
        let key = after[..end].to_lowercase();
        resolved.push_str(strings.get(&key)?);
        rest = &after[end + 1..];
    }
    resolved.push_str(rest);

    Some(resolved)
}

/// The bare file name at the end of one scheme path.
fn resolve_file_name(path: &str, strings: &HashMap<String, String>) -> Option<String> {
    let last = path.trim().rsplit(['\\', '/']).next()?.trim();
    let resolved = resolve_tokens(last, strings)?;
    let name = resolved.rsplit(['\\', '/']).next()?.trim();

    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Decodes INF bytes: UTF-8 (with or without BOM), UTF-16LE with BOM, or
/// Windows-1252.
fn decode_text(data: &[u8]) -> Result<String, InfError> {
    if let Some(rest) = data.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|_| InfError::EncodingError);
    }

    if let Some(rest) = data.strip_prefix(&[0xFF, 0xFE]) {
        if rest.len() % 2 != 0 {
            return Err(InfError::EncodingError);
        }
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16(&units).map_err(|_| InfError::EncodingError);
    }

    match std::str::from_utf8(data) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => decode_windows_1252(data),
    }
}

/// 0x80..=0x9F in Windows-1252; `None` marks the five unassigned bytes.
#[rustfmt::skip]
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

fn decode_windows_1252(data: &[u8]) -> Result<String, InfError> {
    data.iter()
        .map(|&byte| match byte {
            0x80..=0x9F => CP1252_HIGH[(byte - 0x80) as usize].ok_or(InfError::EncodingError),
            _ => Ok(byte as char),
        })
        .collect()
}
