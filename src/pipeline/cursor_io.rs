// Folder-level cursor conversion: listing, role assignment and output

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::inf::{InfMapping, parse_inf, parse_inf_file};
use super::wincur::{ConversionOptions, CursorFormat, convert_bytes};
use crate::config::Config;
use crate::error::{CursorError, InfError};
use crate::model::cursor::{CursorResult, MappedCursor, RoleSource};
use crate::model::mapping::CursorMapping;
use crate::model::role::CursorRole;

pub const SUMMARY_FILE_NAME: &str = "cursors.toml";
const INSTALL_INF: &str = "install.inf";

/// One file of a cursor folder, read into memory.
#[derive(Clone, Debug)]
pub struct CursorSource {
    pub file_name: String,
    pub data: Vec<u8>,
}

impl CursorSource {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            data,
        }
    }

    /// Declared format from the extension, falling back to the content.
    fn format(&self) -> Option<CursorFormat> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(CursorFormat::from_extension)
            .or_else(|| CursorFormat::detect(&self.data))
    }
}

/// Result of converting a whole folder.
#[derive(Clone, Debug)]
pub struct ConversionBatch {
    /// Converted cursors in listing order.
    pub cursors: Vec<MappedCursor>,
    pub inf_mapping: Option<InfMapping>,
    pub role_source: RoleSource,
    /// Files that failed to convert, with the reason.
    pub skipped: Vec<(String, String)>,
}

impl ConversionBatch {
    pub fn roles_covered(&self) -> Vec<CursorRole> {
        let mut roles: Vec<CursorRole> = self
            .cursors
            .iter()
            .flat_map(|c| c.roles.iter().copied())
            .collect();
        roles.sort();
        roles.dedup();
        roles
    }
}

/// Converts an in-memory folder listing. Per-file failures are logged and
/// collected in `skipped`; they never abort the batch.
pub fn convert_listing(
    files: &[CursorSource],
    inf: Option<&[u8]>,
    mapping: &CursorMapping,
    options: &ConversionOptions,
) -> ConversionBatch {
    convert_sources(files, inf.map(parse_inf), mapping, options)
}

fn convert_sources(
    files: &[CursorSource],
    scheme: Option<Result<InfMapping, InfError>>,
    mapping: &CursorMapping,
    options: &ConversionOptions,
) -> ConversionBatch {
    let candidates: Vec<(&CursorSource, CursorFormat)> = files
        .iter()
        .filter_map(|source| source.format().map(|format| (source, format)))
        .collect();

    let convert = |(source, format): &(&CursorSource, CursorFormat)| {
        let result = convert_bytes(&source.data, format.extension(), options).map(|mut result| {
            result.source_name = stem(&source.file_name);
            result
        });
        (source.file_name.clone(), result)
    };

    let results: Vec<(String, Result<CursorResult, CursorError>)> = if options.parallel {
        candidates.par_iter().map(convert).collect()
    } else {
        candidates.iter().map(convert).collect()
    };

    let mut converted = Vec::new();
    let mut skipped = Vec::new();
    for (file_name, result) in results {
        match result {
            Ok(result) => converted.push((file_name, result)),
            Err(e) => {
                warn!("Skipping {}: {}", file_name, e);
                skipped.push((file_name, e.to_string()));
            }
        }
    }

    let inf_mapping = scheme.and_then(|parsed| match parsed {
        Ok(mapping) => Some(mapping),
        Err(e) => {
            warn!("Ignoring install.inf ({}), using file names for roles", e);
            None
        }
    });

    let (cursors, role_source) = match &inf_mapping {
        Some(scheme) => (assign_from_inf(converted, scheme), RoleSource::Inf),
        None => (assign_from_filenames(converted, mapping), RoleSource::Filename),
    };

    info!(
        "Converted {} cursors ({} skipped), roles from {:?}",
        cursors.len(),
        skipped.len(),
        role_source
    );

    ConversionBatch {
        cursors,
        inf_mapping,
        role_source,
        skipped,
    }
}

fn assign_from_inf(
    converted: Vec<(String, CursorResult)>,
    scheme: &InfMapping,
) -> Vec<MappedCursor> {
    for (position, name) in &scheme.position_to_filename {
        let found = converted
            .iter()
            .any(|(file_name, _)| file_name.eq_ignore_ascii_case(name));
        if !found {
            warn!("install.inf slot {} references missing file {}", position, name);
        }
    }

    converted
        .into_iter()
        .map(|(file_name, result)| {
            let roles = scheme.roles_for(&file_name);
            let inf_position = scheme.positions_for(&file_name).first().copied();
            if inf_position.is_none() {
                debug!("{} is not part of the INF scheme", file_name);
            }
            MappedCursor {
                file_name,
                result,
                roles,
                inf_position,
            }
        })
        .collect()
}

fn assign_from_filenames(
    converted: Vec<(String, CursorResult)>,
    mapping: &CursorMapping,
) -> Vec<MappedCursor> {
    converted
        .into_iter()
        .map(|(file_name, result)| MappedCursor {
            roles: mapping.roles_for(&file_name),
            file_name,
            result,
            inf_position: None,
        })
        .collect()
}

fn stem(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn is_windows_cursor_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| matches!(ext.to_string_lossy().to_lowercase().as_str(), "cur" | "ani"))
        .unwrap_or(false)
}

fn is_inf_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("inf"))
        .unwrap_or(false)
}

/// Top level of a cursor folder, read into memory.
#[derive(Debug, Default)]
pub struct FolderListing {
    pub sources: Vec<CursorSource>,
    /// Scheme file, `install.inf` preferred over any other `.inf`.
    pub inf: Option<PathBuf>,
    /// Entries that could not be read, with the reason.
    pub unreadable: Vec<(String, String)>,
}

/// Reads every `.cur`/`.ani` file at the top level of `dir` and picks the
/// scheme INF. Entries that cannot be read are recorded, not fatal.
pub fn scan_cursor_dir(dir: &Path) -> FolderListing {
    let mut listing = FolderListing::default();
    let mut infs: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let name = e
                    .path()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| dir.display().to_string());
                warn!("Cannot scan {}: {}", name, e);
                listing.unreadable.push((name, e.to_string()));
                continue;
            }
        };
        // Symlinks are kept so a broken link shows up as unreadable.
        if entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();

        if is_windows_cursor_file(path) {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            match fs::read(path) {
                Ok(data) => listing.sources.push(CursorSource::new(file_name, data)),
                Err(e) => {
                    warn!("Skipping {}: cannot read it ({})", file_name, e);
                    listing.unreadable.push((file_name, e.to_string()));
                }
            }
        } else if is_inf_file(path) {
            infs.push(path.to_path_buf());
        }
    }

    listing.inf = infs
        .iter()
        .find(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().eq_ignore_ascii_case(INSTALL_INF))
                .unwrap_or(false)
        })
        .or_else(|| infs.first())
        .cloned();

    listing
}

/// Converts every cursor in `dir`, using its INF for roles when it has one.
/// Only a missing folder is an error; unreadable files end up in `skipped`.
pub fn convert_folder(
    dir: &Path,
    mapping: &CursorMapping,
    options: &ConversionOptions,
) -> Result<ConversionBatch> {
    if !dir.is_dir() {
        anyhow::bail!("Cursor folder not found: {}", dir.display());
    }

    let listing = scan_cursor_dir(dir);
    let scheme = listing.inf.as_deref().map(|path| {
        debug!("Using scheme file {}", path.display());
        parse_inf_file(path)
    });

    let mut batch = convert_sources(&listing.sources, scheme, mapping, options);
    let mut skipped = listing.unreadable;
    skipped.append(&mut batch.skipped);
    batch.skipped = skipped;
    Ok(batch)
}

/// One converted cursor as recorded in `cursors.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CursorSummary {
    pub name: String,
    pub source: String,
    pub sprite_sheet: String,
    pub width: u32,
    pub height: u32,
    pub hotspot_x: u32,
    pub hotspot_y: u32,
    pub frame_count: usize,
    pub frame_duration: f64,
    pub roles: Vec<CursorRole>,
    pub inf_position: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchemeSummary {
    pub scheme_name: Option<String>,
    pub role_source: RoleSource,
    pub cursors: Vec<CursorSummary>,
}

impl SchemeSummary {
    pub fn from_batch(batch: &ConversionBatch) -> Self {
        let cursors = batch
            .cursors
            .iter()
            .zip(sprite_sheet_file_names(&batch.cursors))
            .map(|(cursor, sprite_sheet)| CursorSummary {
                name: cursor.result.source_name.clone(),
                source: cursor.file_name.clone(),
                sprite_sheet,
                width: cursor.result.width,
                height: cursor.result.height,
                hotspot_x: cursor.result.hotspot_x,
                hotspot_y: cursor.result.hotspot_y,
                frame_count: cursor.result.frame_count,
                frame_duration: cursor.result.frame_duration,
                roles: cursor.roles.clone(),
                inf_position: cursor.inf_position,
            })
            .collect();

        Self {
            scheme_name: batch.inf_mapping.as_ref().and_then(|m| m.scheme_name.clone()),
            role_source: batch.role_source,
            cursors,
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        toml::from_str(&content).context("Invalid cursor summary")
    }
}

/// Output name for each cursor's sheet, in batch order. `<stem>.png` unless
/// another cursor shares the stem (`Busy.cur` next to `Busy.ani`), in which
/// case the source extension is kept: `Busy.cur.png`, `Busy.ani.png`.
/// Names are unique ignoring ASCII case.
pub fn sprite_sheet_file_names(cursors: &[MappedCursor]) -> Vec<String> {
    let mut stem_counts: HashMap<String, usize> = HashMap::new();
    for cursor in cursors {
        *stem_counts
            .entry(cursor.result.source_name.to_ascii_lowercase())
            .or_default() += 1;
    }

    let mut taken: HashSet<String> = HashSet::new();
    cursors
        .iter()
        .map(|cursor| {
            let stem = &cursor.result.source_name;
            let base = if stem_counts[&stem.to_ascii_lowercase()] > 1 {
                match Path::new(&cursor.file_name).extension() {
                    Some(ext) => format!("{}.{}", stem, ext.to_string_lossy().to_lowercase()),
                    None => stem.clone(),
                }
            } else {
                stem.clone()
            };

            let mut name = format!("{}.png", base);
            let mut n = 2;
            while !taken.insert(name.to_ascii_lowercase()) {
                name = format!("{}-{}.png", base, n);
                n += 1;
            }
            name
        })
        .collect()
}

/// Writes one PNG per cursor plus the `cursors.toml` summary.
pub fn write_batch(batch: &ConversionBatch, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output dir {}", out_dir.display()))?;

    let mut written = Vec::new();
    for (cursor, name) in batch.cursors.iter().zip(sprite_sheet_file_names(&batch.cursors)) {
        let path = out_dir.join(name);
        fs::write(&path, &cursor.result.sprite_sheet_png)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    let summary = SchemeSummary::from_batch(batch);
    let content = toml::to_string_pretty(&summary).context("Failed to serialize cursor summary")?;
    let summary_path = out_dir.join(SUMMARY_FILE_NAME);
    fs::write(&summary_path, content)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    written.push(summary_path);

    Ok(written)
}

/// Runs a full folder conversion as described by `config`.
pub fn run(config: &Config) -> Result<ConversionBatch> {
    let mapping = config.mapping()?;

    let batch = if config.thread_count > 0 && config.options.parallel {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.thread_count)
            .build()
            .context("Failed to build worker pool")?;
        pool.install(|| convert_folder(&config.input_dir, &mapping, &config.options))?
    } else {
        convert_folder(&config.input_dir, &mapping, &config.options)?
    };

    write_batch(&batch, &config.output_dir)?;
    Ok(batch)
}
