use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::Path;

use atlas_format::{Manifest, decode_manifest, read_sheet_header};
use sheet_cache::{SheetDescriptor, SheetIndex};
use tracing::debug;

use crate::config::{AtlasConfig, is_sheet_file};
use crate::error::AtlasInitError;
use crate::sprite::Sprite;

/// Everything startup reads from disk before the cache is started.
#[derive(Debug)]
pub(crate) struct DiscoveredAtlas {
    pub(crate) version: u8,
    pub(crate) sprites: Vec<Sprite>,
    pub(crate) sprite_names: HashMap<String, usize>,
    pub(crate) sheets: Vec<SheetDescriptor>,
}

pub(crate) fn discover(config: &AtlasConfig) -> Result<DiscoveredAtlas, AtlasInitError> {
    let manifest_path = config.manifest_path();
    let manifest = read_manifest(&manifest_path)?;
    let sheets = discover_sheets(&config.atlas_dir(), manifest.sheet_count)?;

    let mut sprites = Vec::with_capacity(manifest.sprites.len());
    let mut sprite_names = HashMap::with_capacity(manifest.sprites.len());
    for record in manifest.sprites {
        if let Some(fragment) = record
            .fragments
            .iter()
            .find(|fragment| fragment.sheet_index >= manifest.sheet_count)
        {
            return Err(AtlasInitError::FragmentSheetOutOfRange {
                sprite: record.name,
                sheet: fragment.sheet_index,
                sheet_count: manifest.sheet_count,
            });
        }
        if sprite_names.contains_key(&record.name) {
            return Err(AtlasInitError::DuplicateSpriteName { name: record.name });
        }
        debug!(
            sprite = %record.name,
            width = record.width,
            height = record.height,
            fragments = record.fragments.len(),
            "sprite decoded"
        );
        sprite_names.insert(record.name.clone(), sprites.len());
        sprites.push(Sprite::from(record));
    }

    Ok(DiscoveredAtlas {
        version: manifest.version,
        sprites,
        sprite_names,
        sheets,
    })
}

fn read_manifest(path: &Path) -> Result<Manifest, AtlasInitError> {
    let file = File::open(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => AtlasInitError::MissingManifest {
            path: path.to_path_buf(),
        },
        _ => AtlasInitError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    decode_manifest(&mut BufReader::new(file)).map_err(|source| AtlasInitError::Format {
        path: path.to_path_buf(),
        source,
    })
}

/// Scans `atlas_dir` for sheet files and orders them by their header index.
///
/// Files with the sheet extension but a foreign magic are skipped. Every index
/// below `sheet_count` must be claimed by exactly one file.
fn discover_sheets(
    atlas_dir: &Path,
    sheet_count: u32,
) -> Result<Vec<SheetDescriptor>, AtlasInitError> {
    let io_error = |source| AtlasInitError::Io {
        path: atlas_dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(atlas_dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        if is_sheet_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut found: BTreeMap<u32, SheetDescriptor> = BTreeMap::new();
    for path in paths {
        let Some(descriptor) = read_descriptor(&path)? else {
            continue;
        };
        let raw = descriptor.index.raw();
        if raw >= sheet_count {
            return Err(AtlasInitError::SheetIndexOutOfRange {
                path,
                index: raw,
                sheet_count,
            });
        }
        match found.entry(raw) {
            Entry::Occupied(existing) => {
                return Err(AtlasInitError::DuplicateSheet {
                    index: descriptor.index,
                    first: existing.get().locator.clone(),
                    second: path,
                });
            }
            Entry::Vacant(slot) => {
                debug!(
                    sheet = raw,
                    byte_size = descriptor.byte_size,
                    path = %path.display(),
                    "sheet discovered"
                );
                slot.insert(descriptor);
            }
        }
    }

    // The manifest count is untrusted; only discovered files are allocated.
    let mut sheets = Vec::with_capacity(found.len());
    for raw in 0..sheet_count {
        let Some(descriptor) = found.remove(&raw) else {
            return Err(AtlasInitError::MissingSheet {
                index: SheetIndex::new(raw),
                dir: atlas_dir.to_path_buf(),
            });
        };
        sheets.push(descriptor);
    }
    Ok(sheets)
}

fn read_descriptor(path: &Path) -> Result<Option<SheetDescriptor>, AtlasInitError> {
    let file = File::open(path).map_err(|source| AtlasInitError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match read_sheet_header(&mut BufReader::new(file)) {
        Ok(header) => Ok(Some(SheetDescriptor {
            index: SheetIndex::new(header.index),
            byte_size: u64::from(header.byte_size),
            locator: path.to_path_buf(),
        })),
        Err(error) if error.is_bad_magic() => {
            debug!(path = %path.display(), "skipping file without sheet magic");
            Ok(None)
        }
        Err(source) => Err(AtlasInitError::Format {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use atlas_format::{FragmentRecord, SheetHeader, SpriteRecord};

    use super::*;

    fn write_manifest(atlas_dir: &Path, sheet_count: u32, sprites: Vec<SpriteRecord>) {
        let manifest = Manifest {
            version: 3,
            sheet_count,
            sprites,
        };
        let mut file = File::create(atlas_dir.join("Meta.atlas")).unwrap();
        manifest.encode(&mut file).unwrap();
    }

    fn write_sheet(atlas_dir: &Path, file_name: &str, index: u32, byte_size: u32) {
        let mut file = File::create(atlas_dir.join(file_name)).unwrap();
        SheetHeader { index, byte_size }.encode(&mut file).unwrap();
        file.write_all(b"payload").unwrap();
    }

    fn sprite(name: &str, sheets: &[u32]) -> SpriteRecord {
        SpriteRecord {
            name: name.to_owned(),
            width: 16,
            height: 16,
            fragments: sheets
                .iter()
                .map(|&sheet| FragmentRecord::new(0.0, 0.0, sheet, 0, 16, 16))
                .collect(),
        }
    }

    fn atlas_root() -> (tempfile::TempDir, AtlasConfig) {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("Atlas")).unwrap();
        let config = AtlasConfig::new(root.path());
        (root, config)
    }

    #[test]
    fn sheets_are_ordered_by_header_index_not_file_name() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 2, vec![sprite("a", &[0, 1])]);
        write_sheet(&atlas_dir, "a.kyxsheet", 1, 500);
        write_sheet(&atlas_dir, "b.kyxsheet", 0, 600);

        let atlas = discover(&config).unwrap();

        assert_eq!(atlas.version, 3);
        assert_eq!(atlas.sheets.len(), 2);
        assert_eq!(atlas.sheets[0].byte_size, 600);
        assert_eq!(atlas.sheets[0].locator, atlas_dir.join("b.kyxsheet"));
        assert_eq!(atlas.sheets[1].index, SheetIndex::new(1));
        assert_eq!(atlas.sprite_names["a"], 0);
    }

    #[test]
    fn files_without_sheet_magic_or_extension_are_ignored() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 1, vec![]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);
        fs::write(atlas_dir.join("junk.kyxsheet"), b"NOTSHEET0000000000").unwrap();
        write_sheet(&atlas_dir, "copy.png", 0, 10);

        let atlas = discover(&config).unwrap();
        assert_eq!(atlas.sheets.len(), 1);
    }

    #[test]
    fn missing_manifest_is_reported() {
        let (_root, config) = atlas_root();
        let error = discover(&config).unwrap_err();
        assert!(matches!(error, AtlasInitError::MissingManifest { .. }));
    }

    #[test]
    fn bad_manifest_magic_is_a_format_error() {
        let (_root, config) = atlas_root();
        fs::write(config.manifest_path(), b"NOTATLAS\0\0\0\0\0\0\0\0\0").unwrap();

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::Format { ref source, .. } if source.is_bad_magic()
        ));
    }

    #[test]
    fn missing_sheet_index_fails_startup() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 2, vec![sprite("a", &[1])]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::MissingSheet { index, .. } if index == SheetIndex::new(1)
        ));
    }

    #[test]
    fn huge_manifest_sheet_count_fails_without_preallocating() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, u32::MAX, vec![]);
        assert_eq!(fs::metadata(config.manifest_path()).unwrap().len(), 17);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::MissingSheet { index, .. } if index == SheetIndex::new(0)
        ));
    }

    #[test]
    fn huge_manifest_sheet_count_reports_first_gap_after_present_sheets() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, u32::MAX, vec![]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);
        write_sheet(&atlas_dir, "1.kyxsheet", 1, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::MissingSheet { index, .. } if index == SheetIndex::new(2)
        ));
    }

    #[test]
    fn duplicate_sheet_index_fails_startup() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 1, vec![]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);
        write_sheet(&atlas_dir, "1.kyxsheet", 0, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(error, AtlasInitError::DuplicateSheet { .. }));
    }

    #[test]
    fn sheet_index_beyond_manifest_count_fails_startup() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 1, vec![]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);
        write_sheet(&atlas_dir, "7.kyxsheet", 7, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::SheetIndexOutOfRange { index: 7, sheet_count: 1, .. }
        ));
    }

    #[test]
    fn fragment_referencing_unknown_sheet_fails_startup() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 1, vec![sprite("a", &[0, 4])]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::FragmentSheetOutOfRange { sheet: 4, .. }
        ));
    }

    #[test]
    fn duplicate_sprite_names_fail_startup() {
        let (_root, config) = atlas_root();
        let atlas_dir = config.atlas_dir();
        write_manifest(&atlas_dir, 1, vec![sprite("a", &[0]), sprite("a", &[0])]);
        write_sheet(&atlas_dir, "0.kyxsheet", 0, 10);

        let error = discover(&config).unwrap_err();
        assert!(matches!(
            error,
            AtlasInitError::DuplicateSpriteName { ref name } if name == "a"
        ));
    }
}
