use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{Result, WikilangsError};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `cache/en/20250101/models/vocabulary/en_vocabulary.jsonl` + `"bin"`
/// → `cache/en/20250101/models/vocabulary/en_vocabulary.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Lists the names of the directories directly contained in `dir`.
///
/// Returns names only (no paths), sorted.
pub(crate) fn list_dirs<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	let mut dirs = Vec::new();

	for entry in fs::read_dir(dir)? {
		let entry = entry?;
		if entry.file_type()?.is_dir() {
			dirs.push(entry.file_name().to_string_lossy().to_string());
		}
	}

	dirs.sort();
	Ok(dirs)
}

/// Lists every file below `dir`, recursively.
///
/// Paths are relative to `dir` and always use `/` as separator so they can be
/// compared with remote listings.
pub(crate) fn list_files_recursive<P: AsRef<Path>>(dir: P) -> io::Result<Vec<String>> {
	let mut files = Vec::new();
	let mut pending = vec![(dir.as_ref().to_path_buf(), String::new())];

	while let Some((current, prefix)) = pending.pop() {
		for entry in fs::read_dir(&current)? {
			let entry = entry?;
			let name = entry.file_name().to_string_lossy().to_string();
			let relative = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
			let file_type = entry.file_type()?;
			if file_type.is_dir() {
				pending.push((entry.path(), relative));
			} else if file_type.is_file() {
				files.push(relative);
			}
		}
	}

	files.sort();
	Ok(files)
}

/// Writes a file through a temporary sibling and renames it into place.
///
/// Readers never observe a partially written `path`: either the previous
/// content (or nothing) or the complete new content. When `write` fails the
/// temporary file is removed and `path` is left untouched.
pub(crate) fn write_atomic<P, F, E>(path: P, write: F) -> std::result::Result<u64, E>
where
	P: AsRef<Path>,
	F: FnOnce(&mut dyn Write) -> std::result::Result<u64, E>,
	E: From<io::Error>,
{
	let path = path.as_ref();
	let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
	fs::create_dir_all(parent_dir)?;

	let temp_file = NamedTempFile::new_in(parent_dir)?;
	let written = {
		let mut writer = BufWriter::new(temp_file.as_file());
		let written = write(&mut writer)?;
		writer.flush()?;
		written
	};
	temp_file.as_file().sync_all()?;

	temp_file.persist(path).map_err(|e| E::from(e.error))?;
	Ok(written)
}

/// Table that can be written to and restored from a postcard snapshot.
///
/// Decoding only checks the shape of the bytes, so a restored table must
/// also pass `check` before it is used.
pub(crate) trait Snapshot: Serialize + DeserializeOwned {
	/// Verifies the invariants the table relies on when queried.
	fn check(&self) -> std::result::Result<(), String>;
}

/// Loads a parsed table from its postcard snapshot, or builds it and writes
/// the snapshot for the next process.
///
/// - `source` is the artifact the table is parsed from; the snapshot lives
///   next to it with a `.bin` extension.
/// - A snapshot that fails to decode or to `check` is discarded and rebuilt.
/// - Failing to write the snapshot is not fatal.
pub(crate) fn load_snapshot_or_build<T, F>(source: &Path, enabled: bool, build: F) -> Result<T>
where
	T: Snapshot,
	F: FnOnce() -> Result<T>,
{
	if !enabled {
		return build();
	}

	let snapshot_path = build_output_path(source, "bin")
		.map_err(|e| WikilangsError::malformed(source, e.to_string()))?;

	if snapshot_path.exists() {
		match fs::read(&snapshot_path).map(|bytes| postcard::from_bytes::<T>(&bytes)) {
			Ok(Ok(table)) => match table.check() {
				Ok(()) => {
					debug!("Loaded snapshot {}", snapshot_path.display());
					return Ok(table);
				}
				Err(e) => warn!("Discarding inconsistent snapshot {}: {e}", snapshot_path.display()),
			},
			Ok(Err(e)) => warn!("Discarding corrupt snapshot {}: {e}", snapshot_path.display()),
			Err(e) => warn!("Cannot read snapshot {}: {e}", snapshot_path.display()),
		}
	}

	let table = build()?;

	match postcard::to_stdvec(&table) {
		Ok(bytes) => {
			let result = write_atomic::<_, _, io::Error>(&snapshot_path, |out| {
				out.write_all(&bytes)?;
				Ok(bytes.len() as u64)
			});
			if let Err(e) = result {
				warn!("Cannot write snapshot {}: {e}", snapshot_path.display());
			}
		}
		Err(e) => warn!("Cannot serialize snapshot for {}: {e}", source.display()),
	}

	Ok(table)
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Rows that must stay sorted.
	#[derive(Serialize, serde::Deserialize, Debug, PartialEq)]
	struct Sorted(Vec<u32>);

	impl Snapshot for Sorted {
		fn check(&self) -> std::result::Result<(), String> {
			if self.0.windows(2).all(|pair| pair[0] <= pair[1]) {
				Ok(())
			} else {
				Err("rows out of order".to_owned())
			}
		}
	}

	#[test]
	fn test_build_output_path_swaps_extension() {
		let out = build_output_path("cache/en/20250101/en_3gram_word.jsonl", "bin").unwrap();
		assert_eq!(out, PathBuf::from("cache/en/20250101/en_3gram_word.bin"));
	}

	#[test]
	fn test_list_files_recursive_uses_forward_slashes() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(dir.path().join("models/vocabulary")).unwrap();
		fs::write(dir.path().join("models/vocabulary/en_vocabulary.jsonl"), "x").unwrap();
		fs::write(dir.path().join("README.md"), "x").unwrap();

		let files = list_files_recursive(dir.path()).unwrap();
		assert_eq!(files, vec!["README.md".to_owned(), "models/vocabulary/en_vocabulary.jsonl".to_owned()]);
	}

	#[test]
	fn test_list_dirs_ignores_files() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir(dir.path().join("en")).unwrap();
		fs::create_dir(dir.path().join("ary")).unwrap();
		fs::write(dir.path().join("notes.txt"), "x").unwrap();

		assert_eq!(list_dirs(dir.path()).unwrap(), vec!["ary".to_owned(), "en".to_owned()]);
	}

	#[test]
	fn test_write_atomic_replaces_content() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("nested/out.txt");

		write_atomic::<_, _, io::Error>(&path, |out| {
			out.write_all(b"first")?;
			Ok(5)
		})
		.unwrap();
		write_atomic::<_, _, io::Error>(&path, |out| {
			out.write_all(b"second")?;
			Ok(6)
		})
		.unwrap();

		assert_eq!(fs::read_to_string(&path).unwrap(), "second");
		// Only the published file remains, no temporary leftovers.
		assert_eq!(list_files_recursive(dir.path()).unwrap(), vec!["nested/out.txt".to_owned()]);
	}

	#[test]
	fn test_snapshot_is_reused() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("table.jsonl");
		fs::write(&source, "{}").unwrap();

		let first = load_snapshot_or_build(&source, true, || Ok(Sorted(vec![1, 2, 3]))).unwrap();
		assert_eq!(first, Sorted(vec![1, 2, 3]));
		assert!(dir.path().join("table.bin").exists());

		let second: Sorted =
			load_snapshot_or_build(&source, true, || panic!("snapshot should have been used")).unwrap();
		assert_eq!(second, Sorted(vec![1, 2, 3]));
	}

	#[test]
	fn test_corrupt_snapshot_is_rebuilt() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("table.jsonl");
		fs::write(dir.path().join("table.bin"), [0xff, 0xff, 0xff]).unwrap();

		let table = load_snapshot_or_build(&source, true, || Ok(Sorted(vec![7]))).unwrap();
		assert_eq!(table, Sorted(vec![7]));
	}

	#[test]
	fn test_inconsistent_snapshot_is_rebuilt() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("table.jsonl");
		// Decodes fine but breaks the ordering invariant.
		fs::write(dir.path().join("table.bin"), postcard::to_stdvec(&Sorted(vec![3, 1])).unwrap()).unwrap();

		let table = load_snapshot_or_build(&source, true, || Ok(Sorted(vec![1, 3]))).unwrap();
		assert_eq!(table, Sorted(vec![1, 3]));

		// The rebuilt table replaced the bad snapshot.
		let reread: Sorted = postcard::from_bytes(&fs::read(dir.path().join("table.bin")).unwrap()).unwrap();
		assert_eq!(reread, Sorted(vec![1, 3]));
	}
}
