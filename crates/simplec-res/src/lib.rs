//! simplec-res - Import resolution.
//!
//! Given an entry file, produces one merged [`Program`] by traversing
//! `import` declarations depth-first. Declarations land in post-order:
//! everything a file imports appears before the file's own
//! declarations, and imported files' top-level script statements run
//! before the entry file's.
//!
//! Reserved standard-library imports are kept in the merged program as
//! capability flags and never touch the filesystem. Everything else
//! resolves to a canonical file identity through three rules, in order:
//! absolute path, explicit relative path (leading `.` or containing a
//! separator), and bare-name lookup in a recursive index of `*.simple`
//! files under the project root.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use simplec_par::{parse_program_str, Decl, Program};
use simplec_util::{is_reserved_import_path, Diag, DiagResult};

/// Index of `*.simple` files under the project root, keyed by filename.
type FileIndex = IndexMap<String, Vec<PathBuf>>;

/// Loads and merges a program starting from `entry_path`.
///
/// The project root for bare-name imports is the entry file's
/// directory.
pub fn load_program(entry_path: &Path) -> DiagResult<Program> {
    let root = project_root_for(entry_path);
    load_program_with_root(entry_path, &root)
}

/// Loads and merges a program with an explicit project root.
pub fn load_program_with_root(entry_path: &Path, project_root: &Path) -> DiagResult<Program> {
    let index = build_file_index(project_root).ok_or_else(|| {
        Diag::message(format!(
            "failed to enumerate .simple files under project root: {}",
            project_root.display()
        ))
    })?;

    let mut resolver = Resolver {
        index,
        visiting: FxHashSet::default(),
        visited: FxHashSet::default(),
    };
    let mut program = Program::default();
    resolver.append_file(entry_path, &mut program)?;
    Ok(program)
}

fn project_root_for(entry_path: &Path) -> PathBuf {
    let canonical = canonicalize_lossy(entry_path);
    canonical
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// `fs::canonicalize` with a fallback to an absolute path so missing
/// files still get a stable identity for diagnostics.
fn canonicalize_lossy(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

fn build_file_index(project_root: &Path) -> Option<FileIndex> {
    let mut index = FileIndex::default();
    let mut pending = vec![project_root.to_path_buf()];
    if !project_root.is_dir() {
        return None;
    }
    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map_or(false, |ext| ext == "simple") {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    index
                        .entry(name.to_string())
                        .or_default()
                        .push(canonicalize_lossy(&path));
                }
            }
        }
    }
    Some(index)
}

struct Resolver {
    index: FileIndex,
    visiting: FxHashSet<String>,
    visited: FxHashSet<String>,
}

impl Resolver {
    /// Parses one file, recurses into its local imports, then appends
    /// its own declarations and script statements.
    fn append_file(&mut self, file_path: &Path, out: &mut Program) -> DiagResult<()> {
        let canonical = canonicalize_lossy(file_path);
        let key = canonical.to_string_lossy().into_owned();
        if self.visited.contains(&key) {
            return Ok(());
        }
        if !self.visiting.insert(key.clone()) {
            return Err(Diag::message(format!("cyclic import detected: {}", key)));
        }

        let result = self.append_file_inner(&canonical, &key, out);
        self.visiting.remove(&key);
        if result.is_ok() {
            self.visited.insert(key);
        }
        result
    }

    fn append_file_inner(
        &mut self,
        canonical: &Path,
        key: &str,
        out: &mut Program,
    ) -> DiagResult<()> {
        let text = fs::read_to_string(canonical)
            .map_err(|err| Diag::message(format!("failed to read {}: {}", key, err)))?;
        let program = parse_program_str(&text)
            .map_err(|diag| Diag::new(diag.pos, format!("{}: {}", key, diag.message)))?;

        let base_dir = canonical.parent().unwrap_or_else(|| Path::new("."));
        for decl in &program.decls {
            let Decl::Import(import) = decl else {
                continue;
            };
            if is_reserved_import_path(&import.path) {
                continue;
            }
            let import_file = self.resolve_import_path(base_dir, &import.path)?;
            self.append_file(&import_file, out)?;
        }

        for decl in program.decls {
            if matches!(&decl, Decl::Import(import) if !is_reserved_import_path(&import.path)) {
                continue;
            }
            out.decls.push(decl);
        }
        out.top_level_stmts.extend(program.top_level_stmts);
        Ok(())
    }

    /// Absolute / explicit-relative / project-root bare-name lookup.
    fn resolve_import_path(&self, base_dir: &Path, import_path: &str) -> DiagResult<PathBuf> {
        let raw = Path::new(import_path);
        let has_separator = import_path.contains('/') || import_path.contains('\\');
        let explicit_relative =
            raw.is_relative() && (import_path.starts_with('.') || has_separator);

        if raw.is_absolute() {
            if raw.exists() {
                return Ok(canonicalize_lossy(raw));
            }
            let with_ext = raw.with_extension("simple");
            if raw.extension().is_none() && with_ext.exists() {
                return Ok(canonicalize_lossy(&with_ext));
            }
        } else if explicit_relative {
            let candidate = base_dir.join(raw);
            if candidate.exists() {
                return Ok(canonicalize_lossy(&candidate));
            }
            if raw.extension().is_none() {
                let with_ext = base_dir.join(format!("{}.simple", import_path));
                if with_ext.exists() {
                    return Ok(canonicalize_lossy(&with_ext));
                }
            }
        } else {
            return self.resolve_bare_import(import_path);
        }
        Err(Diag::message(format!(
            "unsupported import path: {}",
            import_path
        )))
    }

    fn resolve_bare_import(&self, import_path: &str) -> DiagResult<PathBuf> {
        let target = if import_path.ends_with(".simple") {
            import_path.to_string()
        } else {
            format!("{}.simple", import_path)
        };
        let matches = match self.index.get(&target) {
            Some(matches) if !matches.is_empty() => matches,
            _ => {
                return Err(Diag::message(format!(
                    "import not found in project root: {}",
                    import_path
                )));
            }
        };
        if matches.len() > 1 {
            let mut names: Vec<String> = matches
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            names.sort();
            let shown = names.len().min(5);
            let mut details = names[..shown].join(", ");
            if names.len() > shown {
                details.push_str(", ...");
            }
            return Err(Diag::message(format!(
                "ambiguous import path '{}' matched: {}",
                import_path, details
            )));
        }
        Ok(matches[0].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_merges_imports_in_post_order() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "util.simple",
            "helper : i32 () { return 7; }\n",
        );
        let entry = write(
            tmp.path(),
            "main.simple",
            "import util\nmain : i32 () { return helper(); }\n",
        );

        let program = load_program(&entry).unwrap();
        let names: Vec<&str> = program
            .decls
            .iter()
            .filter_map(|d| match d {
                Decl::Function(f) => Some(f.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["helper", "main"]);
    }

    #[test]
    fn test_imported_script_statements_come_first() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "setup.simple", "x : i32 = 1;\nx = 2;\n");
        let entry = write(tmp.path(), "main.simple", "import setup\nx = 3;\n");

        let program = load_program(&entry).unwrap();
        // setup's `x = 2` precedes main's `x = 3`.
        assert_eq!(program.top_level_stmts.len(), 2);
    }

    #[test]
    fn test_visited_files_merge_once() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "shared.simple", "common : i32 () { return 1; }\n");
        write(tmp.path(), "a.simple", "import shared\na : i32 () { return 1; }\n");
        write(tmp.path(), "b.simple", "import shared\nb : i32 () { return 2; }\n");
        let entry = write(
            tmp.path(),
            "main.simple",
            "import a\nimport b\nmain : i32 () { return 0; }\n",
        );

        let program = load_program(&entry).unwrap();
        let shared_count = program
            .decls
            .iter()
            .filter(|d| matches!(d, Decl::Function(f) if f.name == "common"))
            .count();
        assert_eq!(shared_count, 1);
    }

    #[test]
    fn test_cyclic_import_detected() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.simple", "import b\na : i32 () { return 1; }\n");
        let entry = write(tmp.path(), "b.simple", "import a\nb : i32 () { return 2; }\n");

        let err = load_program(&entry).unwrap_err();
        assert!(
            err.message.contains("cyclic import detected: "),
            "{}",
            err.message
        );
        assert!(err.message.contains(".simple"));
    }

    #[test]
    fn test_missing_import_reports_project_root() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = write(tmp.path(), "main.simple", "import nothere\n");

        let err = load_program(&entry).unwrap_err();
        assert!(
            err.message.contains("import not found in project root: nothere"),
            "{}",
            err.message
        );
    }

    #[test]
    fn test_ambiguous_import_lists_matches_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "x/util.simple", "a : i32 () { return 1; }\n");
        write(tmp.path(), "y/util.simple", "b : i32 () { return 2; }\n");
        let entry = write(tmp.path(), "main.simple", "import util\n");

        let err = load_program(&entry).unwrap_err();
        assert!(
            err.message.contains("ambiguous import path 'util' matched: "),
            "{}",
            err.message
        );
        let list = err.message.split("matched: ").nth(1).unwrap();
        let items: Vec<&str> = list.split(", ").collect();
        assert_eq!(items.len(), 2);
        let mut sorted = items.clone();
        sorted.sort();
        assert_eq!(items, sorted);
    }

    #[test]
    fn test_relative_import_in_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "sub/leaf.simple", "leaf : i32 () { return 3; }\n");
        let entry = write(
            tmp.path(),
            "main.simple",
            "import ./sub/leaf\nmain : i32 () { return leaf(); }\n",
        );

        let program = load_program(&entry).unwrap();
        assert_eq!(program.decls.len(), 2);
    }

    #[test]
    fn test_reserved_imports_are_kept_not_loaded() {
        let tmp = tempfile::tempdir().unwrap();
        let entry = write(
            tmp.path(),
            "main.simple",
            "import \"IO\"\nmain : void () { IO.println(1); }\n",
        );

        let program = load_program(&entry).unwrap();
        assert!(program
            .decls
            .iter()
            .any(|d| matches!(d, Decl::Import(i) if i.path == "IO")));
    }

    #[test]
    fn test_resolving_visited_file_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "dep.simple", "d : i32 () { return 1; }\n");
        let entry = write(
            tmp.path(),
            "main.simple",
            "import dep\nimport dep\nmain : i32 () { return d(); }\n",
        );

        let program = load_program(&entry).unwrap();
        let count = program
            .decls
            .iter()
            .filter(|d| matches!(d, Decl::Function(f) if f.name == "d"))
            .count();
        assert_eq!(count, 1);
    }
}
