// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Functions to glob files.

use std::path::{Path, PathBuf};

use glob::glob;
use log::trace;
use thiserror::Error;

/// Given a glob pattern, get all of the matches from the filesystem (sorted
/// alphabetically).
pub fn get_all_matches_from_glob(g: &str) -> Result<Vec<PathBuf>, GlobError> {
    let mut entries = vec![];
    for entry in glob(g)? {
        match entry {
            Ok(e) => entries.push(e),
            Err(e) => return Err(GlobError::GlobCrate(e)),
        }
    }
    Ok(entries)
}

/// The same as `get_all_matches_from_glob`, but only a single result is
/// expected to be returned from the glob match. If there are no results, or
/// more than one, an error is returned.
pub fn get_single_match_from_glob(g: &str) -> Result<PathBuf, GlobError> {
    let entries = get_all_matches_from_glob(g)?;
    match entries.as_slice() {
        [] => Err(GlobError::NoMatches {
            glob: g.to_string(),
        }),
        [e] => Ok(e.clone()),
        _ => Err(GlobError::MoreThanOneMatch {
            glob: g.to_string(),
        }),
    }
}

/// Turn a list of paths and/or glob patterns into paths. The order of the
/// arguments is kept; the matches of each pattern are sorted. Arguments that
/// name an existing file are used as-is, even if they contain glob
/// metacharacters.
pub fn expand_path_args<S: AsRef<str>>(args: &[S]) -> Result<Vec<PathBuf>, GlobError> {
    let mut paths = vec![];
    for arg in args {
        let arg = arg.as_ref();
        if Path::new(arg).exists() {
            paths.push(PathBuf::from(arg));
            continue;
        }
        let matches = get_all_matches_from_glob(arg)?;
        if matches.is_empty() {
            return Err(GlobError::NoMatches {
                glob: arg.to_string(),
            });
        }
        trace!("'{arg}' matched {} files", matches.len());
        paths.extend(matches);
    }
    Ok(paths)
}

/// Use `arg` as a path if it exists, otherwise treat it as a glob that must
/// match exactly one file.
pub fn resolve_single_path(arg: &Path) -> Result<PathBuf, GlobError> {
    if arg.exists() {
        return Ok(arg.to_path_buf());
    }
    get_single_match_from_glob(&arg.display().to_string())
}

#[derive(Error, Debug)]
/// Error type associated with glob helper functions.
pub enum GlobError {
    #[error("No glob matches were found for {glob}")]
    NoMatches { glob: String },

    #[error("More than one glob matches were found for {glob}; we require only one match")]
    MoreThanOneMatch { glob: String },

    #[error(transparent)]
    GlobCrate(#[from] glob::GlobError),

    #[error(transparent)]
    PatternError(#[from] glob::PatternError),
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use tempfile::TempDir;

    use super::*;

    fn touch(dir: &Path, names: &[&str]) {
        for name in names {
            File::create(dir.join(name)).unwrap();
        }
    }

    #[test]
    fn glob_cargo() {
        let entries = get_all_matches_from_glob("./Cargo*").unwrap();
        assert!(&entries.contains(&PathBuf::from("Cargo.toml")));
    }

    #[test]
    fn test_single_glob() {
        let result = get_single_match_from_glob("src/io/glob*");
        assert!(result.is_ok(), "{:?}", result.err().unwrap());
        assert_eq!(result.unwrap(), PathBuf::from("src/io/glob.rs"));

        let glob = "Cargo.t??l";
        assert_eq!(
            get_single_match_from_glob(glob).unwrap(),
            PathBuf::from("Cargo.toml")
        );

        // Matches "mod.rs" and "tests.rs" (and others).
        assert!(matches!(
            get_single_match_from_glob("src/archive/*.rs"),
            Err(GlobError::MoreThanOneMatch { .. })
        ));
        assert!(matches!(
            get_single_match_from_glob("src/does_not_exist*"),
            Err(GlobError::NoMatches { .. })
        ));
    }

    #[test]
    fn test_expand_path_args_keeps_argument_order() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let dir = tmp_dir.path();
        touch(dir, &["b1.json", "b2.json", "a.json", "c[1].json"]);

        let args = vec![
            dir.join("b*.json").display().to_string(),
            dir.join("a.json").display().to_string(),
            // This is a valid glob which wouldn't match itself.
            dir.join("c[1].json").display().to_string(),
        ];
        let paths = expand_path_args(&args).unwrap();
        assert_eq!(
            paths,
            vec![
                dir.join("b1.json"),
                dir.join("b2.json"),
                dir.join("a.json"),
                dir.join("c[1].json"),
            ]
        );

        let args = [dir.join("z*.json").display().to_string()];
        assert!(matches!(
            expand_path_args(&args),
            Err(GlobError::NoMatches { .. })
        ));

        let none: [&str; 0] = [];
        assert!(expand_path_args(&none).unwrap().is_empty());
    }

    #[test]
    fn test_resolve_single_path() {
        let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
        let dir = tmp_dir.path();
        touch(dir, &["template.json"]);

        assert_eq!(
            resolve_single_path(&dir.join("template.json")).unwrap(),
            dir.join("template.json")
        );
        assert_eq!(
            resolve_single_path(&dir.join("temp*")).unwrap(),
            dir.join("template.json")
        );
    }
}
