// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::str::FromStr;

use super::{printers::block_symbols, ArgFileTypes, ARG_FILE_TYPES_COMMA_SEPARATED};

#[test]
fn test_arg_file_types() {
    assert_eq!(ARG_FILE_TYPES_COMMA_SEPARATED.as_str(), "toml, json");
    assert!(matches!(ArgFileTypes::from_str("toml"), Ok(ArgFileTypes::Toml)));
    assert!(matches!(ArgFileTypes::from_str("json"), Ok(ArgFileTypes::Json)));
    assert!(ArgFileTypes::from_str("yaml").is_err());
}

#[test]
fn test_block_symbols() {
    // One line on its own closes the tree.
    assert_eq!(block_symbols(&[1]), vec!['└']);
    // Lines after the first in a block hang off the vertical.
    assert_eq!(block_symbols(&[1, 3]), vec!['├', '├', '│', '│']);
    assert_eq!(block_symbols(&[2, 1]), vec!['├', '│', '└']);
}
