// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Set-valued field predicates.

use std::collections::BTreeSet;

use super::simple::order_of_magnitude;
use super::BlockKeys;

#[must_use]
pub fn whole_set(field: &BTreeSet<String>) -> BlockKeys {
    BlockKeys::from([format!("{:?}", field)])
}

#[must_use]
pub fn first_set_element(field: &BTreeSet<String>) -> BlockKeys {
    field.iter().next().cloned().map_or_else(BlockKeys::new, |v| BlockKeys::from([v]))
}

#[must_use]
pub fn last_set_element(field: &BTreeSet<String>) -> BlockKeys {
    field.iter().next_back().cloned().map_or_else(BlockKeys::new, |v| BlockKeys::from([v]))
}

#[must_use]
pub fn magnitude_of_cardinality(field: &BTreeSet<String>) -> BlockKeys {
    order_of_magnitude(field.len() as f64)
}

#[must_use]
pub fn common_set_element(field: &BTreeSet<String>) -> BlockKeys {
    field.clone()
}

#[cfg(test)]
mod should {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_first_and_last_set_element() {
        let s = set(&["banana", "apple", "cherry"]);
        assert_eq!(first_set_element(&s), BlockKeys::from(["apple".to_string()]));
        assert_eq!(last_set_element(&s), BlockKeys::from(["cherry".to_string()]));
    }

    #[test]
    fn test_magnitude_of_cardinality() {
        let s = set(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"]);
        assert_eq!(magnitude_of_cardinality(&s), BlockKeys::from(["1".to_string()]));
    }

    #[test]
    fn test_common_set_element_returns_every_element() {
        let s = set(&["a", "b"]);
        assert_eq!(common_set_element(&s), s);
    }

    #[test]
    fn test_empty_set_has_no_first_last() {
        let s: BTreeSet<String> = BTreeSet::new();
        assert_eq!(first_set_element(&s), BlockKeys::new());
        assert_eq!(last_set_element(&s), BlockKeys::new());
    }
}
