//! Station rotation: an ordered list of NOAA station ids and a cursor.

use serde::Serialize;

/// One monitoring site, as selected by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Station {
    pub id: u32,
    pub rotation_index: usize,
}

#[derive(Debug)]
pub struct StationRegistry {
    ids: Vec<u32>,
    cursor: usize,
}

impl StationRegistry {
    /// Panics if `ids` is empty; `Config::validate` rejects that earlier.
    pub fn new(ids: Vec<u32>) -> Self {
        assert!(!ids.is_empty(), "station list must not be empty");
        Self { ids, cursor: 0 }
    }

    pub fn current(&self) -> Station {
        Station {
            id: self.ids[self.cursor],
            rotation_index: self.cursor,
        }
    }

    /// Move to the next station, wrapping to the first past the end.
    pub fn advance(&mut self) -> Station {
        self.cursor = (self.cursor + 1) % self.ids.len();
        self.current()
    }
}
