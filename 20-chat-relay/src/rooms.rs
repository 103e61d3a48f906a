use std::collections::BTreeSet;

use crate::message::RoomCreation;

/// Names of every room that sessions may join. Rooms are never removed.
#[derive(Debug)]
pub struct RoomDirectory {
    rooms: BTreeSet<String>,
    default_room: String,
}

impl RoomDirectory {
    /// Creates a directory that already contains `default_room`.
    pub fn new(default_room: &str) -> Self {
        let mut rooms = BTreeSet::new();
        rooms.insert(default_room.to_string());
        Self {
            rooms,
            default_room: default_room.to_string(),
        }
    }

    pub fn create(&mut self, name: &str) -> RoomCreation {
        if self.rooms.insert(name.to_string()) {
            RoomCreation::Created
        } else {
            RoomCreation::AlreadyExists
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.rooms.contains(name)
    }

    pub fn default_room(&self) -> &str {
        &self.default_room
    }

    /// Room names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.rooms.iter().cloned().collect()
    }
}
