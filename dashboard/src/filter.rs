use crate::model::LogRow;

/// Room and device constraints applied to a log query. Unset fields place no
/// constraint; set fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Matched case-insensitively against the device's room.
    pub room: Option<String>,
    pub device_ids: Vec<i64>,
}

impl LogFilter {
    pub fn matches(&self, row: &LogRow) -> bool {
        self.matches_device(row.device_id, row.room.as_deref())
    }

    pub fn matches_device(&self, device_id: i64, room: Option<&str>) -> bool {
        if let Some(wanted) = &self.room {
            let same_room = room.is_some_and(|room| room.to_lowercase() == wanted.to_lowercase());
            if !same_room {
                return false;
            }
        }

        self.device_ids.is_empty() || self.device_ids.contains(&device_id)
    }
}
