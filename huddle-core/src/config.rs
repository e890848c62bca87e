/// The configuration of the fan-out layer and room defaults
#[derive(Debug, Clone)]
pub struct Config {
    /// How many undelivered events a session may hold before further deliveries are dropped
    pub mailbox_capacity: usize,
    /// The capacity given to rooms created without an explicit one
    pub default_max_members: i64,
    /// The smallest capacity a room can be created with
    pub minimum_max_members: i64,
}

impl Config {
    /// Returns the capacity to use for a new room, falling back to the default
    pub fn max_members_or_default(&self, max_members: Option<i64>) -> i64 {
        max_members.unwrap_or(self.default_max_members)
    }

    /// Returns true if a room may be created with this capacity
    pub fn accepts_max_members(&self, max_members: i64) -> bool {
        max_members >= self.minimum_max_members
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // A few seconds of bursty chat for a session that stopped reading
            mailbox_capacity: 64,
            default_max_members: 10,
            // A room for one is not a group
            minimum_max_members: 2,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_max_members() {
        let config = Config::default();

        assert_eq!(config.max_members_or_default(None), 10, "default is used");
        assert_eq!(config.max_members_or_default(Some(3)), 3, "explicit is kept");

        assert!(!config.accepts_max_members(1), "1 is rejected");
        assert!(config.accepts_max_members(2), "2 is accepted");
    }
}
