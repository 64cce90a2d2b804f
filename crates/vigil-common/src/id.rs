use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static ID_GENERATOR: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Configures the Snowflake generator for this process.
///
/// `machine_id` and `node_id` are each in 0-31. Calling this is optional;
/// [`next_id`] falls back to (1, 1) when the generator was never configured.
pub fn init(machine_id: i32, node_id: i32) {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    *gen = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns a fresh Snowflake id in string form.
///
/// Used as the identity of checkables, notifications, and check results, so
/// ids are unique and roughly time-ordered across the process.
pub fn next_id() -> String {
    let mut gen = ID_GENERATOR.lock().unwrap_or_else(|p| p.into_inner());
    gen.get_or_insert_with(|| SnowflakeIdBucket::new(1, 1))
        .get_id()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_are_unique() {
        init(1, 1);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = next_id();
            assert!(!id.is_empty());
            assert!(seen.insert(id), "duplicate id generated");
        }
    }

    #[test]
    fn ids_parse_as_i64() {
        init(1, 1);
        let id = next_id();
        assert!(id.parse::<i64>().is_ok(), "not a valid i64: {id}");
    }
}
