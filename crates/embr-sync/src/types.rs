/// Outcome of pushing one set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PushResult {
    pub set: String,
    pub objects_sent: usize,
    pub bytes_sent: u64,
    /// Remote keys removed because the local set no longer has them.
    pub pruned: Vec<String>,
}

/// Outcome of pulling one set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PullResult {
    pub set: String,
    pub objects_received: usize,
    /// Objects listed remotely that were already stored locally.
    pub already_present: usize,
    pub bytes_received: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PushOptions {
    /// Delete remote documents that are not in the local set.
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_empty() {
        let push = PushResult::default();
        assert_eq!(push.objects_sent, 0);
        assert!(push.pruned.is_empty());
        assert_eq!(PullResult::default().bytes_received, 0);
        assert!(!PushOptions::default().force);
    }
}
