#![forbid(unsafe_code)]

pub mod ids {
    /// Stable caller identity. Every piece of state belongs to exactly one
    /// owner, and the id doubles as a directory name on disk, so the
    /// accepted alphabet is deliberately narrow.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct OwnerId(String);

    impl OwnerId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, OwnerIdError> {
            let value = value.into();
            validate_owner_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum OwnerIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl std::fmt::Display for OwnerIdError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Self::Empty => write!(f, "owner id must not be empty"),
                Self::TooLong => write!(f, "owner id is too long"),
                Self::InvalidFirstChar => {
                    write!(f, "owner id must start with an ascii alphanumeric")
                }
                Self::InvalidChar { ch, index } => {
                    write!(f, "owner id has invalid char {ch:?} at index {index}")
                }
            }
        }
    }

    impl std::error::Error for OwnerIdError {}

    fn validate_owner_id(value: &str) -> Result<(), OwnerIdError> {
        if value.is_empty() {
            return Err(OwnerIdError::Empty);
        }
        if value.len() > 128 {
            return Err(OwnerIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(OwnerIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(OwnerIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(OwnerIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    /// Job lifecycle: pending -> processing -> {completed | pending(retry) | failed}.
    /// `Completed` and `Failed` are terminal.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum JobState {
        Pending,
        Processing,
        Completed,
        Failed,
    }

    impl JobState {
        pub fn as_str(self) -> &'static str {
            match self {
                JobState::Pending => "pending",
                JobState::Processing => "processing",
                JobState::Completed => "completed",
                JobState::Failed => "failed",
            }
        }

        pub fn parse(value: &str) -> Option<Self> {
            match value {
                "pending" => Some(JobState::Pending),
                "processing" => Some(JobState::Processing),
                "completed" => Some(JobState::Completed),
                "failed" => Some(JobState::Failed),
                _ => None,
            }
        }

        pub fn is_terminal(self) -> bool {
            matches!(self, JobState::Completed | JobState::Failed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ids::{OwnerId, OwnerIdError};
    use super::model::JobState;

    #[test]
    fn owner_id_accepts_reasonable_identities() {
        for candidate in ["alice", "caller-42", "a.b_c-d", "0xdeadbeef"] {
            assert!(OwnerId::try_new(candidate).is_ok(), "rejected {candidate}");
        }
    }

    #[test]
    fn owner_id_rejects_path_like_input() {
        assert_eq!(OwnerId::try_new(""), Err(OwnerIdError::Empty));
        assert_eq!(OwnerId::try_new(".."), Err(OwnerIdError::InvalidFirstChar));
        assert!(matches!(
            OwnerId::try_new("a/b"),
            Err(OwnerIdError::InvalidChar { ch: '/', .. })
        ));
        assert!(OwnerId::try_new("x".repeat(129)).is_err());
    }

    #[test]
    fn job_state_round_trips() {
        for state in [
            JobState::Pending,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("queued"), None);
        assert!(JobState::Completed.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }
}
