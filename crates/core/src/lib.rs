#![forbid(unsafe_code)]

pub mod ids {
    /// Primary key of a sequence document.
    ///
    /// Only emptiness is rejected; naming policy belongs to the caller.
    #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct SequenceName(String);

    impl SequenceName {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, SequenceNameError> {
            let value = value.into();
            if value.is_empty() {
                return Err(SequenceNameError::Empty);
            }
            Ok(Self(value))
        }
    }

    impl std::fmt::Display for SequenceName {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum SequenceNameError {
        Empty,
    }

    pub const DEFAULT_COLLECTION: &str = "sequence";

    /// Name of the table (collection) that holds sequence documents.
    ///
    /// It is spliced into SQL text, so it is restricted to a plain identifier.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct CollectionName(String);

    impl CollectionName {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, CollectionNameError> {
            let value = value.into();
            validate_collection_name(&value)?;
            Ok(Self(value))
        }
    }

    impl Default for CollectionName {
        fn default() -> Self {
            Self(DEFAULT_COLLECTION.to_string())
        }
    }

    impl std::fmt::Display for CollectionName {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(&self.0)
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum CollectionNameError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    fn validate_collection_name(value: &str) -> Result<(), CollectionNameError> {
        if value.is_empty() {
            return Err(CollectionNameError::Empty);
        }
        if value.len() > 64 {
            return Err(CollectionNameError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(CollectionNameError::Empty);
        };
        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(CollectionNameError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate().skip(1) {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                continue;
            }
            return Err(CollectionNameError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod model {
    use crate::ids::SequenceName;

    /// A named, persisted counter as the store returns it.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct Sequence {
        pub name: SequenceName,
        pub value: i64,
    }

    /// Field-level update applied to the `value` of a sequence document.
    ///
    /// A missing document is treated as `value = 0` before the mutation runs.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Mutation {
        Increment(i64),
        Set(i64),
    }

    impl Mutation {
        pub fn as_str(self) -> &'static str {
            match self {
                Mutation::Increment(_) => "inc",
                Mutation::Set(_) => "set",
            }
        }

        /// Value the document takes when the mutation is applied to `current`.
        ///
        /// `None` when an increment leaves the i64 range.
        pub fn apply(self, current: Option<i64>) -> Option<i64> {
            match self {
                Mutation::Increment(delta) => current.unwrap_or(0).checked_add(delta),
                Mutation::Set(value) => Some(value),
            }
        }
    }
}
