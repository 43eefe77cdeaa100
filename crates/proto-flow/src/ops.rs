//! Operational types shared by every shard: how a shard identifies itself
//! in logs, what level it's configured to log at, and the label encoding
//! of its assigned range and task identity.

use crate::flow::RangeSpec;
use serde::{Deserialize, Serialize};

/// The kind of catalog task a shard runs. Numeric values and names must
/// match the `estuary.dev/task-type` label values exactly.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[repr(i32)]
pub enum TaskType {
    #[default]
    InvalidType = 0,
    Capture = 1,
    Derivation = 2,
    Materialization = 3,
}

impl TaskType {
    pub fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(Self::InvalidType),
            1 => Some(Self::Capture),
            2 => Some(Self::Derivation),
            3 => Some(Self::Materialization),
            _ => None,
        }
    }

    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::InvalidType => "invalid_type",
            Self::Capture => "capture",
            Self::Derivation => "derivation",
            Self::Materialization => "materialization",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        match name {
            "invalid_type" => Some(Self::InvalidType),
            "capture" => Some(Self::Capture),
            "derivation" => Some(Self::Derivation),
            "materialization" => Some(Self::Materialization),
            _ => None,
        }
    }
}

pub mod log {
    use serde::{Deserialize, Serialize};

    /// Log verbosity, ordered from least to most severe.
    #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Debug, Serialize, Deserialize)]
    #[repr(i32)]
    pub enum Level {
        #[default]
        UndefinedLevel = 0,
        Trace = 1,
        Debug = 2,
        Info = 3,
        Warn = 4,
        Error = 5,
    }

    impl Level {
        pub fn from_i32(v: i32) -> Option<Self> {
            match v {
                0 => Some(Self::UndefinedLevel),
                1 => Some(Self::Trace),
                2 => Some(Self::Debug),
                3 => Some(Self::Info),
                4 => Some(Self::Warn),
                5 => Some(Self::Error),
                _ => None,
            }
        }

        pub fn as_str_name(&self) -> &'static str {
            match self {
                Self::UndefinedLevel => "undefined_level",
                Self::Trace => "trace",
                Self::Debug => "debug",
                Self::Info => "info",
                Self::Warn => "warn",
                Self::Error => "error",
            }
        }

        pub fn from_str_name(name: &str) -> Option<Self> {
            match name {
                "undefined_level" => Some(Self::UndefinedLevel),
                "trace" => Some(Self::Trace),
                "debug" => Some(Self::Debug),
                "info" => Some(Self::Info),
                "warn" => Some(Self::Warn),
                "error" => Some(Self::Error),
                _ => None,
            }
        }
    }
}

/// A stable reference to a shard and its assigned range, as embedded in
/// structured log records and stats documents written to the ops journal.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct ShardRef {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(string, tag = "3")]
    pub key_begin: String,
    #[prost(string, tag = "4")]
    pub r_clock_begin: String,
    #[prost(string, tag = "5")]
    pub build: String,
}

/// A structured log record, as emitted to a task's logs journal.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct Log {
    #[prost(message, optional, tag = "1")]
    pub shard: Option<ShardRef>,
    #[prost(string, tag = "2")]
    pub timestamp: String,
    #[prost(int32, tag = "3")]
    pub level: i32,
    #[prost(string, tag = "4")]
    pub message: String,
    #[prost(bytes = "bytes", tag = "5")]
    pub fields_json: bytes::Bytes,
}

/// How a shard is labeled for scheduling and operation: its assigned
/// range, its identity within the catalog, its configured log verbosity,
/// and the journals its logs and stats are written to.
#[derive(Clone, PartialEq, Default, Debug, Serialize, Deserialize, ::prost::Message)]
pub struct ShardLabeling {
    #[prost(string, tag = "1")]
    pub build: String,
    #[prost(string, tag = "2")]
    pub hostname: String,
    #[prost(int32, tag = "3")]
    pub log_level: i32,
    #[prost(message, optional, tag = "4")]
    pub range: Option<RangeSpec>,
    #[prost(string, tag = "5")]
    pub split_source: String,
    #[prost(string, tag = "6")]
    pub split_target: String,
    #[prost(string, tag = "7")]
    pub task_name: String,
    #[prost(int32, tag = "8")]
    pub task_type: i32,
    #[prost(string, tag = "9")]
    pub logs_journal: String,
    #[prost(string, tag = "10")]
    pub stats_journal: String,
}

impl ShardLabeling {
    pub fn log_level(&self) -> log::Level {
        log::Level::from_i32(self.log_level).unwrap_or_default()
    }

    pub fn task_type(&self) -> TaskType {
        TaskType::from_i32(self.task_type).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_round_trips_through_name() {
        for t in [TaskType::Capture, TaskType::Derivation, TaskType::Materialization] {
            assert_eq!(TaskType::from_str_name(t.as_str_name()), Some(t));
        }
        assert_eq!(TaskType::from_str_name("bogus"), None);
    }

    #[test]
    fn test_log_level_accessor_defaults_on_unknown() {
        let labeling = ShardLabeling {
            log_level: 99,
            ..Default::default()
        };
        assert_eq!(labeling.log_level(), log::Level::UndefinedLevel);
    }
}
