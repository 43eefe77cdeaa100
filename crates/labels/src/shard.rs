use crate::{expect_one, expect_one_u32, maybe_one, set_value, Error, KEY_BEGIN, RCLOCK_BEGIN};
use proto_flow::{flow, ops};
use proto_gazette::broker::LabelSet;

/// Encode a ShardLabeling into a LabelSet.
pub fn encode_labeling(mut set: LabelSet, labeling: &ops::ShardLabeling) -> LabelSet {
    set = set_value(set, crate::BUILD, &labeling.build);

    if !labeling.hostname.is_empty() {
        set = set_value(set, crate::HOSTNAME, &labeling.hostname);
    }
    set = set_value(set, crate::LOG_LEVEL, labeling.log_level().as_str_name());

    if let Some(range) = &labeling.range {
        set = encode_range_spec(set, range);
    }

    if !labeling.split_source.is_empty() {
        set = set_value(set, crate::SPLIT_SOURCE, &labeling.split_source);
    }
    if !labeling.split_target.is_empty() {
        set = set_value(set, crate::SPLIT_TARGET, &labeling.split_target);
    }

    set = set_value(set, crate::TASK_NAME, &labeling.task_name);
    set = set_value(set, crate::TASK_TYPE, labeling.task_type().as_str_name());

    set = set_value(set, crate::LOGS_JOURNAL, &labeling.logs_journal);
    set = set_value(set, crate::STATS_JOURNAL, &labeling.stats_journal);

    set
}

/// Decode a ShardLabeling from a LabelSet.
pub fn decode_labeling(set: &LabelSet) -> Result<ops::ShardLabeling, Error> {
    let build = expect_one(set, crate::BUILD)?.to_string();
    let hostname = maybe_one(set, crate::HOSTNAME)?.to_string();

    let log_level = expect_one(set, crate::LOG_LEVEL)?;
    let log_level = match ops::log::Level::from_str_name(log_level) {
        None | Some(ops::log::Level::UndefinedLevel) => {
            return Err(Error::InvalidValue {
                name: crate::LOG_LEVEL.to_string(),
                value: log_level.to_string(),
            })
        }
        Some(e) => e,
    } as i32;

    let range = if has_range_spec(set) {
        Some(decode_range_spec(set)?)
    } else {
        None
    };
    let split_source = maybe_one(set, crate::SPLIT_SOURCE)?.to_string();
    let split_target = maybe_one(set, crate::SPLIT_TARGET)?.to_string();
    let task_name = expect_one(set, crate::TASK_NAME)?.to_string();

    let task_type = expect_one(set, crate::TASK_TYPE)?;
    let task_type = match ops::TaskType::from_str_name(task_type) {
        None | Some(ops::TaskType::InvalidType) => {
            return Err(Error::InvalidValue {
                name: crate::TASK_TYPE.to_string(),
                value: task_type.to_string(),
            })
        }
        Some(e) => e,
    } as i32;

    let logs_journal = maybe_one(set, crate::LOGS_JOURNAL)?.to_string();
    let stats_journal = maybe_one(set, crate::STATS_JOURNAL)?.to_string();

    if !split_source.is_empty() && !split_target.is_empty() {
        return Err(Error::SplitSourceAndTarget(split_source, split_target));
    }

    Ok(ops::ShardLabeling {
        build,
        hostname,
        log_level,
        range,
        split_source,
        split_target,
        task_name,
        task_type,
        logs_journal,
        stats_journal,
    })
}

/// Encode a RangeSpec into a LabelSet.
pub fn encode_range_spec(mut set: LabelSet, spec: &flow::RangeSpec) -> LabelSet {
    let fmt = |v: u32| format!("{v:08x}");
    set = set_value(set, crate::KEY_BEGIN, &fmt(spec.key_begin));
    set = set_value(set, crate::KEY_END, &fmt(spec.key_end));
    set = set_value(set, crate::RCLOCK_BEGIN, &fmt(spec.r_clock_begin));
    set_value(set, crate::RCLOCK_END, &fmt(spec.r_clock_end))
}

/// Decode a RangeSpec from a LabelSet.
pub fn decode_range_spec(set: &LabelSet) -> Result<flow::RangeSpec, Error> {
    Ok(flow::RangeSpec {
        key_begin: expect_one_u32(set, crate::KEY_BEGIN)?,
        key_end: expect_one_u32(set, crate::KEY_END)?,
        r_clock_begin: expect_one_u32(set, crate::RCLOCK_BEGIN)?,
        r_clock_end: expect_one_u32(set, crate::RCLOCK_END)?,
    })
}

/// Determine if the LabelSet encodes a RangeSpec.
pub fn has_range_spec(set: &LabelSet) -> bool {
    for name in [crate::KEY_BEGIN, crate::KEY_END, crate::RCLOCK_BEGIN, crate::RCLOCK_END] {
        if !crate::values(set, name).is_empty() {
            return true;
        }
    }
    false
}

/// Build the shard ID suffix implied by the LabelSet. This suffix is
/// appended to the task template's base ID to form a complete shard ID.
pub fn id_suffix(set: &LabelSet) -> Result<String, Error> {
    let key_begin = expect_one(set, KEY_BEGIN)?;
    let rclock_begin = expect_one(set, RCLOCK_BEGIN)?;
    Ok(format!("{key_begin}-{rclock_begin}"))
}

/// Extract a shard's templated ID prefix.
pub fn id_prefix(name: &str) -> Option<&str> {
    name.rsplitn(2, '/').nth(1)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::build_set;

    fn sample_labeling() -> ops::ShardLabeling {
        ops::ShardLabeling {
            build: "a-build".to_string(),
            hostname: "a.hostname".to_string(),
            log_level: ops::log::Level::Info as i32,
            range: Some(flow::RangeSpec {
                key_begin: 256,
                key_end: 1024,
                r_clock_begin: u32::MIN,
                r_clock_end: u32::MAX,
            }),
            split_source: "split/source".to_string(),
            split_target: "split/target".to_string(),
            task_name: "task/name".to_string(),
            task_type: ops::TaskType::Derivation as i32,
            logs_journal: "logs/journal".to_string(),
            stats_journal: "stats/journal".to_string(),
        }
    }

    #[test]
    fn test_encoding_round_trip() {
        let labeling = sample_labeling();
        let set = encode_labeling(LabelSet::default(), &labeling);

        let id = format!("base/shard/id/{}", id_suffix(&set).unwrap());
        assert_eq!(id, "base/shard/id/00000100-00000000");
        assert_eq!(id_prefix(&id), Some("base/shard/id"));

        assert_eq!(decode_labeling(&set).unwrap(), labeling);
    }

    #[test]
    fn test_decode_cases() {
        let model = build_set([
            (crate::BUILD, "a-build"),
            (crate::HOSTNAME, "a.hostname"),
            (crate::KEY_BEGIN, "00000001"),
            (crate::KEY_END, "00000002"),
            (crate::LOG_LEVEL, "info"),
            (crate::RCLOCK_BEGIN, "00000003"),
            (crate::RCLOCK_END, "00000004"),
            (crate::SPLIT_SOURCE, "split/source"),
            (crate::TASK_NAME, "the/task"),
            (crate::TASK_TYPE, "capture"),
            (crate::LOGS_JOURNAL, "logs/journal"),
            (crate::STATS_JOURNAL, "stats/journal"),
        ]);

        let decoded = decode_labeling(&model).unwrap();
        assert_eq!(decoded.task_name, "the/task");
        assert_eq!(decoded.range.unwrap().key_begin, 1);

        let missing_build = crate::remove(model.clone(), crate::BUILD);
        assert!(decode_labeling(&missing_build).is_err());

        let both_split = crate::add_value(model.clone(), crate::SPLIT_TARGET, "split/target");
        assert!(matches!(
            decode_labeling(&both_split),
            Err(Error::SplitSourceAndTarget(_, _))
        ));
    }
}
