//! Attribute Accessor - entry から型付きで値を取り出す
//!
//! どの関数も entry を変更しません。エラーは全て `InitializationError`。

use super::Entry;
use super::time::parse_timestamp;
use crate::error::InitializationError;

/// 単一値を取り出す
///
/// - attribute が無い: `required` なら `MissingAttribute`、そうでなければ `None`
/// - オプション違いで複数ある: `MultipleAttributes`
/// - 値が無い: `required` なら `NoValues`、そうでなければ `None`
/// - 値が複数: `MultipleValues`
pub fn get_scalar(
    entry: &Entry,
    name: &str,
    required: bool,
) -> Result<Option<String>, InitializationError> {
    let mut attrs = entry.all_attributes(name);
    let Some(attr) = attrs.next() else {
        if required {
            return Err(InitializationError::MissingAttribute {
                dn: entry.dn().clone(),
                attribute: name.to_string(),
            });
        }
        return Ok(None);
    };
    if attrs.next().is_some() {
        return Err(InitializationError::MultipleAttributes {
            dn: entry.dn().clone(),
            attribute: name.to_string(),
        });
    }

    match attr.values() {
        [] if required => Err(InitializationError::NoValues {
            dn: entry.dn().clone(),
            attribute: name.to_string(),
        }),
        [] => Ok(None),
        [value] => Ok(Some(value.clone())),
        _ => Err(InitializationError::MultipleValues {
            dn: entry.dn().clone(),
            attribute: name.to_string(),
        }),
    }
}

/// 全ての値を取り出す（無ければ空）
pub fn get_list(entry: &Entry, name: &str) -> Result<Vec<String>, InitializationError> {
    let mut attrs = entry.all_attributes(name);
    let Some(attr) = attrs.next() else {
        return Ok(Vec::new());
    };
    if attrs.next().is_some() {
        return Err(InitializationError::MultipleAttributes {
            dn: entry.dn().clone(),
            attribute: name.to_string(),
        });
    }
    Ok(attr.values().to_vec())
}

/// 時刻を epoch ミリ秒で取り出す。attribute が無ければ `-1`
pub fn get_timestamp(entry: &Entry, name: &str) -> Result<i64, InitializationError> {
    let Some(value) = get_scalar(entry, name, false)? else {
        return Ok(-1);
    };
    parse_timestamp(&value).map_err(|reason| InitializationError::MalformedTimestamp {
        dn: entry.dn().clone(),
        attribute: name.to_string(),
        value,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Dn;
    use crate::entry::{ATTR_TASK_DEPENDENCY_IDS, ATTR_TASK_ID, ATTR_TASK_SCHEDULED_START_TIME};
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn base() -> Entry {
        Entry::new(Dn::new("ds-task-id=t1,cn=tasks"))
    }

    #[test]
    fn scalar_returns_single_value() {
        let entry = base().with(ATTR_TASK_ID, &["t1"]);
        assert_eq!(
            get_scalar(&entry, ATTR_TASK_ID, true).unwrap(),
            Some("t1".to_string())
        );
    }

    #[test]
    fn optional_scalar_may_be_absent() {
        assert_eq!(get_scalar(&base(), ATTR_TASK_ID, false).unwrap(), None);
    }

    #[test]
    fn required_scalar_must_be_present() {
        let err = get_scalar(&base(), ATTR_TASK_ID, true).unwrap_err();
        assert!(matches!(
            err,
            InitializationError::MissingAttribute { ref attribute, .. } if attribute == ATTR_TASK_ID
        ));
    }

    #[rstest]
    #[case::two_values(base().with(ATTR_TASK_ID, &["a", "b"]), "MultipleValues")]
    #[case::two_attributes(
        base().with(ATTR_TASK_ID, &["a"]).with("ds-task-id;lang-fr", &["b"]),
        "MultipleAttributes"
    )]
    #[case::no_values(base().with(ATTR_TASK_ID, &[]), "NoValues")]
    fn ambiguous_scalars_are_rejected(#[case] entry: Entry, #[case] expected: &str) {
        let err = get_scalar(&entry, ATTR_TASK_ID, true).unwrap_err();
        assert!(format!("{err:?}").starts_with(expected), "{err:?}");
    }

    #[test]
    fn list_keeps_value_order() {
        let entry = base().with(ATTR_TASK_DEPENDENCY_IDS, &["b", "a", "c"]);
        assert_eq!(
            get_list(&entry, ATTR_TASK_DEPENDENCY_IDS).unwrap(),
            vec!["b", "a", "c"]
        );
        assert!(get_list(&base(), ATTR_TASK_DEPENDENCY_IDS).unwrap().is_empty());
    }

    #[test]
    fn list_rejects_multiple_attributes() {
        let entry = base()
            .with(ATTR_TASK_DEPENDENCY_IDS, &["a"])
            .with("ds-task-dependency-id;x", &["b"]);
        assert!(matches!(
            get_list(&entry, ATTR_TASK_DEPENDENCY_IDS),
            Err(InitializationError::MultipleAttributes { .. })
        ));
    }

    #[test]
    fn absent_timestamp_is_minus_one() {
        assert_eq!(get_timestamp(&base(), ATTR_TASK_SCHEDULED_START_TIME).unwrap(), -1);
    }

    #[test]
    fn utc_timestamp_is_parsed() {
        let entry = base().with(ATTR_TASK_SCHEDULED_START_TIME, &["20240101000000Z"]);
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(
            get_timestamp(&entry, ATTR_TASK_SCHEDULED_START_TIME).unwrap(),
            expected.timestamp_millis()
        );
    }

    #[test]
    fn malformed_timestamp_names_attribute_and_value() {
        let entry = base().with(ATTR_TASK_SCHEDULED_START_TIME, &["tomorrow"]);
        let err = get_timestamp(&entry, ATTR_TASK_SCHEDULED_START_TIME).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(ATTR_TASK_SCHEDULED_START_TIME));
        assert!(msg.contains("tomorrow"));
    }
}
