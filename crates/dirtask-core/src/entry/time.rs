//! Timestamp codecs for task attributes.
//!
//! - UTC: `yyyyMMddHHmmss[.SSS]Z`（末尾の `Z` で判定）
//! - local: `yyyyMMddHHmmss`（サーバーのローカルタイムゾーン）

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};

const COMPACT_FORMAT: &str = "%Y%m%d%H%M%S";
const COMPACT_FORMAT_MILLIS: &str = "%Y%m%d%H%M%S%.3f";

/// 保存された時刻文字列を epoch ミリ秒に変換する
///
/// エラーは理由の文字列のみ。attribute 名や DN は呼び出し側が付ける。
pub fn parse_timestamp(value: &str) -> Result<i64, String> {
    match value.strip_suffix('Z') {
        Some(utc) => {
            let naive = parse_naive(utc)?;
            Ok(naive.and_utc().timestamp_millis())
        }
        None => {
            let naive = parse_naive(value)?;
            Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp_millis())
                .ok_or_else(|| format!("{value} does not exist in the local time zone"))
        }
    }
}

fn parse_naive(value: &str) -> Result<NaiveDateTime, String> {
    let format = if value.contains('.') {
        COMPACT_FORMAT_MILLIS
    } else {
        COMPACT_FORMAT
    };
    NaiveDateTime::parse_from_str(value, format).map_err(|e| e.to_string())
}

/// epoch ミリ秒を UTC 形式（ミリ秒付き）で書き出す
pub fn format_utc(millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(dt) => format!("{}Z", dt.format(COMPACT_FORMAT_MILLIS)),
        None => String::new(),
    }
}

/// ログ行の先頭に付けるローカル時刻（例: `18/Oct/2026:09:15:02 +0900`）
pub fn format_log_time(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%d/%b/%Y:%H:%M:%S %z").to_string())
        .unwrap_or_default()
}

/// 通知メール用の読みやすい時刻（例: `Sun Oct 18 09:15:02 +09:00 2026`）
pub fn format_human(millis: i64) -> String {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%a %b %d %H:%M:%S %:z %Y").to_string())
        .unwrap_or_default()
}
