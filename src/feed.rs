//! Decoding of live strike-feed frames.
//!
//! Public lightning maps push one JSON document per message. Some feeds send
//! it as plain JSON, others run the text through an LZW-style obfuscation in
//! which every character is either a literal (code < 256) or a reference to a
//! dictionary entry built while decoding. [`decode_frame`] accepts both.
//!
//! A frame carries one strike object, a `data` wrapper around one, or an array
//! of them. Only `lat`, `lon` and an optional `time` are read.

use std::sync::Arc;

use hashbrown::HashMap;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::buffer::{StrikeEvent, DEFAULT_INTENSITY};
use crate::error::FeedError;
use crate::service::{unix_now_ms, StrikeClusterService};

/// Reverse the LZW-style string obfuscation.
///
/// The first character is a literal. Each following character with a code
/// below 256 is a literal too; higher codes index a dictionary whose entries
/// are `previous output + first char of current output`, numbered from 256.
/// A code not yet in the dictionary decodes to `previous + first char of previous`.
pub fn lzw_decode(encoded: &str) -> String {
    let mut chars = encoded.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };

    let mut dictionary: HashMap<u32, String> = HashMap::new();
    let mut prev = first.to_string();
    let mut head = first;
    let mut out = prev.clone();
    let mut next_code: u32 = 256;

    for ch in chars {
        let code = ch as u32;
        let entry = if code < 256 {
            ch.to_string()
        } else {
            match dictionary.get(&code) {
                Some(s) => s.clone(),
                None => {
                    let mut s = prev.clone();
                    s.push(head);
                    s
                }
            }
        };
        out.push_str(&entry);

        if let Some(c) = entry.chars().next() {
            head = c;
        }
        let mut new_entry = prev;
        new_entry.push(head);
        dictionary.insert(next_code, new_entry);
        next_code += 1;

        prev = entry;
    }
    out
}

/// Convert a feed timestamp of unknown unit to milliseconds.
///
/// The unit is inferred from magnitude: ≥ 1e17 nanoseconds, ≥ 1e14
/// microseconds, ≥ 1e11 milliseconds, otherwise seconds.
pub fn normalize_timestamp_ms(raw: f64) -> u64 {
    let ms = if raw >= 1e17 {
        raw / 1e6
    } else if raw >= 1e14 {
        raw / 1e3
    } else if raw >= 1e11 {
        raw
    } else {
        raw * 1e3
    };
    if ms.is_finite() && ms > 0.0 {
        ms as u64
    } else {
        0
    }
}

/// Decode one frame into zero or more strikes.
///
/// Strikes without a `time` field are stamped with `received_at_ms`. Range
/// checks are left to the buffer.
pub fn decode_frame(frame: &str, received_at_ms: u64) -> Result<Vec<StrikeEvent>, FeedError> {
    let frame = frame.trim();
    let value: Value = match serde_json::from_str(frame) {
        Ok(v) => v,
        Err(plain) => serde_json::from_str(&lzw_decode(frame)).map_err(|obfuscated| {
            FeedError::Decode(format!("plain JSON: {plain}; de-obfuscated: {obfuscated}"))
        })?,
    };

    match value {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| strike_from_value(item, received_at_ms))
            .collect()),
        other => strike_from_value(&other, received_at_ms)
            .map(|s| vec![s])
            .ok_or(FeedError::MissingCoordinates),
    }
}

fn strike_from_value(value: &Value, received_at_ms: u64) -> Option<StrikeEvent> {
    let obj = value.as_object()?;
    let body = match obj.get("data").and_then(Value::as_object) {
        Some(data) if data.contains_key("lat") => data,
        _ => obj,
    };
    let lat = body.get("lat")?.as_f64()?;
    let lon = body.get("lon")?.as_f64()?;
    let time = body
        .get("time")
        .and_then(Value::as_f64)
        .map(normalize_timestamp_ms)
        .unwrap_or(received_at_ms);
    let intensity = ["mcg", "intensity"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_f64))
        .unwrap_or(DEFAULT_INTENSITY);
    Some(StrikeEvent::new(lat, lon, time).with_intensity(intensity))
}

// ─── FeedReader ──────────────────────────────────────────────────────────────

/// Counters kept by a [`FeedReader`] across all of its sessions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct FeedStats {
    /// Non-empty lines read.
    pub frames: u64,
    /// Strikes decoded and admitted to the buffer.
    pub decoded: u64,
    /// Frames that could not be decoded.
    pub failed: u64,
    /// Decoded strikes the buffer rejected.
    pub rejected: u64,
}

/// Line-oriented feed consumer that ingests into a service.
///
/// One [`FeedReader::run`] call is one connection. When the stream ends or
/// errors, run it again on a new stream; the buffer keeps what it already has
/// and the statistics keep accumulating.
#[derive(Debug)]
pub struct FeedReader {
    service: Arc<StrikeClusterService>,
    stats: FeedStats,
}

impl FeedReader {
    /// Reader feeding `service`.
    pub fn new(service: Arc<StrikeClusterService>) -> Self {
        Self {
            service,
            stats: FeedStats::default(),
        }
    }

    /// Counters so far.
    pub fn stats(&self) -> FeedStats {
        self.stats
    }

    /// Decode one frame and ingest its strikes. Returns how many were admitted.
    pub fn ingest_line(&mut self, line: &str, received_at_ms: u64) -> Result<usize, FeedError> {
        if line.trim().is_empty() {
            return Ok(0);
        }
        self.stats.frames += 1;
        let strikes = match decode_frame(line, received_at_ms) {
            Ok(s) => s,
            Err(e) => {
                self.stats.failed += 1;
                return Err(e);
            }
        };
        let report = self.service.ingest_batch_at(strikes, received_at_ms);
        self.stats.decoded += report.accepted as u64;
        self.stats.rejected += report.rejected as u64;
        Ok(report.accepted)
    }

    /// Consume `reader` line by line until end of stream.
    ///
    /// Undecodable frames are logged and skipped. A read error ends the session
    /// and is returned; counters gathered up to that point are kept.
    pub async fn run<R>(&mut self, reader: R) -> Result<FeedStats, FeedError>
    where
        R: AsyncBufRead + Unpin,
    {
        tracing::info!("feed session started");
        let mut lines = reader.lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "feed stream failed");
                    return Err(FeedError::Io(e));
                }
            };
            if let Err(e) = self.ingest_line(&line, unix_now_ms()) {
                tracing::warn!(error = %e, "feed frame skipped");
            }
        }
        tracing::info!(
            frames = self.stats.frames,
            decoded = self.stats.decoded,
            failed = self.stats.failed,
            "feed session ended"
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusterConfig;

    const NOW: u64 = 1_760_000_000_000;

    /// Encode with the matching compressor so decode tests use realistic input.
    fn lzw_encode(input: &str) -> String {
        let chars: Vec<char> = input.chars().collect();
        if chars.is_empty() {
            return String::new();
        }
        let mut dict: HashMap<String, u32> = HashMap::new();
        let mut next = 256u32;
        let mut out = String::new();
        let mut phrase = chars[0].to_string();
        for &c in &chars[1..] {
            let mut candidate = phrase.clone();
            candidate.push(c);
            if dict.contains_key(&candidate) {
                phrase = candidate;
            } else {
                out.push(code_char(&phrase, &dict));
                dict.insert(candidate, next);
                next += 1;
                phrase = c.to_string();
            }
        }
        out.push(code_char(&phrase, &dict));
        out
    }

    fn code_char(phrase: &str, dict: &HashMap<String, u32>) -> char {
        if phrase.chars().count() == 1 {
            phrase.chars().next().unwrap()
        } else {
            char::from_u32(dict[phrase]).unwrap()
        }
    }

    #[test]
    fn test_lzw_literals_pass_through() {
        assert_eq!(lzw_decode(""), "");
        assert_eq!(lzw_decode("abc"), "abc");
    }

    #[test]
    fn test_lzw_dictionary_reference() {
        // "ab" then code 256 = "ab".
        assert_eq!(lzw_decode("ab\u{100}"), "abab");
    }

    #[test]
    fn test_lzw_undefined_code_special_case() {
        // Code 256 is referenced before it is defined: prev + head = "a" + "a".
        assert_eq!(lzw_decode("a\u{100}"), "aaa");
    }

    #[test]
    fn test_lzw_roundtrips_feed_payload() {
        let json = r#"{"time":1760000000000000000,"lat":45.5,"lon":7.25,"alt":0,"pol":0,"mds":9000,"sig":[{"sta":1},{"sta":1}]}"#;
        let encoded = lzw_encode(json);
        assert!(encoded.chars().count() < json.chars().count());
        assert_eq!(lzw_decode(&encoded), json);
    }

    #[test]
    fn test_timestamp_units() {
        assert_eq!(normalize_timestamp_ms(1_760_000_000.0), NOW);
        assert_eq!(normalize_timestamp_ms(1_760_000_000_000.0), NOW);
        assert_eq!(normalize_timestamp_ms(1_760_000_000_000_000.0), NOW);
        assert_eq!(normalize_timestamp_ms(1.76e18), NOW);
        assert_eq!(normalize_timestamp_ms(-5.0), 0);
    }

    #[test]
    fn test_decode_plain_nested_and_array() {
        let s = decode_frame(r#"{"lat": 1.5, "lon": 2.5, "time": 1760000000}"#, 0).unwrap();
        assert_eq!(s, vec![StrikeEvent::new(1.5, 2.5, NOW)]);

        let s = decode_frame(r#"{"data": {"lat": -3, "lon": 4}}"#, NOW).unwrap();
        assert_eq!(s, vec![StrikeEvent::new(-3.0, 4.0, NOW)]);

        let frame = r#"[{"lat": 1, "lon": 1}, {"foo": 1}, {"lat": 2, "lon": 2}]"#;
        let s = decode_frame(frame, NOW).unwrap();
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_decode_intensity_prefers_mcg() {
        let s = decode_frame(r#"{"lat": 1, "lon": 1, "mcg": 187, "intensity": 3}"#, NOW).unwrap();
        assert_eq!(s[0].intensity, 187.0);

        let s = decode_frame(r#"{"data": {"lat": 1, "lon": 1, "intensity": 2.5}}"#, NOW).unwrap();
        assert_eq!(s[0].intensity, 2.5);

        let s = decode_frame(r#"{"lat": 1, "lon": 1, "mcg": "n/a"}"#, NOW).unwrap();
        assert_eq!(s[0].intensity, DEFAULT_INTENSITY);
    }

    #[test]
    fn test_decode_obfuscated_frame() {
        let json = r#"{"time":1760000000000000000,"lat":12.25,"lon":-45.5,"alt":0}"#;
        let s = decode_frame(&lzw_encode(json), 0).unwrap();
        assert_eq!(s, vec![StrikeEvent::new(12.25, -45.5, NOW)]);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(decode_frame(r#"{"lat": 1}"#, NOW), Err(FeedError::MissingCoordinates)));
        assert!(matches!(decode_frame("not json at all", NOW), Err(FeedError::Decode(_))));
    }

    #[tokio::test]
    async fn test_reader_counts_across_sessions() {
        let service = Arc::new(StrikeClusterService::new(ClusterConfig::default()).unwrap());
        let mut reader = FeedReader::new(Arc::clone(&service));

        let first = "{\"lat\": 10, \"lon\": 10}\ngarbage\n\n{\"lat\": 99, \"lon\": 0}\n";
        let stats = reader.run(first.as_bytes()).await.unwrap();
        assert_eq!(
            stats,
            FeedStats {
                frames: 3,
                decoded: 1,
                failed: 1,
                rejected: 1
            }
        );

        let second = "[{\"lat\": 11, \"lon\": 11}, {\"lat\": 12, \"lon\": 12}]\n";
        let stats = reader.run(second.as_bytes()).await.unwrap();
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.decoded, 3);
        assert_eq!(service.buffered(), 3);
    }
}
