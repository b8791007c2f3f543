//! Parser for the download-manager status block legendary prints to stderr.
//!
//! ```text
//! [DLManager] INFO: = Progress: 4.95% (64/1293), Running for 00:00:04, ETA: 00:01:21
//! [DLManager] INFO:  - Downloaded: 37.54 MiB, Written: 43.64 MiB
//! [DLManager] INFO:  - Cache usage: 11.00 MiB, active tasks: 32
//! [DLManager] INFO:  + Download	- 9.00 MiB/s (raw) / 10.47 MiB/s (decompressed)
//! [DLManager] INFO:  + Disk	- 10.47 MiB/s (write) / 0.00 MiB/s (read)
//! ```

use crate::core::progress::*;
use std::time::Duration;

pub fn parse_line(line: &str) -> Option<ProgressUpdate> {
    let line = line.trim();
    let body = match line.find("INFO:") {
        Some(i) => line[i + "INFO:".len()..].trim(),
        None => line,
    };

    if let Some(rest) = body.strip_prefix("= Progress:") {
        return parse_transfer(rest).map(ProgressUpdate::Transfer);
    }
    if let Some(rest) = body.strip_prefix("- Downloaded:") {
        let (downloaded, written) = rest.split_once(", Written:")?;
        return Some(ProgressUpdate::Bytes(ByteCounters {
            downloaded: parse_size(downloaded)?,
            written: parse_size(written)?,
        }));
    }
    if let Some(rest) = body.strip_prefix("- Cache usage:") {
        let (usage, tasks) = rest.split_once(", active tasks:")?;
        return Some(ProgressUpdate::Cache(CacheStats {
            usage: parse_size(usage)?,
            active_tasks: tasks.trim().parse().ok()?,
        }));
    }
    if let Some(rest) = body.strip_prefix("+ Download") {
        let (raw, decompressed) = split_pair(rest, "(raw)", "(decompressed)")?;
        return Some(ProgressUpdate::Speed(DownloadSpeed { raw, decompressed }));
    }
    if let Some(rest) = body.strip_prefix("+ Disk") {
        let (write, read) = split_pair(rest, "(write)", "(read)")?;
        return Some(ProgressUpdate::Disk(DiskSpeed { write, read }));
    }
    None
}

/// Pulls the message out of an `ERROR:` line, if it is one.
pub fn error_message(line: &str) -> Option<&str> {
    let (_, msg) = line.split_once("ERROR:")?;
    let msg = msg.trim();
    (!msg.is_empty()).then_some(msg)
}

fn parse_transfer(rest: &str) -> Option<TransferProgress> {
    let (pct, rest) = rest.trim().split_once('%')?;
    let (objects, rest) = rest.trim_start().strip_prefix('(')?.split_once(')')?;
    let (done, total) = objects.split_once('/')?;
    let rest = rest.trim_start_matches(',').trim().strip_prefix("Running for")?;
    let (runtime, eta) = rest.split_once(", ETA:")?;

    Some(TransferProgress {
        percentage: pct.trim().parse().ok()?,
        downloaded_objects: done.trim().parse().ok()?,
        total_objects: total.trim().parse().ok()?,
        runtime: parse_hms(runtime)?,
        eta: parse_hms(eta)?,
    })
}

/// `"\t- 9.00 MiB/s (raw) / 10.47 MiB/s (decompressed)"` → both rates in bytes/s.
fn split_pair(rest: &str, first_tag: &str, second_tag: &str) -> Option<(u64, u64)> {
    let rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '-');
    let (first, second) = rest.split_once(" / ")?;
    let first = first.trim().strip_suffix(first_tag)?;
    let second = second.trim().strip_suffix(second_tag)?;
    Some((parse_rate(first)?, parse_rate(second)?))
}

fn parse_rate(s: &str) -> Option<u64> {
    parse_size(s.trim().strip_suffix("/s")?)
}

fn parse_size(s: &str) -> Option<u64> {
    let mut parts = s.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let unit = match parts.next().unwrap_or("B") {
        "B" => 1.0,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * unit).round() as u64)
}

fn parse_hms(s: &str) -> Option<Duration> {
    let mut secs = 0u64;
    for part in s.trim().split(':') {
        secs = secs * 60 + part.parse::<u64>().ok()?;
    }
    Some(Duration::from_secs(secs))
}
