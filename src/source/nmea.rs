//! NMEA 0183 position source.
//!
//! Only recommended-minimum (`RMC`) sentences produce fixes: they carry
//! position, ground speed, date and time in one line, once per epoch.

use super::{SourceParams, SourceStats};
use crate::geo::Coordinate;
use crate::model::{LocationMode, PositionSample, SourceEvent, SourceFailure};
use anyhow::{Context, Result};
use nmea::sentences::rmc::RmcStatusOfFix;
use nmea::sentences::RmcData;
use nmea::ParseResult;
use time::OffsetDateTime;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};

const KNOT_TO_METER_PER_SECOND: f64 = 0.514444;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NmeaError {
    #[error("sentence does not start with '$'")]
    MissingStart,
    #[error("sentence contains non-ASCII characters")]
    NonAscii,
    #[error("{0}")]
    Parse(String),
}

impl From<NmeaError> for SourceFailure {
    fn from(e: NmeaError) -> Self {
        SourceFailure::Malformed(e.to_string())
    }
}

/// Outcome of a decoded RMC sentence.
#[derive(Debug, Clone, PartialEq)]
pub enum RmcFix {
    Valid(PositionSample),
    NoFix,
}

/// Decode one line. Returns `Ok(None)` for sentences that carry no fix.
///
/// `received_at` stands in for the timestamp when the sentence has no date or time.
pub fn decode_sentence(
    line: &str,
    mode: LocationMode,
    received_at: OffsetDateTime,
) -> Result<Option<RmcFix>, NmeaError> {
    let line = line.trim();
    if !line.is_ascii() {
        return Err(NmeaError::NonAscii);
    }
    let address = line
        .strip_prefix('$')
        .ok_or(NmeaError::MissingStart)?
        .split(',')
        .next()
        .unwrap_or_default();
    // Talker id is two letters (GP, GN, GL, ...); proprietary sentences start with 'P'.
    if address.len() != 5 || address.starts_with('P') || !address.ends_with("RMC") {
        return Ok(None);
    }

    let rmc = match nmea::parse_str(line) {
        Ok(ParseResult::RMC(rmc)) => rmc,
        Ok(_) => return Ok(None),
        Err(e) => return Err(NmeaError::Parse(e.to_string())),
    };

    if matches!(rmc.status_of_fix, RmcStatusOfFix::Invalid) {
        return Ok(Some(RmcFix::NoFix));
    }
    if let Some(indicator) = mode_indicator(line) {
        if !mode_accepted(indicator, mode) {
            return Ok(Some(RmcFix::NoFix));
        }
    }

    let (Some(latitude), Some(longitude)) = (rmc.lat, rmc.lon) else {
        return Ok(Some(RmcFix::NoFix));
    };
    let speed = rmc
        .speed_over_ground
        .map(|knots| f64::from(knots) * KNOT_TO_METER_PER_SECOND)
        .unwrap_or(0.0);
    let timestamp = fix_timestamp(&rmc).unwrap_or(received_at);

    Ok(Some(RmcFix::Valid(PositionSample::new(
        Coordinate::new(latitude, longitude),
        speed,
        timestamp,
    ))))
}

/// Positioning mode indicator, the 13th field appended by NMEA 2.3+ receivers.
fn mode_indicator(line: &str) -> Option<char> {
    let body = line.split('*').next()?;
    body.split(',').nth(12)?.chars().next()
}

fn mode_accepted(indicator: char, mode: LocationMode) -> bool {
    match mode {
        // Autonomous, differential, precise, RTK fixed and float.
        LocationMode::HighAccuracy => matches!(indicator, 'A' | 'D' | 'P' | 'R' | 'F'),
        LocationMode::BatterySaving => indicator != 'N',
    }
}

/// UTC date and time of the fix; `None` when either is missing.
fn fix_timestamp(rmc: &RmcData) -> Option<OffsetDateTime> {
    let utc = rmc.fix_date?.and_time(rmc.fix_time?).and_utc();
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(utc.timestamp_millis()) * 1_000_000).ok()
}

/// Pump NMEA lines into fixes. A file replay is paced at the delivery interval;
/// a live stream (stdin) is consumed as it arrives.
///
/// `lines` outlives the run so a shared stream keeps its position across runs.
pub(crate) async fn run_nmea<R>(
    lines: &mut Lines<R>,
    paced: bool,
    params: SourceParams<'_>,
) -> Result<SourceStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = SourceStats::default();
    let mut pacer = params.pacer();

    while let Some(line) = lines.next_line().await.context("read NMEA input")? {
        if params.cancelled() {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let ev = match decode_sentence(&line, params.mode, OffsetDateTime::now_utc()) {
            Ok(None) => continue,
            Ok(Some(RmcFix::Valid(sample))) => SourceEvent::Fix(sample),
            Ok(Some(RmcFix::NoFix)) => SourceEvent::Failed(SourceFailure::NoFix),
            Err(e) => {
                tracing::debug!(error = %e, line = %line, "dropping NMEA sentence");
                SourceEvent::Failed(e.into())
            }
        };

        if paced {
            pacer.tick().await;
            if params.cancelled() {
                break;
            }
        }
        if !params.emit(ev, &mut stats) {
            break;
        }
    }

    Ok(stats)
}
