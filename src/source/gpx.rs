use super::{SourceParams, SourceStats};
use crate::geo::Coordinate;
use crate::model::{PositionSample, SourceEvent};
use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub(crate) fn load_gpx(path: &Path) -> Result<Vec<PositionSample>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open GPX file {}", path.display()))?;
    let samples = parse_gpx(std::io::BufReader::new(file), OffsetDateTime::now_utc())
        .with_context(|| format!("parse GPX file {}", path.display()))?;
    tracing::debug!(path = %path.display(), points = samples.len(), "loaded GPX track");
    Ok(samples)
}

/// Flatten every track and segment into samples, in document order.
///
/// Points without a time get `fallback_time`. Speed comes from the file when present,
/// otherwise from distance over time to the previous point.
pub(crate) fn parse_gpx<R: Read>(reader: R, fallback_time: OffsetDateTime) -> Result<Vec<PositionSample>> {
    let gpx = gpx::read(reader)?;

    let mut samples: Vec<PositionSample> = Vec::new();
    let mut prev: Option<(Coordinate, Option<OffsetDateTime>)> = None;

    for track in gpx.tracks {
        for segment in track.segments {
            for point in segment.points {
                let position = point.point();
                let coordinate = Coordinate::new(position.y(), position.x());
                let time = match point.time {
                    Some(t) => Some(OffsetDateTime::parse(&t.format()?, &Rfc3339)?),
                    None => None,
                };

                let speed = point.speed.unwrap_or_else(|| match (prev, time) {
                    (Some((prev_coord, Some(prev_time))), Some(time)) => {
                        let secs = (time - prev_time).as_seconds_f64();
                        if secs > 0.0 {
                            prev_coord.distance_to(&coordinate) / secs
                        } else {
                            0.0
                        }
                    }
                    _ => 0.0,
                });

                samples.push(PositionSample::new(
                    coordinate,
                    speed,
                    time.unwrap_or(fallback_time),
                ));
                prev = Some((coordinate, time));
            }
        }
    }

    Ok(samples)
}

/// Deliver recorded samples one per delivery interval.
pub(crate) async fn replay(samples: Vec<PositionSample>, params: SourceParams<'_>) -> Result<SourceStats> {
    let mut stats = SourceStats::default();
    let mut pacer = params.pacer();

    for sample in samples {
        pacer.tick().await;
        if params.cancelled() {
            break;
        }
        if !params.emit(SourceEvent::Fix(sample), &mut stats) {
            break;
        }
    }

    Ok(stats)
}
