/// Groups enriched hourly records into station/day buckets for daily
/// summaries.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::EnrichedHourlyRecord;

/// All records for one station on one calendar date, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct StationDay<'a> {
    pub station: &'a str,
    pub date: NaiveDate,
    pub records: Vec<&'a EnrichedHourlyRecord>,
}

/// Buckets records by (station, date), ordered by station then date.
/// Within a bucket, records keep their input order.
pub fn group_by_station_day(records: &[EnrichedHourlyRecord]) -> Vec<StationDay<'_>> {
    let mut buckets: BTreeMap<(&str, NaiveDate), Vec<&EnrichedHourlyRecord>> = BTreeMap::new();
    for record in records {
        buckets
            .entry((record.station.as_str(), record.date))
            .or_default()
            .push(record);
    }
    buckets
        .into_iter()
        .map(|((station, date), records)| StationDay {
            station,
            date,
            records,
        })
        .collect()
}
