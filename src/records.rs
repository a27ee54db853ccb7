use std::fmt;

use chrono::NaiveDateTime;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::{error::Result, login::AccountId, parser, session::Session};

pub const REPORT_PATH: &str = "/einsatznachbearbeitungberichtbycommonds/berichtliststandarddaten";

/// Data properties of the report table, in column order
pub const COLUMNS: [&str; 14] = [
    "elrEinsatzNummer",
    "formularBoolean1",
    "einsatzDatum",
    "berichtsart",
    "string100n1",
    "statusBearbeitung",
    "statusVerrechnung",
    "string100n3",
    "resRechte_kurzzeichen",
    "string100n2",
    "string100n4",
    "string100n5",
    "string100n6",
    "naechsterBearbeiter_loginname",
];

/// Newest reports first
const SORT_COLUMN: usize = 2;
const SORT_DIRECTION: &str = "desc";

/// One page of the report table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(rename = "aaData")]
    pub records: Vec<Record>,

    #[serde(rename = "iTotalDisplayRecords")]
    pub total_display_records: i64,

    #[serde(rename = "iTotalRecords")]
    pub total_records: i64,

    /// Echo of the request's `sEcho`, used by the table paging protocol
    #[serde(rename = "sEcho")]
    pub echo: i64,
}

/// One report row
///
/// The table's column contract guarantees every field. A `null` text field
/// reads as an empty string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "DT_RowId", deserialize_with = "nullable")]
    pub row_id: String,

    #[serde(rename = "berichtsart", deserialize_with = "nullable")]
    pub category: String,

    #[serde(rename = "einheit", deserialize_with = "nullable")]
    pub unit: String,

    #[serde(rename = "einsatzDatum")]
    pub date_time: Timestamp,

    #[serde(rename = "elrEinsatzNummer", deserialize_with = "nullable")]
    pub record_number: String,

    #[serde(rename = "formularBoolean1", deserialize_with = "nullable")]
    pub form_flag: String,

    #[serde(rename = "naechsterBearbeiter_loginname", deserialize_with = "nullable")]
    pub next_handler: String,

    #[serde(rename = "resRechte_kurzzeichen", deserialize_with = "nullable")]
    pub rights_code: String,

    #[serde(rename = "statusBearbeitung", deserialize_with = "nullable")]
    pub processing_status: String,

    #[serde(rename = "statusVerrechnung", deserialize_with = "nullable")]
    pub billing_status: String,

    #[serde(rename = "string100n1", deserialize_with = "nullable")]
    pub kind: String,

    #[serde(rename = "string100n2", deserialize_with = "nullable")]
    pub postal_code: String,

    #[serde(rename = "string100n3", deserialize_with = "nullable")]
    pub location_short: String,

    #[serde(rename = "string100n4", deserialize_with = "nullable")]
    pub location_long: String,

    #[serde(rename = "string100n5", deserialize_with = "nullable")]
    pub street: String,

    #[serde(rename = "string100n6", deserialize_with = "nullable")]
    pub misc: String,
}

fn nullable<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The date-time of a record, as wall-clock time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timestamp(pub NaiveDateTime);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S"))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format("%Y-%m-%dT%H:%M:%S%.f"))
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(TimestampVisitor)
    }
}

struct TimestampVisitor;

impl<'de> de::Visitor<'de> for TimestampVisitor {
    type Value = Timestamp;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a date-time string or a Unix epoch number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Timestamp, E> {
        parser::parse_timestamp(v)
            .map(Timestamp)
            .map_err(|err| E::custom(format!("{:#}", err)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Timestamp, E> {
        parser::from_epoch(v)
            .map(Timestamp)
            .ok_or_else(|| E::custom("epoch timestamp out of range"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Timestamp, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("epoch timestamp out of range"))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Timestamp, E> {
        self.visit_i64(v.trunc() as i64)
    }
}

/// The query string of a single report page
///
/// Only the first page is ever requested. Rows past `limit` are not fetched.
pub struct ReportQuery<'a> {
    pub account: &'a AccountId,
    pub menu: &'a str,
    pub limit: u32,
}

impl ReportQuery<'_> {
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());

        serializer
            .append_pair("konto", &self.account.0)
            .append_pair("menueId", self.menu)
            .append_pair("sEcho", "1")
            .append_pair("iColumns", &COLUMNS.len().to_string())
            .append_pair("sColumns", "")
            .append_pair("iDisplayStart", "0")
            .append_pair("iDisplayLength", &self.limit.to_string());

        for (i, column) in COLUMNS.iter().enumerate() {
            serializer.append_pair(&format!("mDataProp_{}", i), column);
        }

        serializer.append_pair("sSearch", "").append_pair("bRegex", "false");

        for i in 0..COLUMNS.len() {
            serializer
                .append_pair(&format!("sSearch_{}", i), "")
                .append_pair(&format!("bRegex_{}", i), "false")
                .append_pair(&format!("bSearchable_{}", i), "true");
        }

        serializer
            .append_pair("iSortingCols", "1")
            .append_pair("iSortCol_0", &SORT_COLUMN.to_string())
            .append_pair("sSortDir_0", SORT_DIRECTION);

        for i in 0..COLUMNS.len() {
            serializer.append_pair(&format!("bSortable_{}", i), "true");
        }

        serializer.finish()
    }
}

/// Fetches the first `limit` reports of `account`
pub async fn fetch_records(
    session: &Session,
    account: &AccountId,
    menu: &str,
    limit: u32,
) -> Result<RecordSet> {
    let query = ReportQuery {
        account,
        menu,
        limit,
    };
    let url = format!("{}?{}", session.endpoint(REPORT_PATH), query.encode());

    let body = session.get_text(&url).await?;
    let record_set = decode(&body)?;

    log::info!(
        "fetched {} of {} records",
        record_set.records.len(),
        record_set.total_records
    );

    let left_behind = record_set.total_records - record_set.records.len() as i64;
    if left_behind > 0 {
        log::warn!(
            "{} records were not fetched, raise the record count to include them",
            left_behind
        );
    }

    Ok(record_set)
}

pub fn decode(body: &str) -> Result<RecordSet> {
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const RECORD_SET_JSON: &str = r#"{
        "aaData": [
            {
                "DT_RowId": "row_7001",
                "berichtsart": "RD",
                "einheit": "RTW Bregenz 1",
                "einsatzDatum": "2024-01-02T13:00:00",
                "elrEinsatzNummer": "E-24-0001",
                "formularBoolean1": "true",
                "naechsterBearbeiter_loginname": "jdoe",
                "resRechte_kurzzeichen": "RKB",
                "statusBearbeitung": "offen",
                "statusVerrechnung": "nicht verrechnet",
                "string100n1": "Notfall",
                "string100n2": "6900",
                "string100n3": "Bregenz",
                "string100n4": "Bregenz Innenstadt",
                "string100n5": "Rathausstrasse 4",
                "string100n6": null
            },
            {
                "DT_RowId": "row_7000",
                "berichtsart": "KT",
                "einheit": "KTW Dornbirn 2",
                "einsatzDatum": "2024-01-01 08:30:15",
                "elrEinsatzNummer": "E-23-9999",
                "formularBoolean1": "false",
                "naechsterBearbeiter_loginname": "",
                "resRechte_kurzzeichen": "RKD",
                "statusBearbeitung": "abgeschlossen",
                "statusVerrechnung": "verrechnet",
                "string100n1": "Transport",
                "string100n2": "6850",
                "string100n3": "Dornbirn",
                "string100n4": "Dornbirn Markt",
                "string100n5": "Marktplatz 1",
                "string100n6": "Dialyse"
            }
        ],
        "iTotalDisplayRecords": 5,
        "iTotalRecords": 5,
        "sEcho": 1
    }"#;
}
