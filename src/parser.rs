use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use nom::{
    branch::alt,
    bytes::complete::take_while_m_n,
    character::complete::{char, digit1, one_of},
    combinator::{map_res, opt, value},
    sequence::{preceded, tuple},
    IResult,
};

/// Epoch values above this magnitude are taken to be milliseconds
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

/// Parses a record timestamp as the portal sends it
///
/// Accepted forms are ISO dates with an optional time ("2024-01-02",
/// "2024-01-02T13:00:00.5+01:00", "2024-01-02 13:00"), German dates
/// ("02.01.2024 13:00:00") and Unix epoch values in seconds or milliseconds.
/// Offsets are accepted but dropped: the wall-clock time is what the portal
/// shows.
pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime> {
    let input = input.trim();

    if is_epoch(input) {
        let value: i64 = input.parse().context("parse epoch timestamp")?;
        return from_epoch(value).context("epoch timestamp out of range");
    }

    match alt((iso_timestamp, german_timestamp))(input) {
        Ok(("", parts)) => parts.to_datetime(),
        Ok((remainder, _)) => bail!("Remainder found in timestamp: {:?}", remainder),
        Err(_) => bail!("Invalid timestamp: {:?}", input),
    }
}

/// Converts a Unix epoch value to UTC wall-clock time
pub fn from_epoch(value: i64) -> Option<NaiveDateTime> {
    let datetime = if value.unsigned_abs() > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(value)
    } else {
        DateTime::from_timestamp(value, 0)
    };

    datetime.map(|dt| dt.naive_utc())
}

fn is_epoch(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug)]
struct Parts {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
}

impl Parts {
    fn to_datetime(&self) -> Result<NaiveDateTime> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .context("date out of range")?;
        let time = NaiveTime::from_hms_nano_opt(self.hour, self.minute, self.second, self.nanos)
            .context("time out of range")?;

        Ok(date.and_time(time))
    }
}

type Time = (u32, u32, u32, u32);

fn iso_timestamp(input: &str) -> IResult<&str, Parts> {
    let (input, (year, _, month, _, day)) =
        tuple((number(4, 4), char('-'), number(1, 2), char('-'), number(1, 2)))(input)?;
    let (input, time) = opt(preceded(one_of("T "), time))(input)?;
    let (input, _) = opt(offset)(input)?;

    Ok((input, parts(year as i32, month, day, time)))
}

fn german_timestamp(input: &str) -> IResult<&str, Parts> {
    let (input, (day, _, month, _, year)) =
        tuple((number(1, 2), char('.'), number(1, 2), char('.'), number(4, 4)))(input)?;
    let (input, time) = opt(preceded(char(' '), time))(input)?;

    Ok((input, parts(year as i32, month, day, time)))
}

fn parts(year: i32, month: u32, day: u32, time: Option<Time>) -> Parts {
    let (hour, minute, second, nanos) = time.unwrap_or_default();

    Parts {
        year,
        month,
        day,
        hour,
        minute,
        second,
        nanos,
    }
}

fn time(input: &str) -> IResult<&str, Time> {
    let (input, (hour, _, minute)) = tuple((number(1, 2), char(':'), number(2, 2)))(input)?;
    let (input, second) = opt(preceded(char(':'), number(2, 2)))(input)?;
    let (input, nanos) = opt(preceded(char('.'), fraction))(input)?;

    Ok((
        input,
        (hour, minute, second.unwrap_or(0), nanos.unwrap_or(0)),
    ))
}

/// Fractional seconds, truncated to nanosecond precision
fn fraction(input: &str) -> IResult<&str, u32> {
    let (remainder, digits) = digit1(input)?;

    let nanos = digits
        .chars()
        .chain(std::iter::repeat('0'))
        .take(9)
        .fold(0u32, |acc, c| acc * 10 + c.to_digit(10).unwrap_or(0));

    Ok((remainder, nanos))
}

fn offset(input: &str) -> IResult<&str, ()> {
    alt((
        value((), char('Z')),
        value(
            (),
            tuple((one_of("+-"), number(2, 2), opt(char(':')), number(2, 2))),
        ),
    ))(input)
}

fn number<'a>(min: usize, max: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(
        take_while_m_n(min, max, |c: char| c.is_ascii_digit()),
        str::parse::<u32>,
    )
}
