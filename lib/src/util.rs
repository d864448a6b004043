use std::path::Path;
use std::str::FromStr;

use futures::future::join_all;
use serde::de::DeserializeOwned;
use std::future::Future;
use tokio::io::AsyncReadExt as _;

use crate::errors::*;

macro_rules! make_log_macro {
    (@wdoll $macro_name:ident, $block_name:literal, ($dol:tt)) => {
        #[allow(unused_macros)]
        macro_rules! $macro_name {
            ($dol($args:tt)+) => {
                ::log::$macro_name!(target: $block_name, $dol($args)+)
            };
        }
    };
    ($macro_name:ident, $block_name:literal) => {
        make_log_macro!(@wdoll $macro_name, $block_name, ($));
    };
}

pub async fn deserialize_toml_file<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let contents = read_file(path).await?;

    toml::from_str(&contents).map_err(|err| {
        let location_msg = err
            .span()
            .map(|span| {
                let line = 1 + contents.as_bytes()[..(span.start)]
                    .iter()
                    .filter(|b| **b == b'\n')
                    .count();
                format!(" at line {line}")
            })
            .unwrap_or_default();
        AutobrightError::Config(format!(
            "Failed to deserialize TOML file {}{}: {}",
            path.display(),
            location_msg,
            err.message()
        ))
    })
}

pub async fn read_file(path: impl AsRef<Path>) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    Ok(content.trim_end().to_string())
}

/// Read a sysfs attribute holding a single number.
pub async fn read_value<T>(path: impl AsRef<Path>) -> Result<T>
where
    T: FromStr,
    AutobrightError: From<T::Err>,
{
    Ok(read_file(path).await?.trim().parse()?)
}

/// Map an ambient level onto `[low, high]`.
///
/// `ambient` is clamped to 0.0-1.0 first, the result is not clamped. When
/// `low > high` the mapping is decreasing, which callers may use to invert it.
pub fn map(ambient: f64, low: f64, high: f64) -> f64 {
    let t = ambient.clamp(0.0, 1.0);
    low + t * (high - low)
}

/// Convert a raw device value into 0.0-1.0.
pub fn raw_to_unit(raw: u32, max: u32) -> f64 {
    if max == 0 {
        0.0
    } else {
        (f64::from(raw) / f64::from(max)).clamp(0.0, 1.0)
    }
}

/// Convert 0.0-1.0 into a raw device value, never going below `floor`.
pub fn unit_to_raw(value: f64, max: u32, floor: u32) -> u32 {
    let raw = (value.clamp(0.0, 1.0) * f64::from(max)).round() as u32;
    raw.max(floor).min(max)
}

/// Polls every future to completion, succeeding if at least one of them did.
pub async fn join_all_accept_single_ok<I, T>(iter: I) -> Result<Vec<T>>
where
    I: IntoIterator,
    I::Item: Future<Output = Result<T>>,
{
    let all_results = join_all(iter).await;
    let mut results: Vec<T> = Vec::new();
    let mut error = AutobrightError::NoDevices;
    for result in all_results {
        match result {
            Ok(x) => results.push(x),
            Err(e) => error = e,
        }
    }
    if results.is_empty() {
        Err(error)
    } else {
        Ok(results)
    }
}
