//! Build script for appinstall.
//!
//! Records the UTC build date in `APPINSTALL_BUILD_DATE` for the long
//! `--version` output. `SOURCE_DATE_EPOCH` wins over the clock so
//! reproducible builds report a stable date.

use std::env;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    let epoch_secs = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| elapsed.as_secs())
        });
    println!("cargo:rustc-env=APPINSTALL_BUILD_DATE={}", build_date(epoch_secs));
}

/// `YYYY-MM-DD` for a Unix epoch timestamp (Hinnant's `civil_from_days`).
fn build_date(epoch_secs: u64) -> String {
    let z = epoch_secs / 86_400 + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    format!("{year:04}-{month:02}-{day:02}")
}
