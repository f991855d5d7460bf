use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::info;

use crate::error::{HazardError, Result};
use crate::esi::{region_of, Esi};
use crate::schema::{drift, hazard, run, spill};
use crate::utils;

const MONTHLY_NAME_TEMPLATE: &str = "total-hazard-month_{YYYY-MM-DD}.parquet";

/// Combine the concatenated drift-hazard and spill-hazard tables into
/// the total hazard table.
///
/// Per `(date, vessel_type, esi_id)` key: drift rows contribute summed
/// `breach_hazard = stranding_hazard * breach_prob`, spill rows summed
/// `oil_mass` / `cs` / `pb`, and the total `hz_s = breach_hazard * pb *
/// cs`. The output covers every catalog segment for every (date, vessel
/// type) present in the inputs: segments with no contribution carry
/// explicit zero rows rather than being absent, and a key present on
/// only one input side is a zero contribution from the other, never an
/// error.
pub fn combine_hazard(
    drift_df: DataFrame,
    spill_df: DataFrame,
    esi: &Esi,
) -> Result<DataFrame> {
    let key = [col(run::DATE), col(run::VESSEL_TYPE), col(drift::ESI_ID)];

    // stranding * breach per particle, summed per segment; zero groups
    // (never-stranded particles land in the null-id group) drop out
    let breach = drift_df
        .lazy()
        .with_columns([(col(drift::STRANDING_HAZARD) * col(drift::BREACH_PROB))
            .alias(hazard::BREACH_HAZARD)])
        .group_by(key.clone())
        .agg([col(hazard::BREACH_HAZARD).sum()])
        .filter(col(hazard::BREACH_HAZARD).gt(lit(0.0)));

    let spill = spill_df
        .lazy()
        .group_by(key.clone())
        .agg([
            col(spill::OIL_MASS).sum(),
            col(spill::CS).sum(),
            col(spill::PB).sum(),
        ]);

    let joined = breach.join(
        spill,
        key.clone(),
        key.clone(),
        JoinArgs::new(JoinType::Full).with_coalesce(JoinCoalesce::CoalesceColumns),
    );

    // union-of-keys grid: every catalog segment for every (date, vessel
    // type) seen on either side, so missing contributions become zeros
    let periods = joined
        .clone()
        .group_by([col(run::DATE), col(run::VESSEL_TYPE)])
        .agg([col(drift::ESI_ID).count().alias("_nkeys")])
        .select([col(run::DATE), col(run::VESSEL_TYPE)]);
    let segments = esi.sensitivity_frame()?;

    let zero = lit(0.0);
    let combined = periods
        .cross_join(segments.clone().lazy().select([col(drift::ESI_ID)]), None)
        .join(
            joined,
            key.clone(),
            key.clone(),
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([
            col(hazard::BREACH_HAZARD).fill_null(zero.clone()),
            col(spill::OIL_MASS).fill_null(zero.clone()),
            col(spill::CS).fill_null(zero.clone()),
            col(spill::PB).fill_null(zero),
        ])
        .with_columns([(col(hazard::BREACH_HAZARD) * col(spill::PB) * col(spill::CS))
            .alias(hazard::HZ_S)])
        .join(
            segments.lazy(),
            [col(drift::ESI_ID)],
            [col(drift::ESI_ID)],
            JoinArgs::new(JoinType::Left),
        )
        .sort_by_exprs(key.to_vec(), SortMultipleOptions::default())
        .collect()?;

    info!(nrows = combined.height(), "combined hazard table");
    Ok(combined)
}

/// Monthly rollup of a month's worth of combined hazard rows.
///
/// Each simulation date in the month is one ensemble member, so summed
/// terms are weighted by `1 / n_distinct_dates`. `spill_risk` scales
/// `hz_s` by the segment sensitivity mapped onto [0, 1]. Vessel-type
/// tables are kept separate and an `"all"` table summing them is
/// appended.
pub fn monthly_rollup(month_df: DataFrame, month_start: NaiveDate) -> Result<DataFrame> {
    let nsims = month_df
        .column(run::DATE)?
        .as_materialized_series()
        .n_unique()? as f64;
    if nsims == 0.0 {
        return Err(HazardError::InvalidData(
            "Monthly rollup needs at least one simulation date".to_string(),
        ));
    }

    let weighted = month_df
        .lazy()
        .with_columns([(col(hazard::HZ_S) * col(hazard::ESI).cast(DataType::Float64)
            / lit(10.0))
        .alias(hazard::SPILL_RISK)])
        .group_by([col(run::VESSEL_TYPE), col(drift::ESI_ID)])
        .agg([
            col(hazard::BREACH_HAZARD).sum(),
            col(hazard::HZ_S).sum().alias(hazard::SPILL_HAZARD),
            col(hazard::SPILL_RISK).sum(),
            col(hazard::ESI).first(),
        ])
        .with_columns([
            (col(hazard::BREACH_HAZARD) / lit(nsims)).alias(hazard::BREACH_HAZARD),
            (col(hazard::SPILL_HAZARD) / lit(nsims)).alias(hazard::SPILL_HAZARD),
            (col(hazard::SPILL_RISK) / lit(nsims)).alias(hazard::SPILL_RISK),
        ]);

    // combined-across-vessel-types table, tagged "all"
    let all_types = weighted
        .clone()
        .group_by([col(drift::ESI_ID)])
        .agg([
            col(hazard::BREACH_HAZARD).sum(),
            col(hazard::SPILL_HAZARD).sum(),
            col(hazard::SPILL_RISK).sum(),
            col(hazard::ESI).first(),
        ])
        .with_columns([lit("all").alias(run::VESSEL_TYPE)]);

    let order = [
        col(run::VESSEL_TYPE),
        col(drift::ESI_ID),
        col(hazard::ESI),
        col(hazard::BREACH_HAZARD),
        col(hazard::SPILL_HAZARD),
        col(hazard::SPILL_RISK),
    ];
    let mut rolled = concat(
        [weighted.select(order.clone()), all_types.select(order)],
        UnionArgs::default(),
    )?
    .sort_by_exprs(
        [col(run::VESSEL_TYPE), col(drift::ESI_ID)].to_vec(),
        SortMultipleOptions::default(),
    )
    .collect()?;

    let height = rolled.height();
    rolled.with_column(utils::date_column(run::DATE, month_start, height)?)?;
    Ok(rolled)
}

/// Regional rollup of a monthly table: hazard and risk summed over the
/// region prefix of each segment id.
pub fn regional_rollup(monthly_df: DataFrame) -> Result<DataFrame> {
    let ids = monthly_df.column(drift::ESI_ID)?.as_materialized_series();
    let ids = ids.str()?;
    let regions: Vec<Option<String>> = ids
        .into_iter()
        .map(|id| id.map(|id| region_of(id).to_string()))
        .collect();

    let mut with_region = monthly_df.clone();
    with_region.with_column(Column::new(hazard::REGION.into(), regions))?;

    let rolled = with_region
        .lazy()
        .group_by([col(run::VESSEL_TYPE), col(hazard::REGION)])
        .agg([
            col(hazard::BREACH_HAZARD).sum(),
            col(hazard::SPILL_HAZARD).sum(),
            col(hazard::SPILL_RISK).sum(),
        ])
        .sort_by_exprs(
            [col(run::VESSEL_TYPE), col(hazard::REGION)].to_vec(),
            SortMultipleOptions::default(),
        )
        .collect()?;

    Ok(rolled)
}

/// Rows of a combined hazard table whose date falls in the given month.
pub fn filter_month(combined: &DataFrame, year: i32, month: u32) -> Result<DataFrame> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
        HazardError::InvalidData(format!("Invalid year-month {year}-{month:02}"))
    })?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| HazardError::InvalidData(format!("Invalid year-month {year}-{month:02}")))?;

    let days = col(run::DATE).cast(DataType::Int32);
    let df = combined
        .clone()
        .lazy()
        .filter(
            days.clone()
                .gt_eq(lit(utils::date_to_days(start)))
                .and(days.lt(lit(utils::date_to_days(end)))),
        )
        .collect()?;
    Ok(df)
}

/// File name for a monthly hazard table; day component is always 1.
pub fn monthly_filename(month_start: NaiveDate) -> String {
    format!("total-hazard-month_{}.parquet", month_start.format("%Y-%m-%d"))
}

/// Parse `"total-hazard-month_{YYYY-MM-DD}.parquet"`.
pub fn parse_monthly_filename(path: &Path) -> Result<NaiveDate> {
    let invalid = || HazardError::InvalidFilename {
        path: path.to_path_buf(),
        expected: MONTHLY_NAME_TEMPLATE,
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;
    let stem = name.strip_suffix(".parquet").ok_or_else(invalid)?;
    let date_str = stem.strip_prefix("total-hazard-month_").ok_or_else(invalid)?;
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid())
}
